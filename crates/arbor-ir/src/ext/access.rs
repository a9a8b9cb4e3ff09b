//! Null-propagating access and array access with index/range operands.

use arbor_common::{IrError, IrResult, Ty};

use crate::expr::{Expr, ExprKind};
use crate::node::Placeholder;

#[derive(Debug, PartialEq)]
pub struct ConditionalAccess {
    pub receiver: Expr,
    /// Referenced inside `when_not_null` for the non-null receiver value.
    pub placeholder: Placeholder,
    pub when_not_null: Expr,
    pub ty: Ty,
}

#[derive(Debug, PartialEq)]
pub struct ArrayAccess {
    pub array: Expr,
    /// `Int`, `Index` or `Range`.
    pub index: Expr,
    pub ty: Ty,
}

impl ArrayAccess {
    /// A single element (assignable), as opposed to a slice.
    pub fn is_element(&self) -> bool {
        self.index.ty() != Ty::Range
    }
}

#[derive(Debug, PartialEq)]
pub struct RangeExpr {
    /// Defaults to the start of the sequence.
    pub start: Option<Expr>,
    /// Defaults to the end of the sequence.
    pub end: Option<Expr>,
}

/// Whether `placeholder` occurs anywhere in `expr`.
pub fn mentions(expr: &Expr, placeholder: &Placeholder) -> bool {
    match expr.kind() {
        ExprKind::ConditionalReceiver(p) => p == placeholder,
        _ => expr.children_ref().into_iter().any(|c| mentions(c, placeholder)),
    }
}

impl Expr {
    /// The placeholder leaf standing for a conditional-access receiver.
    pub fn receiver(placeholder: &Placeholder) -> Expr {
        Expr::from_kind(ExprKind::ConditionalReceiver(placeholder.clone()))
    }

    /// `receiver?.when_not_null`, where `when_not_null` refers to the
    /// receiver through `placeholder`.
    pub fn conditional_access(receiver: Expr, placeholder: Placeholder, when_not_null: Expr) -> IrResult<Expr> {
        let receiver_ty = receiver.ty();
        if !receiver_ty.is_nullable() {
            return Err(IrError::shape(
                "receiver",
                format!("a conditional access needs a nullable receiver, found {receiver_ty}"),
            ));
        }
        if placeholder.ty() != receiver_ty.non_nullable() {
            return Err(IrError::shape(
                "placeholder",
                format!("placeholder is {}, receiver is {receiver_ty}", placeholder.ty()),
            ));
        }
        if mentions(&receiver, &placeholder) {
            return Err(IrError::shape("receiver", "the receiver cannot refer to its own placeholder"));
        }
        let inner = when_not_null.ty();
        let ty = if inner.is_void() { Ty::Void } else { inner.to_nullable() };
        Ok(Expr::from_kind(ExprKind::ConditionalAccess(ConditionalAccess {
            receiver,
            placeholder,
            when_not_null,
            ty,
        })))
    }

    /// `array[index]` with an `Int`, `Index` or `Range` operand.
    pub fn array_access(array: Expr, index: Expr) -> IrResult<Expr> {
        let Some(elem) = array.ty().element_type().cloned() else {
            return Err(IrError::shape("array", format!("expected an array, found {}", array.ty())));
        };
        let ty = match index.ty() {
            Ty::Int | Ty::Index => elem,
            Ty::Range => array.ty(),
            other => {
                return Err(IrError::shape(
                    "index",
                    format!("an array index is Int, Index or Range, found {other}"),
                ));
            }
        };
        Ok(Expr::from_kind(ExprKind::ArrayAccess(ArrayAccess { array, index, ty })))
    }

    /// `^value`.
    pub fn from_end(value: Expr) -> IrResult<Expr> {
        if value.ty() != Ty::Int {
            return Err(IrError::shape("value", format!("expected Int, found {}", value.ty())));
        }
        Ok(Expr::from_kind(ExprKind::FromEndIndex(value)))
    }

    /// `start..end`, either bound optional.
    pub fn range(start: Option<Expr>, end: Option<Expr>) -> IrResult<Expr> {
        for (name, bound) in [("start", &start), ("end", &end)] {
            if let Some(b) = bound {
                if b.ty() != Ty::Index {
                    return Err(IrError::shape(name, format!("a range bound is an Index, found {}", b.ty())));
                }
            }
        }
        Ok(Expr::from_kind(ExprKind::Range(RangeExpr { start, end })))
    }
}
