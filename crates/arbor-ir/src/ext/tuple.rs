//! Tuple literals and element-wise tuple conversion.

use arbor_common::{IrError, IrResult, Ty};

use crate::expr::{Expr, ExprKind};

/// `(a, b, c, ...)` over a flat item list; levels past the seventh item
/// are nested into the rest slot when reduced.
#[derive(Debug, PartialEq)]
pub struct TupleLiteral {
    pub items: Vec<Expr>,
    pub ty: Ty,
}

#[derive(Debug, PartialEq)]
pub struct TupleConvert {
    pub operand: Expr,
    pub ty: Ty,
    /// One entry per logical (flattened) element. `None` converts with a
    /// plain convert node, or not at all when the types already agree.
    pub conversions: Vec<Option<Expr>>,
}

impl TupleConvert {
    /// Whether the conversion goes through a null check.
    pub fn is_lifted(&self) -> bool {
        self.ty.is_nullable_value_type()
    }
}

/// Whether an element of type `from` converts to `to` without an explicit
/// conversion lambda.
pub fn element_convertible(from: &Ty, to: &Ty) -> bool {
    if from == to || to.is_convertible_from(from) {
        return true;
    }
    match (from.tuple_elements(), to.tuple_elements()) {
        (Some(f), Some(t)) => f.len() == t.len() && f.iter().zip(&t).all(|(f, t)| element_convertible(f, t)),
        _ => false,
    }
}

impl Expr {
    pub fn tuple_literal(items: Vec<Expr>) -> IrResult<Expr> {
        if items.is_empty() {
            return Err(IrError::shape("items", "a tuple needs at least one item"));
        }
        let mut tys = Vec::with_capacity(items.len());
        for item in &items {
            let ty = item.ty();
            if ty.is_void() {
                return Err(IrError::shape("items", "tuple items cannot be Void"));
            }
            tys.push(ty);
        }
        Ok(Expr::from_kind(ExprKind::TupleLiteral(TupleLiteral {
            items,
            ty: Ty::tuple(tys),
        })))
    }

    /// Convert `operand` to the tuple type `ty` element by element.
    /// `conversions` is either empty (infer every element) or holds one
    /// entry per element.
    pub fn tuple_convert(operand: Expr, ty: Ty, conversions: Vec<Option<Expr>>) -> IrResult<Expr> {
        let from = operand.ty();
        if from.is_nullable_value_type() && !ty.is_nullable_value_type() {
            return Err(IrError::unsupported(format!(
                "cannot convert the lifted tuple {from} to the unlifted {ty}"
            )));
        }
        let Some(source) = from.non_nullable().tuple_elements() else {
            return Err(IrError::shape("operand", format!("expected a tuple, found {from}")));
        };
        let Some(target) = ty.non_nullable().tuple_elements() else {
            return Err(IrError::shape("ty", format!("expected a tuple type, found {ty}")));
        };
        if source.len() != target.len() {
            return Err(IrError::shape(
                "ty",
                format!("cannot convert {} elements into {}", source.len(), target.len()),
            ));
        }
        let conversions = if conversions.is_empty() {
            vec![None; target.len()]
        } else {
            conversions
        };
        if conversions.len() != target.len() {
            return Err(IrError::shape(
                "conversions",
                format!("expected {} conversions, got {}", target.len(), conversions.len()),
            ));
        }
        for (i, ((from, to), conv)) in source.iter().zip(&target).zip(&conversions).enumerate() {
            match conv {
                None if element_convertible(from, to) => {}
                None => {
                    return Err(IrError::shape(
                        "conversions",
                        format!("element {i}: no conversion from {from} to {to}"),
                    ));
                }
                Some(conv) => match conv.ty() {
                    Ty::Fn(params, ret) if params.len() == 1 && params[0].accepts(from) && to.accepts(&ret) => {}
                    other => {
                        return Err(IrError::shape(
                            "conversions",
                            format!("element {i}: {other} does not convert {from} to {to}"),
                        ));
                    }
                },
            }
        }
        Ok(Expr::from_kind(ExprKind::TupleConvert(TupleConvert {
            operand,
            ty,
            conversions,
        })))
    }
}
