//! Late-bound operations.
//!
//! A dynamic node carries its operation tag, flags and argument descriptors
//! and a [`BinderRef`]; the reducer turns it into a core dynamic call site.
//! Assignment forms are written as compound/unary assignments whose target is
//! a dynamic member or index read.

use arbor_common::{IrError, IrResult, Ty};

use crate::binder::{BinderRef, DynamicArgInfo, DynamicFlags, DynamicOp};
use crate::build::check_by_ref;
use crate::expr::{Expr, ExprKind};
use crate::ops::{BinaryOp, UnaryOp};

#[derive(Debug, PartialEq)]
pub struct DynamicArg {
    pub value: Expr,
    pub name: Option<String>,
    pub by_ref: bool,
}

impl DynamicArg {
    pub fn new(value: Expr) -> DynamicArg {
        DynamicArg {
            value,
            name: None,
            by_ref: false,
        }
    }

    pub fn named(name: impl Into<String>, value: Expr) -> DynamicArg {
        DynamicArg {
            value,
            name: Some(name.into()),
            by_ref: false,
        }
    }

    pub fn by_ref(value: Expr) -> DynamicArg {
        DynamicArg {
            value,
            name: None,
            by_ref: true,
        }
    }

    pub fn info(&self) -> DynamicArgInfo {
        DynamicArgInfo {
            name: self.name.clone(),
            by_ref: self.by_ref,
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct DynamicExpr {
    pub op: DynamicOp,
    /// Receiver (where the operation has one) first.
    pub args: Vec<DynamicArg>,
    pub flags: DynamicFlags,
    pub context: Option<Ty>,
    pub binder: BinderRef,
}

impl DynamicExpr {
    /// A read that can be turned into the matching write.
    pub fn is_member_or_index_get(&self) -> bool {
        matches!(self.op, DynamicOp::GetMember(_) | DynamicOp::GetIndex)
    }
}

impl Expr {
    pub fn dynamic(
        op: DynamicOp,
        args: Vec<DynamicArg>,
        flags: DynamicFlags,
        context: Option<Ty>,
        binder: BinderRef,
    ) -> IrResult<Expr> {
        let (min, max) = op.arity();
        if args.len() < min || max.is_some_and(|max| args.len() > max) {
            return Err(IrError::shape(
                "args",
                format!("{} does not take {} arguments", op.name(), args.len()),
            ));
        }
        match &op {
            DynamicOp::Unary(u) if u.is_assignment() => {
                return Err(IrError::shape("op", "a dynamic increment is written as a unary assignment"));
            }
            DynamicOp::Convert(ty) if ty.is_void() => {
                return Err(IrError::shape("op", "cannot convert to Void"));
            }
            DynamicOp::GetMember(name) | DynamicOp::SetMember(name) | DynamicOp::InvokeMember(name)
                if name.is_empty() =>
            {
                return Err(IrError::argument_null("name"));
            }
            _ => {}
        }
        for (i, arg) in args.iter().enumerate() {
            if arg.value.ty().is_void() {
                return Err(IrError::shape("args", format!("dynamic argument {i} is Void")));
            }
            if arg.by_ref {
                check_by_ref(&arg.value, "args")?;
            }
        }
        let flags = match op {
            DynamicOp::Binary(BinaryOp::AndAlso | BinaryOp::OrElse) => flags | DynamicFlags::LOGICAL_SHORT_CIRCUIT,
            _ => flags,
        };
        Ok(Expr::from_kind(ExprKind::DynamicOp(DynamicExpr {
            op,
            args,
            flags,
            context,
            binder,
        })))
    }

    pub fn dynamic_binary(op: BinaryOp, left: Expr, right: Expr, binder: BinderRef) -> IrResult<Expr> {
        Expr::dynamic(
            DynamicOp::Binary(op),
            vec![DynamicArg::new(left), DynamicArg::new(right)],
            DynamicFlags::NONE,
            None,
            binder,
        )
    }

    pub fn dynamic_unary(op: UnaryOp, operand: Expr, binder: BinderRef) -> IrResult<Expr> {
        Expr::dynamic(
            DynamicOp::Unary(op),
            vec![DynamicArg::new(operand)],
            DynamicFlags::NONE,
            None,
            binder,
        )
    }

    pub fn dynamic_get_member(object: Expr, name: &str, binder: BinderRef) -> IrResult<Expr> {
        Expr::dynamic(
            DynamicOp::GetMember(name.to_string()),
            vec![DynamicArg::new(object)],
            DynamicFlags::NONE,
            None,
            binder,
        )
    }

    pub fn dynamic_get_index(object: Expr, indexes: Vec<Expr>, binder: BinderRef) -> IrResult<Expr> {
        let args = std::iter::once(object).chain(indexes).map(DynamicArg::new).collect();
        Expr::dynamic(DynamicOp::GetIndex, args, DynamicFlags::NONE, None, binder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::{Binder, CallSite};
    use crate::node::Variable;
    use arbor_common::ErrorKind;

    struct Refuse;

    impl Binder for Refuse {
        fn bind(&self, _site: &CallSite, _shapes: &[Ty]) -> IrResult<Expr> {
            Err(IrError::unsupported("no binding"))
        }
    }

    #[test]
    fn logical_ops_get_short_circuit_flag() {
        let binder = BinderRef::new(Refuse);
        let e = Expr::dynamic_binary(BinaryOp::AndAlso, Expr::bool(true), Expr::bool(false), binder.clone()).unwrap();
        let ExprKind::DynamicOp(d) = e.kind() else {
            panic!("expected a dynamic node");
        };
        assert!(d.flags.contains(DynamicFlags::LOGICAL_SHORT_CIRCUIT));

        let e = Expr::dynamic_binary(BinaryOp::Add, Expr::int(1), Expr::int(2), binder).unwrap();
        let ExprKind::DynamicOp(d) = e.kind() else {
            panic!("expected a dynamic node");
        };
        assert!(!d.flags.contains(DynamicFlags::LOGICAL_SHORT_CIRCUIT));
    }

    #[test]
    fn arity_is_checked() {
        let err = Expr::dynamic(
            DynamicOp::Binary(BinaryOp::Add),
            vec![DynamicArg::new(Expr::int(1))],
            DynamicFlags::NONE,
            None,
            BinderRef::new(Refuse),
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::ArgumentShape);
    }

    #[test]
    fn member_get_is_writable() {
        let o = Variable::new("o", Ty::Object);
        let get = Expr::dynamic_get_member(Expr::var(&o), "X", BinderRef::new(Refuse)).unwrap();
        assert!(crate::build::is_writable(&get));
        let neg = Expr::dynamic_unary(UnaryOp::Negate, Expr::var(&o), BinderRef::new(Refuse)).unwrap();
        assert!(!crate::build::is_writable(&neg));
    }
}
