//! Compound assignment and increment/decrement on arbitrary targets.

use arbor_common::{IrError, IrResult, Method, Ty};

use crate::build::{binary_result, is_writable};
use crate::expr::{Expr, ExprKind};
use crate::ops::{AssignOp, UnaryAssignOp};

#[derive(Debug, PartialEq)]
pub struct CompoundAssign {
    pub op: AssignOp,
    pub target: Expr,
    pub operand: Expr,
    /// Static `(left, operand) -> result` replacing the builtin operator.
    pub method: Option<Method>,
    /// Applied to the old value before the operation.
    pub left_conversion: Option<Expr>,
    /// Applied to the result before it is written back.
    pub final_conversion: Option<Expr>,
}

#[derive(Debug, PartialEq)]
pub struct UnaryAssign {
    pub op: UnaryAssignOp,
    pub target: Expr,
    /// Static `(value) -> value` replacing `+ 1` / `- 1`.
    pub method: Option<Method>,
}

fn is_dynamic_target(target: &Expr) -> bool {
    matches!(target.kind(), ExprKind::DynamicOp(_))
}

/// The `(input) -> output` shape of a conversion lambda.
fn conversion_shape(conv: &Expr, name: &str) -> IrResult<(Ty, Ty)> {
    match conv.ty() {
        Ty::Fn(mut params, ret) if params.len() == 1 => Ok((params.remove(0), *ret)),
        other => Err(IrError::shape(name, format!("expected a one-argument conversion, found {other}"))),
    }
}

impl Expr {
    pub fn compound_assign(op: AssignOp, target: Expr, operand: Expr) -> IrResult<Expr> {
        Expr::compound_assign_with(op, target, operand, None, None, None)
    }

    pub fn compound_assign_with(
        op: AssignOp,
        target: Expr,
        operand: Expr,
        method: Option<Method>,
        left_conversion: Option<Expr>,
        final_conversion: Option<Expr>,
    ) -> IrResult<Expr> {
        if !is_writable(&target) {
            return Err(IrError::shape("target", format!("cannot assign to {}", target.kind_name())));
        }
        let target_ty = target.ty();
        let operand_ty = operand.ty();
        if operand_ty.is_void() {
            return Err(IrError::shape("operand", "cannot assign a Void value"));
        }
        let customized = method.is_some() || left_conversion.is_some() || final_conversion.is_some();

        if is_dynamic_target(&target) {
            if customized || op == AssignOp::Coalesce {
                return Err(IrError::shape("op", format!("`{}` is not supported on a dynamic target", op.symbol())));
            }
        } else {
            match op.binary() {
                None => {
                    if customized {
                        return Err(IrError::shape("method", format!("`{}` takes no operator method or conversions", op.symbol())));
                    }
                    if op == AssignOp::Coalesce && !target_ty.is_nullable() {
                        return Err(IrError::shape("target", format!("`??=` needs a nullable target, found {target_ty}")));
                    }
                    if !target_ty.accepts(&operand_ty) {
                        return Err(IrError::shape("operand", format!("cannot assign {operand_ty} to {target_ty}")));
                    }
                }
                Some(binary) => {
                    let left_ty = match &left_conversion {
                        None => target_ty.clone(),
                        Some(conv) => {
                            let (input, output) = conversion_shape(conv, "left_conversion")?;
                            if !input.accepts(&target_ty) {
                                return Err(IrError::shape(
                                    "left_conversion",
                                    format!("converts from {input}, target is {target_ty}"),
                                ));
                            }
                            output
                        }
                    };
                    let result_ty = match &method {
                        Some(m) => {
                            if !m.is_static() || m.params().len() != 2 {
                                return Err(IrError::shape("method", "an operator method is static and binary"));
                            }
                            if !m.params()[0].ty.accepts(&left_ty) || !m.params()[1].ty.accepts(&operand_ty) {
                                return Err(IrError::shape(
                                    "method",
                                    format!("{m} cannot combine {left_ty} and {operand_ty}"),
                                ));
                            }
                            m.ret().clone()
                        }
                        None => binary_result(binary, &left_ty, &operand_ty).ok_or_else(|| {
                            IrError::shape(
                                "operand",
                                format!("`{}` is not defined on {left_ty} and {operand_ty}", op.symbol()),
                            )
                        })?,
                    };
                    let final_ty = match &final_conversion {
                        None => result_ty,
                        Some(conv) => {
                            let (input, output) = conversion_shape(conv, "final_conversion")?;
                            if !input.accepts(&result_ty) {
                                return Err(IrError::shape(
                                    "final_conversion",
                                    format!("converts from {input}, operation yields {result_ty}"),
                                ));
                            }
                            output
                        }
                    };
                    if !target_ty.accepts(&final_ty) {
                        let arg = if final_conversion.is_some() { "final_conversion" } else { "method" };
                        return Err(IrError::shape(arg, format!("cannot store {final_ty} into {target_ty}")));
                    }
                }
            }
        }
        Ok(Expr::from_kind(ExprKind::CompoundAssign(CompoundAssign {
            op,
            target,
            operand,
            method,
            left_conversion,
            final_conversion,
        })))
    }

    pub fn unary_assign(op: UnaryAssignOp, target: Expr, method: Option<Method>) -> IrResult<Expr> {
        if !is_writable(&target) {
            return Err(IrError::shape("target", format!("cannot assign to {}", target.kind_name())));
        }
        let ty = target.ty();
        match &method {
            Some(m) => {
                if is_dynamic_target(&target) {
                    return Err(IrError::shape("method", "a dynamic target takes no operator method"));
                }
                if !m.is_static() || m.params().len() != 1 {
                    return Err(IrError::shape("method", "an increment method is static and unary"));
                }
                if !m.params()[0].ty.accepts(&ty) || !ty.accepts(m.ret()) {
                    return Err(IrError::shape("method", format!("{m} does not map {ty} to itself")));
                }
            }
            None => {
                if !is_dynamic_target(&target) && !ty.is_numeric() {
                    return Err(IrError::shape("target", format!("cannot increment a {ty}")));
                }
            }
        }
        Ok(Expr::from_kind(ExprKind::UnaryAssign(UnaryAssign { op, target, method })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Variable;
    use arbor_common::{ErrorKind, Member, Param};

    #[test]
    fn plain_compound_assign() {
        let x = Variable::new("x", Ty::Int);
        let e = Expr::compound_assign(AssignOp::Add, Expr::var(&x), Expr::int(2)).unwrap();
        assert_eq!(e.ty(), Ty::Int);
        assert!(Expr::compound_assign(AssignOp::Add, Expr::var(&x), Expr::str("a")).is_err());
        assert!(Expr::compound_assign(AssignOp::Add, Expr::int(1), Expr::int(2)).is_err());
    }

    #[test]
    fn custom_method_and_conversions() {
        let b = Variable::new("b", Ty::Int);
        let add = Method::new_static(
            "Add",
            Ty::class("Ops"),
            vec![Param::new("a", Ty::Float), Param::new("b", Ty::Float)],
            Ty::Float,
        )
        .unwrap();
        let p = Variable::new("p", Ty::Int);
        let widen = Expr::lambda(vec![p.clone()], Expr::convert(Expr::var(&p), Ty::Float).unwrap(), Ty::Float).unwrap();
        let q = Variable::new("q", Ty::Float);
        let narrow = Expr::lambda(vec![q.clone()], Expr::convert(Expr::var(&q), Ty::Int).unwrap(), Ty::Int).unwrap();

        let e = Expr::compound_assign_with(
            AssignOp::Add,
            Expr::var(&b),
            Expr::float(0.5),
            Some(add.clone()),
            Some(widen.clone()),
            Some(narrow),
        )
        .unwrap();
        assert_eq!(e.ty(), Ty::Int);

        let err = Expr::compound_assign_with(AssignOp::Add, Expr::var(&b), Expr::float(0.5), Some(add), Some(widen), None)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::ArgumentShape);
        assert_eq!(err.argument.as_deref(), Some("method"));
    }

    #[test]
    fn coalesce_needs_nullable_target() {
        let n = Variable::new("n", Ty::nullable(Ty::Int));
        assert!(Expr::compound_assign(AssignOp::Coalesce, Expr::var(&n), Expr::int(1)).is_ok());
        let i = Variable::new("i", Ty::Int);
        assert!(Expr::compound_assign(AssignOp::Coalesce, Expr::var(&i), Expr::int(1)).is_err());
    }

    #[test]
    fn unary_assign_targets() {
        let c = Ty::class("C");
        let count = Member::property("Count", c.clone(), Ty::Int, true, true).unwrap();
        let ro = Member::property("Size", c.clone(), Ty::Int, true, false).unwrap();
        let o = Variable::new("o", c);
        let target = Expr::member(Some(Expr::var(&o)), &count).unwrap();
        assert!(Expr::unary_assign(UnaryAssignOp::PostIncrement, target, None).is_ok());
        let target = Expr::member(Some(Expr::var(&o)), &ro).unwrap();
        assert!(Expr::unary_assign(UnaryAssignOp::PostIncrement, target, None).is_err());
    }
}
