//! Late-bound operations become call sites bound at run time.

use arbor_common::{IrError, IrResult, Ty};
use arbor_ir::ext::DynamicExpr;
use arbor_ir::{BinaryOp, CallSite, DynamicArgInfo, DynamicFlags, DynamicOp, Expr, ExprKind, UnaryOp, Visitor};

use super::{Reducer, Sequence};

impl Reducer<'_> {
    pub(super) fn lower_dynamic(&mut self, d: &DynamicExpr) -> IrResult<Expr> {
        let mut seq = Sequence::default();
        // A location's coordinates land in the prelude, so every operand
        // goes there in order once one of them does.
        let sequenced = d.args.iter().any(|a| a.by_ref && a.value.is_extended());
        let mut args = Vec::with_capacity(d.args.len());
        for (i, arg) in d.args.iter().enumerate() {
            let coordinates = arg.value.is_extended() || (sequenced && !matches!(arg.value.kind(), ExprKind::Variable(_)));
            let value = if arg.by_ref && coordinates {
                self.place(&arg.value, &mut seq)?.location()?
            } else {
                let value = self.visit(&arg.value)?;
                if sequenced && !arg.by_ref {
                    self.capture(&mut seq, value, &format!("arg{i}"))?
                } else {
                    value
                }
            };
            args.push(value);
        }
        let infos: Vec<DynamicArgInfo> = d.args.iter().map(|a| a.info()).collect();

        let result = match d.op {
            DynamicOp::Binary(op @ (BinaryOp::AndAlso | BinaryOp::OrElse))
                if d.flags.contains(DynamicFlags::LOGICAL_SHORT_CIRCUIT) =>
            {
                self.short_circuit(d, op, args, infos, &mut seq)?
            }
            _ => Expr::dynamic_call(site(d, d.op.clone(), infos, d.flags), args, d.op.result_ty())?,
        };
        seq.finish(result)
    }

    /// `{ l = left; IsFalse(l) ? l : l && right }` for `&&`, and the `IsTrue`
    /// form for `||`. The right operand is evaluated only when the left one
    /// does not decide the result.
    fn short_circuit(
        &mut self,
        d: &DynamicExpr,
        op: BinaryOp,
        args: Vec<Expr>,
        infos: Vec<DynamicArgInfo>,
        seq: &mut Sequence,
    ) -> IrResult<Expr> {
        let mut args = args.into_iter();
        let (Some(left), Some(right)) = (args.next(), args.next()) else {
            return Err(IrError::internal("a short-circuit operator takes two operands"));
        };
        let left = self.spill(seq, left, "left")?;
        let decides = if op == BinaryOp::AndAlso { UnaryOp::IsFalse } else { UnaryOp::IsTrue };
        let test_infos = vec![infos.first().cloned().unwrap_or_default()];
        let test = Expr::dynamic_call(
            site(d, DynamicOp::Unary(decides), test_infos, d.flags),
            vec![left.clone()],
            Ty::Bool,
        )?;
        let combined = Expr::dynamic_call(
            site(d, DynamicOp::Binary(op), infos, d.flags),
            vec![left.clone(), right],
            Ty::Object,
        )?;
        Expr::condition(test, left, combined, Ty::Object)
    }
}

fn site(d: &DynamicExpr, op: DynamicOp, args: Vec<DynamicArgInfo>, flags: DynamicFlags) -> CallSite {
    CallSite {
        op,
        flags,
        args,
        context: d.context.clone(),
        binder: d.binder.clone(),
    }
}
