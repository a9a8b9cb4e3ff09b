//! Calls, invocations, construction and indexer reads over argument
//! bindings, and core calls with by-reference locations that need lowering.

use arbor_common::{IrError, IrResult};
use arbor_ir::ext::{ArgBinding, CallBinding, IndexBinding, InvokeBinding, NewBinding};
use arbor_ir::expr::Call;
use arbor_ir::{Expr, ExprKind, Visitor};

use crate::bind::{self, EvaluationPlan};

use super::{Reducer, Sequence};

/// A core location whose receiver or indexes are evaluated on every access.
fn has_coordinates(location: &Expr) -> bool {
    matches!(location.kind(), ExprKind::Member(_) | ExprKind::Index(_))
}

impl Reducer<'_> {
    /// Arguments in parameter order. Supplied values are evaluated in the
    /// caller's order; when the plan is sequenced (or `stable` is set, for
    /// locations read and written more than once) they go through
    /// temporaries first, and by-reference locations have their
    /// coordinates captured. Omitted parameters are synthesized last.
    pub(crate) fn plan_args(&mut self, plan: &EvaluationPlan, seq: &mut Sequence, stable: bool) -> IrResult<Vec<Expr>> {
        let mut slots: Vec<Option<Expr>> = vec![None; plan.arity];
        for step in &plan.steps {
            let located =
                step.param.by_ref && (step.value.is_extended() || (plan.sequenced() && has_coordinates(&step.value)));
            let value = if located {
                self.place(&step.value, seq)?.location()?
            } else {
                let value = self.visit(&step.value)?;
                if plan.needs_spill(step, self.options.spill_constants) {
                    self.spill(seq, value, &step.param.name)?
                } else if stable && !step.param.by_ref {
                    self.capture(seq, value, &step.param.name)?
                } else {
                    value
                }
            };
            slots[step.param.position] = Some(value);
        }
        for param in &plan.missing {
            slots[param.position] = Some(bind::synthesize(param)?);
        }
        slots
            .into_iter()
            .enumerate()
            .map(|(i, slot)| slot.ok_or_else(|| IrError::internal(format!("argument {i} was never bound"))))
            .collect()
    }

    /// Visit a receiver, moving it into a temporary when the arguments will
    /// be evaluated ahead of the call.
    fn receiver(&mut self, object: &Expr, plan: &EvaluationPlan, seq: &mut Sequence) -> IrResult<Expr> {
        let object = self.visit(object)?;
        if plan.sequenced() {
            self.capture_receiver(seq, object)
        } else {
            Ok(object)
        }
    }

    pub(super) fn lower_call_binding(&mut self, c: &CallBinding) -> IrResult<Expr> {
        let plan = bind::resolve(c.method.params(), &c.bindings)?;
        let mut seq = Sequence::default();
        let object = match &c.object {
            Some(o) => Some(self.receiver(o, &plan, &mut seq)?),
            None => None,
        };
        let args = self.plan_args(&plan, &mut seq, false)?;
        seq.finish(Expr::call(object, &c.method, args)?)
    }

    pub(super) fn lower_invoke_binding(&mut self, i: &InvokeBinding) -> IrResult<Expr> {
        let plan = bind::resolve(&i.params, &i.bindings)?;
        let mut seq = Sequence::default();
        let target = self.receiver(&i.target, &plan, &mut seq)?;
        let args = self.plan_args(&plan, &mut seq, false)?;
        seq.finish(Expr::invoke(target, args)?)
    }

    pub(super) fn lower_new_binding(&mut self, n: &NewBinding) -> IrResult<Expr> {
        let plan = bind::resolve(n.ctor.params(), &n.bindings)?;
        let mut seq = Sequence::default();
        let args = self.plan_args(&plan, &mut seq, false)?;
        seq.finish(Expr::new_object(&n.ctor, args)?)
    }

    pub(super) fn lower_index_binding(&mut self, i: &IndexBinding) -> IrResult<Expr> {
        let plan = bind::resolve(i.indexer.params(), &i.bindings)?;
        let mut seq = Sequence::default();
        let object = self.receiver(&i.object, &plan, &mut seq)?;
        let args = self.plan_args(&plan, &mut seq, false)?;
        seq.finish(Expr::index(object, Some(&i.indexer), args)?)
    }

    /// A core call passing an extended location by reference: the receiver
    /// and every argument are evaluated in order, the location's
    /// coordinates included, before the call itself.
    pub(super) fn lower_call_with_places(&mut self, c: &Call) -> IrResult<Expr> {
        let bindings: Vec<ArgBinding> = c
            .method
            .params()
            .iter()
            .zip(&c.args)
            .map(|(param, value)| ArgBinding {
                param: param.clone(),
                value: value.clone(),
            })
            .collect();
        self.lower_call_binding(&CallBinding {
            object: c.object.clone(),
            method: c.method.clone(),
            bindings,
        })
    }
}
