//! Binding resolver: turn a binding list into an evaluation plan.
//!
//! The plan keeps the caller's textual order for supplied arguments and
//! lists the parameters the caller left out, which are synthesized after
//! every supplied argument has been evaluated.

use arbor_common::{IrError, IrResult, Literal, Param, Ty};
use arbor_ir::ext::ArgBinding;
use arbor_ir::Expr;

/// One supplied argument, in caller order.
#[derive(Clone, Debug)]
pub struct PlanStep {
    pub param: Param,
    pub value: Expr,
}

#[derive(Clone, Debug)]
pub struct EvaluationPlan {
    pub steps: Vec<PlanStep>,
    /// Parameters not supplied by the caller, in parameter order.
    pub missing: Vec<Param>,
    /// Whether the caller's order differs from parameter order.
    pub reorders: bool,
    pub arity: usize,
}

impl EvaluationPlan {
    /// Whether supplied values have to be evaluated ahead of the call:
    /// the caller's order differs from parameter order, or a by-reference
    /// location has coordinates that must be evaluated in turn.
    pub fn sequenced(&self) -> bool {
        self.reorders || self.steps.iter().any(|s| s.param.by_ref && s.value.is_extended())
    }

    /// Whether the supplied value at `step` has to be moved into a
    /// temporary so that the call can read it in parameter order.
    pub fn needs_spill(&self, step: &PlanStep, spill_constants: bool) -> bool {
        if !self.sequenced() || step.param.by_ref {
            return false;
        }
        spill_constants || !step.value.is_constant()
    }
}

/// Resolve `bindings` against `params`. Fails only when no plan exists:
/// a binding for a foreign or duplicated parameter, or an unbound required
/// one.
pub fn resolve(params: &[Param], bindings: &[ArgBinding]) -> IrResult<EvaluationPlan> {
    let mut bound = vec![false; params.len()];
    let mut last = None;
    let mut reorders = false;
    let mut steps = Vec::with_capacity(bindings.len());
    for b in bindings {
        let position = b.param.position;
        match params.get(position) {
            Some(p) if p == &b.param => {}
            _ => {
                return Err(IrError::internal(format!(
                    "no feasible plan: `{}` is not a parameter of this signature",
                    b.param.name
                )));
            }
        }
        if bound[position] {
            return Err(IrError::internal(format!("no feasible plan: `{}` is bound twice", b.param.name)));
        }
        bound[position] = true;
        if last.is_some_and(|l| position < l) {
            reorders = true;
        }
        last = Some(position);
        steps.push(PlanStep {
            param: b.param.clone(),
            value: b.value.clone(),
        });
    }
    let mut missing = Vec::new();
    for (param, bound) in params.iter().zip(&bound) {
        if *bound {
            continue;
        }
        if param.is_required() {
            return Err(IrError::internal(format!("no feasible plan: `{}` is not bound", param.name)));
        }
        missing.push(param.clone());
    }
    Ok(EvaluationPlan {
        steps,
        missing,
        reorders,
        arity: params.len(),
    })
}

/// The value passed for a parameter the caller left out: its default, or
/// an empty array for a variadic parameter.
pub fn synthesize(param: &Param) -> IrResult<Expr> {
    if let Some(default) = &param.default {
        return Expr::constant(default.clone(), param.ty.clone());
    }
    if param.variadic {
        let elem = param.ty.element_type().cloned().unwrap_or(Ty::Object);
        return Expr::new_array(elem, vec![]);
    }
    Err(IrError::internal(format!("no value for required parameter `{}`", param.name)))
}

/// `Literal` for the unit increment of a numeric type.
pub(crate) fn one(ty: &Ty) -> Literal {
    match ty.non_nullable() {
        Ty::Float => Literal::Float(1.0),
        _ => Literal::Int(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_common::member::build_signature;
    use arbor_ir::ext::{bind_arguments, Argument};

    fn sig() -> Vec<Param> {
        build_signature(vec![
            Param::new("a", Ty::Int),
            Param::new("b", Ty::Int).with_default(Literal::Int(7)),
            Param::new("rest", Ty::array(Ty::Int)).variadic(),
        ])
        .unwrap()
    }

    #[test]
    fn in_order_plan_does_not_reorder() {
        let params = sig();
        let bindings = bind_arguments(&params, vec![Argument::Positional(Expr::int(1))]).unwrap();
        let plan = resolve(&params, &bindings).unwrap();
        assert!(!plan.reorders);
        assert_eq!(plan.steps.len(), 1);
        let missing: Vec<&str> = plan.missing.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(missing, vec!["b", "rest"]);
    }

    #[test]
    fn named_arguments_out_of_order() {
        let params = sig();
        let bindings = bind_arguments(
            &params,
            vec![Argument::named("b", Expr::int(2)), Argument::named("a", Expr::int(1))],
        )
        .unwrap();
        let plan = resolve(&params, &bindings).unwrap();
        assert!(plan.reorders);
        assert_eq!(plan.steps[0].param.name, "b");
        assert!(!plan.needs_spill(&plan.steps[0], false));
        assert!(plan.needs_spill(&plan.steps[0], true));
    }

    #[test]
    fn synthesized_values() {
        let params = sig();
        assert_eq!(synthesize(&params[1]).unwrap(), Expr::int(7));
        assert_eq!(
            synthesize(&params[2]).unwrap(),
            Expr::new_array(Ty::Int, vec![]).unwrap()
        );
        assert!(synthesize(&params[0]).unwrap_err().is_internal());
    }

    #[test]
    fn unbound_required_parameter_is_infeasible() {
        let params = sig();
        let err = resolve(&params, &[]).unwrap_err();
        assert!(err.is_internal());
        assert!(err.message.contains("no feasible plan"));
    }
}
