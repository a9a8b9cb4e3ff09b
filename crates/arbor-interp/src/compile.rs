//! Compile-time checks and the compiled form of a tree.
//!
//! Compilation validates what the evaluator relies on and nothing more:
//! the tree holds only core nodes, every variable read is in scope, every
//! jump targets a label it can reach, and every rethrow sits inside a catch
//! clause of the same lambda.

use std::cell::RefCell;

use arbor_common::{IrError, IrResult, Ty};
use arbor_ir::labels::block_labels;
use arbor_ir::{Expr, ExprKind, LabelTarget, Variable};
use rustc_hash::FxHashMap;

use crate::env::Env;
use crate::error::RuntimeError;
use crate::eval::Interpreter;
use crate::host::Host;
use crate::value::Value;

/// A checked tree ready to run.
pub struct Compiled {
    root: Expr,
    shared: Shared,
}

/// State that outlives a single invocation.
#[derive(Default)]
pub(crate) struct Shared {
    /// Static fields, keyed by `Declaring.Name`.
    pub(crate) statics: RefCell<FxHashMap<String, Value>>,
    /// Bound operations of late-bound call sites, keyed by site address
    /// and argument shapes.
    pub(crate) bound: RefCell<FxHashMap<(usize, Vec<Ty>), Value>>,
}

/// Check `expr` and wrap it for execution. A lambda compiles to a callable
/// taking its parameters; any other tree runs with no arguments.
pub fn compile(expr: &Expr) -> IrResult<Compiled> {
    check(expr)?;
    log::debug!("compiled {} tree", expr.kind_name());
    Ok(Compiled {
        root: expr.clone(),
        shared: Shared::default(),
    })
}

impl Compiled {
    pub fn tree(&self) -> &Expr {
        &self.root
    }

    pub fn arity(&self) -> usize {
        self.root.as_lambda().map_or(0, |l| l.params.len())
    }

    pub fn invoke(&self, host: &mut dyn Host, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let mut interp = Interpreter::new(host, &self.shared);
        match self.root.as_lambda() {
            Some(lambda) => interp.run_lambda_root(lambda, args),
            None if args.is_empty() => interp.run(&self.root, &Env::default()),
            None => Err(RuntimeError::Arity {
                expected: 0,
                found: args.len(),
            }),
        }
    }
}

pub(crate) fn check(expr: &Expr) -> IrResult<()> {
    Checker::default().check(expr)
}

// ── Checker ──────────────────────────────────────────────────────────

#[derive(Default)]
struct Checker {
    /// Reachable labels per scope; `None` marks a lambda boundary.
    labels: Vec<Option<Vec<LabelTarget>>>,
    variables: Vec<Variable>,
    /// `true` inside a catch clause, `false` at a lambda boundary.
    handlers: Vec<bool>,
}

impl Checker {
    fn check(&mut self, expr: &Expr) -> IrResult<()> {
        if expr.is_extended() {
            return Err(IrError::unsupported(format!(
                "{} must be reduced before compilation",
                expr.kind_name()
            )));
        }
        match expr.kind() {
            ExprKind::Variable(v) => {
                if self.variables.contains(v) {
                    Ok(())
                } else {
                    Err(IrError::shape("expr", format!("variable `{}` is not in scope", v.name())))
                }
            }
            ExprKind::Block(b) => {
                let mark = self.variables.len();
                self.variables.extend(b.variables.iter().cloned());
                self.labels.push(Some(block_labels(&b.exprs)));
                let result = b.exprs.iter().try_for_each(|e| self.check(e));
                self.labels.pop();
                self.variables.truncate(mark);
                result
            }
            ExprKind::Loop(l) => {
                let own = l.break_label.iter().chain(&l.continue_label).cloned().collect();
                self.labels.push(Some(own));
                let result = self.check(&l.body);
                self.labels.pop();
                result
            }
            ExprKind::Lambda(l) => {
                let mark = self.variables.len();
                self.variables.extend(l.params.iter().cloned());
                self.labels.push(None);
                self.handlers.push(false);
                let result = self.check(&l.body);
                self.handlers.pop();
                self.labels.pop();
                self.variables.truncate(mark);
                result
            }
            ExprKind::Goto(g) => {
                if !self.reachable(&g.target) {
                    return Err(IrError::shape(
                        "target",
                        format!("label `{}` is not in scope", g.target.name()),
                    ));
                }
                g.value.iter().try_for_each(|v| self.check(v))
            }
            ExprKind::Try(t) => {
                self.check(&t.body)?;
                for handler in &t.handlers {
                    let mark = self.variables.len();
                    self.variables.extend(handler.variable.iter().cloned());
                    let filter = handler.filter.iter().try_for_each(|f| self.check(f));
                    self.handlers.push(true);
                    let body = filter.and_then(|()| self.check(&handler.body));
                    self.handlers.pop();
                    self.variables.truncate(mark);
                    body?;
                }
                t.finally.iter().chain(&t.fault).try_for_each(|e| self.check(e))
            }
            ExprKind::Throw(t) if t.value.is_none() => {
                if self.handlers.last() == Some(&true) {
                    Ok(())
                } else {
                    Err(IrError::shape("value", "a rethrow must be inside a catch clause"))
                }
            }
            _ => expr.children_ref().into_iter().try_for_each(|c| self.check(c)),
        }
    }

    fn reachable(&self, target: &LabelTarget) -> bool {
        for scope in self.labels.iter().rev() {
            match scope {
                None => return false,
                Some(labels) if labels.contains(target) => return true,
                Some(_) => {}
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_common::ErrorKind;
    use arbor_ir::ext::LoopLabels;

    #[test]
    fn extended_nodes_are_rejected() {
        let tree = Expr::while_loop(Expr::bool(false), Expr::empty(), LoopLabels::none()).unwrap();
        let err = compile(&tree).err().unwrap();
        assert_eq!(err.kind, ErrorKind::UnsupportedNodeKind);
    }

    #[test]
    fn free_variables_are_rejected() {
        let x = Variable::new("x", Ty::Int);
        let err = compile(&Expr::var(&x)).err().unwrap();
        assert_eq!(err.to_string(), "invalid argument `expr`: variable `x` is not in scope");
    }

    #[test]
    fn jumps_cannot_leave_a_lambda() {
        let outer = LabelTarget::new("out");
        let inner = Expr::lambda(vec![], Expr::goto(&outer).unwrap(), Ty::Void).unwrap();
        let tree = Expr::seq(vec![inner, Expr::label(&outer, None).unwrap()]).unwrap();
        assert!(compile(&tree).is_err());
    }

    #[test]
    fn rethrow_needs_a_catch() {
        assert!(compile(&Expr::rethrow()).is_err());
        let caught = Expr::try_catch(
            Expr::throw(Some(Expr::int(1)), Ty::Void).unwrap(),
            vec![arbor_ir::CatchBlock::catch_all(Expr::rethrow())],
        )
        .unwrap();
        assert!(compile(&caught).is_ok());
    }
}
