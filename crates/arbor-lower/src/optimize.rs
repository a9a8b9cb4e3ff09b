//! Semantics-preserving cleanup of core trees.
//!
//! The optimizer removes what lowering leaves behind: nested blocks without
//! locals, statements without effects, labels nothing jumps to, `try`
//! regions around bodies that cannot throw, and postfix increments whose
//! old value is discarded. It never fails; a rewrite that would not
//! validate keeps the original node. Passes repeat until nothing changes,
//! so optimizing an optimized tree returns it unchanged.

use rustc_hash::FxHashSet;

use arbor_common::{IrError, Literal, Ty};
use arbor_ir::expr::{Block, Conditional, Loop, Try};
use arbor_ir::labels::jump_targets;
use arbor_ir::{BinaryOp, Expr, ExprKind, LabelTarget, UnaryOp, Visitor};

/// Passes after which the optimizer gives up looking for a fixpoint.
const MAX_PASSES: usize = 32;

/// Optimize a whole tree. Labels no jump in the tree targets are removed.
pub fn optimize(expr: &Expr) -> Expr {
    run(expr, true)
}

/// Optimize a subtree that jumps from outside may still target: every
/// label is kept.
pub fn optimize_preserving_labels(expr: &Expr) -> Expr {
    run(expr, false)
}

fn run(expr: &Expr, remove_labels: bool) -> Expr {
    let mut current = expr.clone();
    for pass in 0..MAX_PASSES {
        let mut opt = Optimizer {
            targets: jump_targets(&current),
            remove_labels,
        };
        let next = match opt.visit(&current) {
            Ok(next) => next,
            Err(err) => {
                log::debug!("optimizer stopped on pass {pass}: {err}");
                return current;
            }
        };
        if Expr::ptr_eq(&next, &current) {
            log::trace!("optimizer reached a fixpoint after {pass} passes");
            return current;
        }
        current = next;
    }
    log::debug!("optimizer gave up after {MAX_PASSES} passes without reaching a fixpoint");
    current
}

struct Optimizer {
    targets: FxHashSet<LabelTarget>,
    remove_labels: bool,
}

impl Optimizer {
    fn is_targeted(&self, label: &LabelTarget) -> bool {
        self.targets.contains(label)
    }

    /// Whether evaluating `expr` has no observable effect: no writes, no
    /// calls, no jumps, and it cannot throw.
    fn is_pure(&self, expr: &Expr) -> bool {
        match expr.kind() {
            ExprKind::Constant(_) | ExprKind::Default(_) | ExprKind::Variable(_) | ExprKind::Lambda(_) => true,
            ExprKind::Label(l) => {
                self.remove_labels
                    && !self.is_targeted(&l.target)
                    && l.default.as_ref().is_none_or(|d| self.is_pure(d))
            }
            ExprKind::Block(_)
            | ExprKind::Conditional(_)
            | ExprKind::NewTuple(_)
            | ExprKind::NewArray(_)
            | ExprKind::TupleItem(_) => self.children_pure(expr),
            ExprKind::Unary(u) => !u.op.is_assignment() && u.method.is_none() && self.is_pure(&u.operand),
            ExprKind::Binary(b) => {
                let traps = matches!(b.op, BinaryOp::Div | BinaryOp::Rem) && b.left.ty() == Ty::Int;
                b.method.is_none() && !traps && self.children_pure(expr)
            }
            ExprKind::Convert(c) => c.ty.is_assignable_from(&c.operand.ty()) && self.is_pure(&c.operand),
            ExprKind::New(n) => {
                n.ctor.is_none() && matches!(n.ty, Ty::Index | Ty::Range) && self.children_pure(expr)
            }
            ExprKind::Try(t) => self.is_pure(&t.body) && t.finally.as_ref().is_none_or(|f| self.is_pure(f)),
            _ => false,
        }
    }

    fn children_pure(&self, expr: &Expr) -> bool {
        expr.children_ref().into_iter().all(|c| self.is_pure(c))
    }

    fn simplify(&self, expr: Expr) -> Expr {
        let simplified = match expr.kind() {
            ExprKind::Block(b) => self.simplify_block(&expr, b),
            ExprKind::Loop(l) => self.simplify_loop(l),
            ExprKind::Label(l) if self.remove_labels && !self.is_targeted(&l.target) => {
                log::trace!("dropping unused label `{}`", l.target.name());
                Some(match &l.default {
                    Some(d) => d.clone(),
                    None if l.target.ty().is_void() => Expr::empty(),
                    None => Expr::default_of(l.target.ty().clone()),
                })
            }
            ExprKind::Try(t) => self.simplify_try(t),
            ExprKind::Conditional(c) => simplify_conditional(c),
            _ => None,
        };
        simplified.unwrap_or(expr)
    }

    fn simplify_block(&self, expr: &Expr, b: &Block) -> Option<Expr> {
        let typed = !b.ty.is_void();
        let last = b.exprs.len().saturating_sub(1);
        let mut changed = false;
        let mut exprs = Vec::with_capacity(b.exprs.len());
        for (i, e) in b.exprs.iter().enumerate() {
            let value_slot = typed && i == last;
            if value_slot {
                exprs.push(e.clone());
                continue;
            }
            if self.is_pure(e) {
                log::trace!("dropping a {} without effect", e.kind_name());
                changed = true;
                continue;
            }
            match e.kind() {
                ExprKind::Block(inner) if inner.variables.is_empty() => {
                    changed = true;
                    exprs.extend(inner.exprs.iter().filter(|s| !self.is_pure(s)).map(discard_old_value));
                }
                _ => {
                    let stmt = discard_old_value(e);
                    changed |= !Expr::ptr_eq(&stmt, e);
                    exprs.push(stmt);
                }
            }
        }

        if b.variables.is_empty() {
            if exprs.is_empty() && !typed {
                return Some(Expr::empty());
            }
            if exprs.len() == 1 && exprs[0].ty() == b.ty {
                return exprs.pop();
            }
        }
        if !changed {
            return None;
        }
        match Expr::block_typed(b.variables.clone(), exprs, b.ty.clone()) {
            Ok(rebuilt) => Some(rebuilt),
            Err(err) => {
                log::trace!("keeping {}: {err}", expr.kind_name());
                None
            }
        }
    }

    fn simplify_loop(&self, l: &Loop) -> Option<Expr> {
        if !self.remove_labels {
            return None;
        }
        let unused = |label: &Option<LabelTarget>| {
            label.as_ref().is_some_and(|t| t.ty().is_void() && !self.is_targeted(t))
        };
        let drop_break = unused(&l.break_label);
        let drop_continue = unused(&l.continue_label);
        if !drop_break && !drop_continue {
            return None;
        }
        let break_label = if drop_break { None } else { l.break_label.clone() };
        let continue_label = if drop_continue { None } else { l.continue_label.clone() };
        Expr::loop_expr(l.body.clone(), break_label, continue_label).ok()
    }

    fn simplify_try(&self, t: &Try) -> Option<Expr> {
        let finally = t.finally.as_ref().filter(|f| !self.is_pure(f));
        if self.is_pure(&t.body) {
            log::trace!("body of try cannot throw");
            return match finally {
                Some(f) if !t.handlers.is_empty() || t.fault.is_some() => {
                    Expr::try_finally(t.body.clone(), f.clone()).ok()
                }
                Some(_) => None,
                None => Some(t.body.clone()),
            };
        }
        if t.finally.is_some() && finally.is_none() {
            log::trace!("dropping a finally without effect");
            if t.handlers.is_empty() {
                return Some(t.body.clone());
            }
            let handlers = t.handlers.clone();
            return Expr::try_expr(t.body.clone(), handlers, None, None).ok();
        }
        None
    }
}

/// `if (true) a else b` is `a` when the types agree.
fn simplify_conditional(c: &Conditional) -> Option<Expr> {
    let ExprKind::Constant(k) = c.test.kind() else {
        return None;
    };
    let branch = match k.value {
        Literal::Bool(true) => &c.if_true,
        Literal::Bool(false) => &c.if_false,
        _ => return None,
    };
    (branch.ty() == c.ty).then(|| branch.clone())
}

/// A postfix increment whose value is discarded becomes the prefix form.
fn discard_old_value(stmt: &Expr) -> Expr {
    let ExprKind::Unary(u) = stmt.kind() else {
        return stmt.clone();
    };
    let prefix = match u.op {
        UnaryOp::PostIncrementAssign => UnaryOp::PreIncrementAssign,
        UnaryOp::PostDecrementAssign => UnaryOp::PreDecrementAssign,
        _ => return stmt.clone(),
    };
    Expr::unary(prefix, u.operand.clone()).unwrap_or_else(|_| stmt.clone())
}

impl Visitor for Optimizer {
    type Error = IrError;

    fn rebuild(&mut self, expr: &Expr, children: Vec<Expr>) -> Result<Expr, IrError> {
        let rebuilt = expr.update(children).unwrap_or_else(|err| {
            log::trace!("keeping {}: {err}", expr.kind_name());
            expr.clone()
        });
        Ok(self.simplify(rebuilt))
    }
}
