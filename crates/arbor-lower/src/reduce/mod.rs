//! The reduction engine: rewrite every extended node into the core
//! vocabulary.
//!
//! `Reducer` is a [`Visitor`] whose extended-kind hooks each produce an
//! equivalent core subtree. Lowerings are grouped by family:
//!
//! - `loops`: `while`, `do-while`, `for`, `for-each`
//! - `switch`: switch with companion tests and `goto case`
//! - `scope`: statement blocks and `using`
//! - `access`: conditional access, array access, `^n`, ranges
//! - `assign`: compound assignment and increment/decrement on any target
//! - `calls`: argument bindings for call/invoke/new/indexer
//! - `dynamic`: late-bound operations
//! - `values`: interpolated strings, tuples, `with`
//!
//! The reducer keeps an explicit lexical context: the labels a jump may
//! target, the case table of the innermost switch, and the replacement for
//! each conditional-access placeholder being lowered. A reference that does
//! not resolve against that context is an internal inconsistency.

mod access;
mod assign;
mod calls;
mod dynamic;
mod loops;
mod place;
mod scope;
mod switch;
mod values;

use rustc_hash::FxHashSet;

use arbor_common::{IrError, IrResult, Ty};
use arbor_ir::ext::CaseTest;
use arbor_ir::labels::block_labels;
use arbor_ir::{walk, Expr, ExprKind, LabelTarget, Placeholder, Variable, Visitor};

use crate::optimize::optimize_preserving_labels;
use crate::options::LowerOptions;

/// One level of the lexical context.
enum Scope {
    /// Labels a jump from inside this level may target.
    Labels(Vec<LabelTarget>),
    /// Case labels of a switch body, for `goto case` / `goto default`.
    Switch(CaseTable),
    /// Jumps never cross a lambda boundary.
    Lambda,
}

struct CaseTable {
    cases: Vec<(CaseTest, LabelTarget)>,
}

impl CaseTable {
    fn target(&self, test: &CaseTest) -> Option<&LabelTarget> {
        self.cases.iter().find(|(t, _)| t == test).map(|(_, l)| l)
    }
}

/// Temporaries and the statements that initialize them, evaluated ahead of
/// the expression they feed.
#[derive(Default)]
pub(crate) struct Sequence {
    variables: Vec<Variable>,
    prelude: Vec<Expr>,
}

impl Sequence {
    /// Assign `value` to `var` and return a reference to it.
    fn bind(&mut self, var: Variable, value: Expr) -> IrResult<Expr> {
        let read = Expr::var(&var);
        self.prelude.push(Expr::assign(read.clone(), value)?);
        self.variables.push(var);
        Ok(read)
    }

    fn push(&mut self, stmt: Expr) {
        self.prelude.push(stmt);
    }

    fn is_empty(&self) -> bool {
        self.variables.is_empty() && self.prelude.is_empty()
    }

    /// `result` preceded by the prelude, typed as `result`.
    fn finish(self, result: Expr) -> IrResult<Expr> {
        let ty = result.ty();
        self.finish_as(result, ty)
    }

    fn finish_as(self, result: Expr, ty: Ty) -> IrResult<Expr> {
        if self.is_empty() {
            return Ok(result);
        }
        let mut exprs = self.prelude;
        exprs.push(result);
        Expr::block_typed(self.variables, exprs, ty)
    }
}

/// Lowers extended trees to core trees. One reducer handles one tree.
pub struct Reducer<'o> {
    options: &'o LowerOptions,
    scopes: Vec<Scope>,
    declared: FxHashSet<LabelTarget>,
    receivers: Vec<(Placeholder, Expr)>,
    temps: usize,
}

impl<'o> Reducer<'o> {
    pub fn new(options: &'o LowerOptions) -> Self {
        Reducer {
            options,
            scopes: Vec::new(),
            declared: FxHashSet::default(),
            receivers: Vec::new(),
            temps: 0,
        }
    }

    pub fn reduce(&mut self, expr: &Expr) -> IrResult<Expr> {
        let out = self.visit(expr)?;
        log::debug!("reduced {} with {} temporaries", expr.kind_name(), self.temps);
        Ok(out)
    }

    // ── Temporaries ──────────────────────────────────────────────────

    fn fresh_temp(&mut self, ty: Ty, hint: &str) -> Variable {
        self.temps += 1;
        let name = format!("{}{}", self.options.temp_prefix, hint);
        log::debug!("temporary `{name}`: {ty}");
        Variable::new(name, ty)
    }

    /// Evaluate `value` once into a fresh temporary.
    fn spill(&mut self, seq: &mut Sequence, value: Expr, hint: &str) -> IrResult<Expr> {
        let var = self.fresh_temp(value.ty(), hint);
        seq.bind(var, value)
    }

    /// Like [`Reducer::spill`], but leaves variables and constants in place.
    fn stabilize(&mut self, seq: &mut Sequence, value: Expr, hint: &str) -> IrResult<Expr> {
        match value.kind() {
            ExprKind::Variable(_) | ExprKind::Constant(_) | ExprKind::Default(_) => Ok(value),
            _ => self.spill(seq, value, hint),
        }
    }

    /// Evaluate `value` once for use after later operands have run. Only
    /// constants stay in place: a variable may be reassigned by an operand
    /// that follows it.
    fn capture(&mut self, seq: &mut Sequence, value: Expr, hint: &str) -> IrResult<Expr> {
        match value.kind() {
            ExprKind::Constant(_) | ExprKind::Default(_) => Ok(value),
            _ => self.spill(seq, value, hint),
        }
    }

    /// [`Reducer::capture`] for the object a member or indexer is reached
    /// through. A value-type variable is the storage itself and stays put.
    fn capture_receiver(&mut self, seq: &mut Sequence, object: Expr) -> IrResult<Expr> {
        match object.kind() {
            ExprKind::Variable(v) if v.ty().is_value_type() => Ok(object),
            _ => self.capture(seq, object, "recv"),
        }
    }

    // ── Lexical context ──────────────────────────────────────────────

    fn declare(&mut self, label: &LabelTarget) -> IrResult<()> {
        if !self.declared.insert(label.clone()) {
            return Err(IrError::internal(format!("label `{}` is declared twice", label.name())));
        }
        Ok(())
    }

    fn with_scope<T>(&mut self, scope: Scope, f: impl FnOnce(&mut Self) -> IrResult<T>) -> IrResult<T> {
        self.scopes.push(scope);
        let out = f(self);
        self.scopes.pop();
        out
    }

    fn with_labels<T>(
        &mut self,
        labels: Vec<LabelTarget>,
        f: impl FnOnce(&mut Self) -> IrResult<T>,
    ) -> IrResult<T> {
        self.with_scope(Scope::Labels(labels), f)
    }

    fn in_scope(&self, target: &LabelTarget) -> bool {
        for scope in self.scopes.iter().rev() {
            match scope {
                Scope::Labels(labels) if labels.contains(target) => return true,
                Scope::Lambda => return false,
                _ => {}
            }
        }
        false
    }

    fn case_target(&self, test: &CaseTest) -> IrResult<LabelTarget> {
        for scope in self.scopes.iter().rev() {
            match scope {
                Scope::Switch(table) => {
                    return table.target(test).cloned().ok_or_else(|| {
                        IrError::internal(format!("`goto case {test:?}` has no case in the enclosing switch"))
                    });
                }
                Scope::Lambda => break,
                Scope::Labels(_) => {}
            }
        }
        Err(IrError::internal(format!("`goto case {test:?}` outside a switch")))
    }

    /// Run the label-preserving optimizer over a freshly lowered node when
    /// configured to.
    fn polish(&self, lowered: Expr) -> Expr {
        if self.options.optimize_lowered_nodes {
            optimize_preserving_labels(&lowered)
        } else {
            lowered
        }
    }
}

fn mismatch(expected: &str, expr: &Expr) -> IrError {
    IrError::internal(format!("expected a {expected} node, found {}", expr.kind_name()))
}

impl Visitor for Reducer<'_> {
    type Error = IrError;

    fn visit(&mut self, expr: &Expr) -> IrResult<Expr> {
        if expr.is_extended() {
            log::trace!("lowering {}", expr.kind_name());
        }
        walk(self, expr)
    }

    // ── Core nodes that carry lexical context ────────────────────────

    fn visit_block(&mut self, expr: &Expr) -> IrResult<Expr> {
        let ExprKind::Block(b) = expr.kind() else {
            return Err(mismatch("block", expr));
        };
        self.with_labels(block_labels(&b.exprs), |r| r.visit_children(expr))
    }

    fn visit_loop(&mut self, expr: &Expr) -> IrResult<Expr> {
        let ExprKind::Loop(l) = expr.kind() else {
            return Err(mismatch("loop", expr));
        };
        let labels: Vec<LabelTarget> = l.break_label.iter().chain(&l.continue_label).cloned().collect();
        for label in &labels {
            self.declare(label)?;
        }
        self.with_labels(labels, |r| r.visit_children(expr))
    }

    fn visit_label(&mut self, expr: &Expr) -> IrResult<Expr> {
        let ExprKind::Label(l) = expr.kind() else {
            return Err(mismatch("label", expr));
        };
        self.declare(&l.target)?;
        self.visit_children(expr)
    }

    fn visit_goto(&mut self, expr: &Expr) -> IrResult<Expr> {
        let ExprKind::Goto(g) = expr.kind() else {
            return Err(mismatch("goto", expr));
        };
        if !self.in_scope(&g.target) {
            return Err(IrError::internal(format!(
                "{} to label `{}` which is not in scope",
                g.kind.name(),
                g.target.name()
            )));
        }
        self.visit_children(expr)
    }

    fn visit_lambda(&mut self, expr: &Expr) -> IrResult<Expr> {
        self.with_scope(Scope::Lambda, |r| r.visit_children(expr))
    }

    fn visit_call(&mut self, expr: &Expr) -> IrResult<Expr> {
        let ExprKind::Call(c) = expr.kind() else {
            return Err(mismatch("call", expr));
        };
        let needs_places = c
            .method
            .params()
            .iter()
            .zip(&c.args)
            .any(|(p, a)| p.by_ref && a.is_extended());
        if needs_places {
            self.lower_call_with_places(c)
        } else {
            self.visit_children(expr)
        }
    }

    // ── Extended nodes ───────────────────────────────────────────────

    fn visit_while(&mut self, expr: &Expr) -> IrResult<Expr> {
        let ExprKind::While(w) = expr.kind() else {
            return Err(mismatch("while", expr));
        };
        self.lower_while(w)
    }

    fn visit_do_while(&mut self, expr: &Expr) -> IrResult<Expr> {
        let ExprKind::DoWhile(d) = expr.kind() else {
            return Err(mismatch("do-while", expr));
        };
        self.lower_do_while(d)
    }

    fn visit_for(&mut self, expr: &Expr) -> IrResult<Expr> {
        let ExprKind::For(f) = expr.kind() else {
            return Err(mismatch("for", expr));
        };
        self.lower_for(f)
    }

    fn visit_for_each(&mut self, expr: &Expr) -> IrResult<Expr> {
        let ExprKind::ForEach(f) = expr.kind() else {
            return Err(mismatch("for-each", expr));
        };
        self.lower_for_each(f)
    }

    fn visit_switch(&mut self, expr: &Expr) -> IrResult<Expr> {
        let ExprKind::Switch(s) = expr.kind() else {
            return Err(mismatch("switch", expr));
        };
        self.lower_switch(s)
    }

    fn visit_goto_case(&mut self, expr: &Expr) -> IrResult<Expr> {
        let ExprKind::GotoCase(value) = expr.kind() else {
            return Err(mismatch("goto-case", expr));
        };
        let target = self.case_target(&CaseTest::Value(value.clone()))?;
        Expr::goto(&target)
    }

    fn visit_goto_default(&mut self, _expr: &Expr) -> IrResult<Expr> {
        let target = self.case_target(&CaseTest::Default)?;
        Expr::goto(&target)
    }

    fn visit_stmt_block(&mut self, expr: &Expr) -> IrResult<Expr> {
        let ExprKind::StmtBlock(b) = expr.kind() else {
            return Err(mismatch("statement-block", expr));
        };
        self.lower_stmt_block(b)
    }

    fn visit_using(&mut self, expr: &Expr) -> IrResult<Expr> {
        let ExprKind::Using(u) = expr.kind() else {
            return Err(mismatch("using", expr));
        };
        self.lower_using(u)
    }

    fn visit_conditional_access(&mut self, expr: &Expr) -> IrResult<Expr> {
        let ExprKind::ConditionalAccess(c) = expr.kind() else {
            return Err(mismatch("conditional-access", expr));
        };
        self.lower_conditional_access(c)
    }

    fn visit_conditional_receiver(&mut self, expr: &Expr) -> IrResult<Expr> {
        let ExprKind::ConditionalReceiver(p) = expr.kind() else {
            return Err(mismatch("conditional-receiver", expr));
        };
        self.receivers
            .iter()
            .rev()
            .find(|(placeholder, _)| placeholder == p)
            .map(|(_, value)| value.clone())
            .ok_or_else(|| IrError::internal("conditional receiver used outside its conditional access"))
    }

    fn visit_compound_assign(&mut self, expr: &Expr) -> IrResult<Expr> {
        let ExprKind::CompoundAssign(c) = expr.kind() else {
            return Err(mismatch("compound-assign", expr));
        };
        self.lower_compound_assign(c)
    }

    fn visit_unary_assign(&mut self, expr: &Expr) -> IrResult<Expr> {
        let ExprKind::UnaryAssign(u) = expr.kind() else {
            return Err(mismatch("unary-assign", expr));
        };
        self.lower_unary_assign(u)
    }

    fn visit_call_binding(&mut self, expr: &Expr) -> IrResult<Expr> {
        let ExprKind::CallBinding(c) = expr.kind() else {
            return Err(mismatch("call-binding", expr));
        };
        self.lower_call_binding(c)
    }

    fn visit_invoke_binding(&mut self, expr: &Expr) -> IrResult<Expr> {
        let ExprKind::InvokeBinding(i) = expr.kind() else {
            return Err(mismatch("invoke-binding", expr));
        };
        self.lower_invoke_binding(i)
    }

    fn visit_new_binding(&mut self, expr: &Expr) -> IrResult<Expr> {
        let ExprKind::NewBinding(n) = expr.kind() else {
            return Err(mismatch("new-binding", expr));
        };
        self.lower_new_binding(n)
    }

    fn visit_index_binding(&mut self, expr: &Expr) -> IrResult<Expr> {
        let ExprKind::IndexBinding(i) = expr.kind() else {
            return Err(mismatch("index-binding", expr));
        };
        self.lower_index_binding(i)
    }

    fn visit_array_access(&mut self, expr: &Expr) -> IrResult<Expr> {
        let ExprKind::ArrayAccess(a) = expr.kind() else {
            return Err(mismatch("array-access", expr));
        };
        self.lower_array_access(a)
    }

    fn visit_from_end_index(&mut self, expr: &Expr) -> IrResult<Expr> {
        let ExprKind::FromEndIndex(value) = expr.kind() else {
            return Err(mismatch("from-end-index", expr));
        };
        let value = self.visit(value)?;
        Expr::new_index(value, Expr::bool(true))
    }

    fn visit_range(&mut self, expr: &Expr) -> IrResult<Expr> {
        let ExprKind::Range(r) = expr.kind() else {
            return Err(mismatch("range", expr));
        };
        self.lower_range(r)
    }

    fn visit_interpolated_string(&mut self, expr: &Expr) -> IrResult<Expr> {
        let ExprKind::InterpolatedString(s) = expr.kind() else {
            return Err(mismatch("interpolated-string", expr));
        };
        self.lower_interpolated(s)
    }

    fn visit_tuple_convert(&mut self, expr: &Expr) -> IrResult<Expr> {
        let ExprKind::TupleConvert(t) = expr.kind() else {
            return Err(mismatch("tuple-convert", expr));
        };
        self.lower_tuple_convert(t)
    }

    fn visit_tuple_literal(&mut self, expr: &Expr) -> IrResult<Expr> {
        let ExprKind::TupleLiteral(t) = expr.kind() else {
            return Err(mismatch("tuple-literal", expr));
        };
        let items = t.items.iter().map(|i| self.visit(i)).collect::<IrResult<Vec<_>>>()?;
        values::nest_tuple(items)
    }

    fn visit_dynamic(&mut self, expr: &Expr) -> IrResult<Expr> {
        let ExprKind::DynamicOp(d) = expr.kind() else {
            return Err(mismatch("dynamic", expr));
        };
        self.lower_dynamic(d)
    }

    fn visit_with(&mut self, expr: &Expr) -> IrResult<Expr> {
        let ExprKind::With(w) = expr.kind() else {
            return Err(mismatch("with", expr));
        };
        self.lower_with(w)
    }
}
