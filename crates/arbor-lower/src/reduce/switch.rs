//! Switch as a chain of tests jumping to labelled case bodies.
//!
//! ```text
//! { t = subject
//!   if (t == a || t == b) goto case0
//!   if (t == c) goto case1
//!   goto default-or-break
//!   case0: body0; break
//!   case1: body1; break
//!   break: }
//! ```
//!
//! Every body ends with a jump to the break label; control only moves
//! between bodies through `goto case` / `goto default`.

use arbor_common::{IrResult, Literal, Ty};
use arbor_ir::ext::{CaseTest, Switch};
use arbor_ir::{BinaryOp, Expr, LabelTarget, Visitor};

use super::{CaseTable, Reducer, Scope, Sequence};

impl Reducer<'_> {
    pub(super) fn lower_switch(&mut self, s: &Switch) -> IrResult<Expr> {
        let brk = match &s.break_label {
            Some(l) => {
                self.declare(l)?;
                l.clone()
            }
            None => LabelTarget::new(format!("{}break", self.options.temp_prefix)),
        };
        let prefix = self.options.temp_prefix.clone();
        let case_labels: Vec<LabelTarget> = (0..s.cases.len())
            .map(|i| LabelTarget::new(format!("{prefix}case{i}")))
            .collect();
        let table = CaseTable {
            cases: s
                .cases
                .iter()
                .zip(&case_labels)
                .flat_map(|(case, label)| case.tests.iter().map(move |t| (t.clone(), label.clone())))
                .collect(),
        };

        let mut seq = Sequence::default();
        let subject = self.visit(&s.subject)?;
        let subject = self.spill(&mut seq, subject, "subject")?;

        let bodies = self.with_labels(vec![brk.clone()], |r| {
            r.with_scope(Scope::Switch(table), |r| {
                s.cases.iter().map(|c| r.visit(&c.body)).collect::<IrResult<Vec<_>>>()
            })
        })?;

        let mut stmts = Vec::new();
        let mut fallback = &brk;
        for (case, label) in s.cases.iter().zip(&case_labels) {
            let mut matched: Option<Expr> = None;
            for test in &case.tests {
                let CaseTest::Value(value) = test else {
                    fallback = label;
                    continue;
                };
                let eq = self.case_test(s, &subject, value)?;
                matched = Some(match matched {
                    Some(prev) => Expr::binary(BinaryOp::OrElse, prev, eq)?,
                    None => eq,
                });
            }
            if let Some(test) = matched {
                stmts.push(Expr::if_then(test, Expr::goto(label)?)?);
            }
        }
        stmts.push(Expr::goto(fallback)?);
        for (body, label) in bodies.into_iter().zip(&case_labels) {
            stmts.push(Expr::label(label, None)?);
            stmts.push(body);
            stmts.push(Expr::break_to(&brk)?);
        }
        stmts.push(Expr::label(&brk, None)?);

        let mut variables = s.variables.clone();
        variables.append(&mut seq.variables);
        let mut exprs = seq.prelude;
        exprs.extend(stmts);
        let lowered = Expr::block_typed(variables, exprs, Ty::Void)?;
        Ok(self.polish(lowered))
    }

    /// `subject == value`, through the comparison method when there is one.
    fn case_test(&self, s: &Switch, subject: &Expr, value: &Literal) -> IrResult<Expr> {
        let constant = Expr::constant(value.clone(), s.test_ty())?;
        match &s.comparison {
            Some(method) => Expr::call_static(method, vec![subject.clone(), constant]),
            None => Expr::binary(BinaryOp::Equal, subject.clone(), constant),
        }
    }
}
