//! Switch with companion test values and `goto case` fall-through.

use arbor_common::{IrError, IrResult, Literal, Method, Ty};

use crate::build::{check_distinct_variables, check_void_label};
use crate::expr::{Expr, ExprKind};
use crate::node::{LabelTarget, Variable};

/// One test value of a case. `Default` is the synthetic catch-all.
#[derive(Clone, Debug, PartialEq)]
pub enum CaseTest {
    Value(Literal),
    Default,
}

impl CaseTest {
    pub fn int(value: i64) -> CaseTest {
        CaseTest::Value(Literal::Int(value))
    }

    pub fn str(value: impl Into<String>) -> CaseTest {
        CaseTest::Value(Literal::Str(value.into()))
    }

    pub fn null() -> CaseTest {
        CaseTest::Value(Literal::Null)
    }
}

#[derive(Debug, PartialEq)]
pub struct SwitchCase {
    /// Companion test values sharing this body.
    pub tests: Vec<CaseTest>,
    pub body: Expr,
}

impl SwitchCase {
    pub fn new(tests: Vec<CaseTest>, body: Expr) -> IrResult<SwitchCase> {
        if tests.is_empty() {
            return Err(IrError::shape("tests", "a case needs at least one test value"));
        }
        for (i, t) in tests.iter().enumerate() {
            if tests[..i].contains(t) {
                return Err(IrError::shape("tests", format!("duplicate test value {t:?}")));
            }
        }
        Ok(SwitchCase { tests, body })
    }

    pub fn is_default(&self) -> bool {
        self.tests.contains(&CaseTest::Default)
    }
}

#[derive(Debug, PartialEq)]
pub struct Switch {
    pub subject: Expr,
    pub cases: Vec<SwitchCase>,
    /// Static `(subject, test) -> Bool` used instead of `==`.
    pub comparison: Option<Method>,
    pub break_label: Option<LabelTarget>,
    /// Locals scoped to the whole switch.
    pub variables: Vec<Variable>,
}

impl Switch {
    /// Type the test constants are compared as.
    pub fn test_ty(&self) -> Ty {
        match &self.comparison {
            Some(m) => m.params()[1].ty.clone(),
            None => self.subject.ty(),
        }
    }

    pub fn case_of(&self, test: &CaseTest) -> Option<usize> {
        self.cases.iter().position(|c| c.tests.contains(test))
    }
}

/// Collect every `goto case` / `goto default` that belongs to this switch:
/// everything in the bodies except nested switches and lambdas.
fn own_jumps<'a>(expr: &'a Expr, out: &mut Vec<&'a ExprKind>) {
    match expr.kind() {
        ExprKind::GotoCase(_) | ExprKind::GotoDefault => out.push(expr.kind()),
        ExprKind::Switch(_) | ExprKind::Lambda(_) => {}
        _ => {
            for child in expr.children_ref() {
                own_jumps(child, out);
            }
        }
    }
}

fn check_test_ty(value: &Literal, ty: &Ty, nullable_ok: bool) -> IrResult<()> {
    match value {
        Literal::Null if !nullable_ok => Err(IrError::shape(
            "cases",
            format!("null is not a value of {ty}"),
        )),
        Literal::Null => Ok(()),
        other if other.fits(ty.non_nullable()) || other.fits(ty) => Ok(()),
        other => Err(IrError::shape(
            "cases",
            format!("test value {other} does not match {ty}"),
        )),
    }
}

impl Expr {
    pub fn switch(
        subject: Expr,
        cases: Vec<SwitchCase>,
        comparison: Option<Method>,
        break_label: Option<LabelTarget>,
        variables: Vec<Variable>,
    ) -> IrResult<Expr> {
        let subject_ty = subject.ty();
        if subject_ty.is_void() {
            return Err(IrError::shape("subject", "cannot switch on a Void value"));
        }
        check_void_label(break_label.as_ref(), "break_label")?;
        check_distinct_variables(&variables, "local")?;

        let test_ty = match &comparison {
            Some(m) => {
                if !m.is_static() || m.params().len() != 2 || m.ret() != &Ty::Bool {
                    return Err(IrError::shape(
                        "comparison",
                        "a comparison is a static (subject, test) -> Bool method",
                    ));
                }
                if !m.params()[0].ty.accepts(&subject_ty) {
                    return Err(IrError::shape(
                        "comparison",
                        format!("comparison takes {}, subject is {subject_ty}", m.params()[0].ty),
                    ));
                }
                m.params()[1].ty.clone()
            }
            None => subject_ty.clone(),
        };

        let mut seen: Vec<&CaseTest> = Vec::new();
        let mut natural: Option<Ty> = None;
        for case in &cases {
            for test in &case.tests {
                if seen.contains(&test) {
                    return Err(IrError::shape("cases", format!("test value {test:?} appears twice")));
                }
                seen.push(test);
                let CaseTest::Value(value) = test else {
                    continue;
                };
                check_test_ty(value, &test_ty, test_ty.is_nullable())?;
                if let Some(ty) = value.natural_type() {
                    match &natural {
                        Some(prev) if prev != &ty => {
                            return Err(IrError::shape(
                                "cases",
                                format!("test values mix {prev} and {ty}"),
                            ));
                        }
                        _ => natural = Some(ty),
                    }
                }
            }
        }

        let mut jumps = Vec::new();
        for case in &cases {
            own_jumps(&case.body, &mut jumps);
        }
        for jump in jumps {
            let test = match jump {
                ExprKind::GotoCase(value) => CaseTest::Value(value.clone()),
                _ => CaseTest::Default,
            };
            if !seen.contains(&&test) {
                return Err(IrError::shape(
                    "cases",
                    format!("`goto case {test:?}` has no matching case"),
                ));
            }
        }

        Ok(Expr::from_kind(ExprKind::Switch(Switch {
            subject,
            cases,
            comparison,
            break_label,
            variables,
        })))
    }
}
