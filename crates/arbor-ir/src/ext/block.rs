//! Statement blocks with a return label, and the switch-local jumps.

use arbor_common::{IrResult, Literal, Ty};

use crate::build::check_distinct_variables;
use crate::expr::{Expr, ExprKind};
use crate::node::{LabelTarget, Variable};

#[derive(Debug, PartialEq)]
pub struct StmtBlock {
    pub variables: Vec<Variable>,
    pub statements: Vec<Expr>,
    /// `return` inside the block jumps here; a typed label makes the block
    /// produce the returned value.
    pub return_label: Option<LabelTarget>,
}

impl StmtBlock {
    pub fn ty(&self) -> Ty {
        self.return_label
            .as_ref()
            .map(|l| l.ty().clone())
            .unwrap_or(Ty::Void)
    }
}

impl Expr {
    pub fn stmt_block(
        variables: Vec<Variable>,
        statements: Vec<Expr>,
        return_label: Option<LabelTarget>,
    ) -> IrResult<Expr> {
        check_distinct_variables(&variables, "local")?;
        Ok(Expr::from_kind(ExprKind::StmtBlock(StmtBlock {
            variables,
            statements,
            return_label,
        })))
    }

    /// `goto case value`. Whether the enclosing switch has such a case is
    /// checked when the switch is built.
    pub fn goto_case(value: Literal) -> Expr {
        Expr::from_kind(ExprKind::GotoCase(value))
    }

    pub fn goto_default() -> Expr {
        Expr::from_kind(ExprKind::GotoDefault)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_by_return_label() {
        let ret = LabelTarget::typed("ret", Ty::Int);
        let b = Expr::stmt_block(vec![], vec![Expr::empty()], Some(ret)).unwrap();
        assert_eq!(b.ty(), Ty::Int);
        let v = Expr::stmt_block(vec![], vec![], None).unwrap();
        assert_eq!(v.ty(), Ty::Void);
    }
}
