//! Label scoping helpers shared by the reducer, the optimizer and the tree
//! compiler.
//!
//! A jump may target a label declared by an enclosing loop, by an enclosing
//! statement block's return label, or by a label statement that sits in the
//! statement list of an enclosing block (directly, or inside a block nested
//! directly in that list).

use rustc_hash::FxHashSet;

use crate::expr::{Expr, ExprKind};
use crate::node::LabelTarget;

/// Label statements reachable by a jump from inside a block with these
/// statements.
pub fn block_labels(exprs: &[Expr]) -> Vec<LabelTarget> {
    let mut out = Vec::new();
    collect_block_labels(exprs, &mut out);
    out
}

fn collect_block_labels(exprs: &[Expr], out: &mut Vec<LabelTarget>) {
    for e in exprs {
        match e.kind() {
            ExprKind::Label(l) => out.push(l.target.clone()),
            ExprKind::Block(b) => collect_block_labels(&b.exprs, out),
            ExprKind::StmtBlock(b) => collect_block_labels(&b.statements, out),
            _ => {}
        }
    }
}

/// Whether the statement list contains the label statement for `target`,
/// directly or in a nested block.
pub fn declares_label(exprs: &[Expr], target: &LabelTarget) -> bool {
    exprs.iter().any(|e| match e.kind() {
        ExprKind::Label(l) => &l.target == target,
        ExprKind::Block(b) => declares_label(&b.exprs, target),
        ExprKind::StmtBlock(b) => declares_label(&b.statements, target),
        _ => false,
    })
}

/// Every label targeted by a jump anywhere in `expr`.
pub fn jump_targets(expr: &Expr) -> FxHashSet<LabelTarget> {
    let mut out = FxHashSet::default();
    collect_jump_targets(expr, &mut out);
    out
}

fn collect_jump_targets(expr: &Expr, out: &mut FxHashSet<LabelTarget>) {
    if let ExprKind::Goto(g) = expr.kind() {
        out.insert(g.target.clone());
    }
    for child in expr.children_ref() {
        collect_jump_targets(child, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_common::Ty;

    #[test]
    fn nested_block_labels_are_visible() {
        let outer = LabelTarget::new("outer");
        let inner = LabelTarget::new("inner");
        let hidden = LabelTarget::new("hidden");
        let nested = Expr::seq(vec![Expr::label(&inner, None).unwrap()]).unwrap();
        let guarded = Expr::if_then(Expr::bool(true), Expr::label(&hidden, None).unwrap()).unwrap();
        let stmts = vec![Expr::label(&outer, None).unwrap(), nested, guarded];
        assert_eq!(block_labels(&stmts), vec![outer.clone(), inner.clone()]);
        assert!(declares_label(&stmts, &inner));
        assert!(!declares_label(&stmts, &hidden));
    }

    #[test]
    fn collects_jump_targets() {
        let l = LabelTarget::typed("l", Ty::Int);
        let e = Expr::seq(vec![Expr::return_to(&l, Some(Expr::int(1))).unwrap(), Expr::label(&l, Some(Expr::int(0))).unwrap()])
            .unwrap();
        assert!(jump_targets(&e).contains(&l));
    }
}
