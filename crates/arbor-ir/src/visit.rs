//! Bottom-up tree rewriting.
//!
//! A [`Visitor`] has one hook per node kind. Every hook defaults to
//! [`Visitor::visit_children`]: visit each child in canonical order, then
//! rebuild the node through `update`, which hands back the same instance when
//! no child changed. Overriding a hook replaces the node entirely; call
//! `visit_children` from the override to keep descending.

use arbor_common::IrError;

use crate::expr::{Expr, ExprKind};

pub trait Visitor {
    type Error: From<IrError>;

    fn visit(&mut self, expr: &Expr) -> Result<Expr, Self::Error> {
        walk(self, expr)
    }

    fn visit_children(&mut self, expr: &Expr) -> Result<Expr, Self::Error> {
        let old = expr.children_ref();
        let mut new = Vec::with_capacity(old.len());
        for child in old {
            new.push(self.visit(child)?);
        }
        self.rebuild(expr, new)
    }

    /// Put a node back together over visited children.
    fn rebuild(&mut self, expr: &Expr, children: Vec<Expr>) -> Result<Expr, Self::Error> {
        Ok(expr.update(children)?)
    }

    // ── Core ─────────────────────────────────────────────────────────

    fn visit_constant(&mut self, expr: &Expr) -> Result<Expr, Self::Error> {
        self.visit_children(expr)
    }
    fn visit_default(&mut self, expr: &Expr) -> Result<Expr, Self::Error> {
        self.visit_children(expr)
    }
    fn visit_variable(&mut self, expr: &Expr) -> Result<Expr, Self::Error> {
        self.visit_children(expr)
    }
    fn visit_lambda(&mut self, expr: &Expr) -> Result<Expr, Self::Error> {
        self.visit_children(expr)
    }
    fn visit_assign(&mut self, expr: &Expr) -> Result<Expr, Self::Error> {
        self.visit_children(expr)
    }
    fn visit_unary(&mut self, expr: &Expr) -> Result<Expr, Self::Error> {
        self.visit_children(expr)
    }
    fn visit_binary(&mut self, expr: &Expr) -> Result<Expr, Self::Error> {
        self.visit_children(expr)
    }
    fn visit_convert(&mut self, expr: &Expr) -> Result<Expr, Self::Error> {
        self.visit_children(expr)
    }
    fn visit_conditional(&mut self, expr: &Expr) -> Result<Expr, Self::Error> {
        self.visit_children(expr)
    }
    fn visit_block(&mut self, expr: &Expr) -> Result<Expr, Self::Error> {
        self.visit_children(expr)
    }
    fn visit_loop(&mut self, expr: &Expr) -> Result<Expr, Self::Error> {
        self.visit_children(expr)
    }
    fn visit_goto(&mut self, expr: &Expr) -> Result<Expr, Self::Error> {
        self.visit_children(expr)
    }
    fn visit_label(&mut self, expr: &Expr) -> Result<Expr, Self::Error> {
        self.visit_children(expr)
    }
    fn visit_try(&mut self, expr: &Expr) -> Result<Expr, Self::Error> {
        self.visit_children(expr)
    }
    fn visit_throw(&mut self, expr: &Expr) -> Result<Expr, Self::Error> {
        self.visit_children(expr)
    }
    fn visit_call(&mut self, expr: &Expr) -> Result<Expr, Self::Error> {
        self.visit_children(expr)
    }
    fn visit_invoke(&mut self, expr: &Expr) -> Result<Expr, Self::Error> {
        self.visit_children(expr)
    }
    fn visit_new(&mut self, expr: &Expr) -> Result<Expr, Self::Error> {
        self.visit_children(expr)
    }
    fn visit_new_array(&mut self, expr: &Expr) -> Result<Expr, Self::Error> {
        self.visit_children(expr)
    }
    fn visit_new_tuple(&mut self, expr: &Expr) -> Result<Expr, Self::Error> {
        self.visit_children(expr)
    }
    fn visit_tuple_item(&mut self, expr: &Expr) -> Result<Expr, Self::Error> {
        self.visit_children(expr)
    }
    fn visit_member(&mut self, expr: &Expr) -> Result<Expr, Self::Error> {
        self.visit_children(expr)
    }
    fn visit_index(&mut self, expr: &Expr) -> Result<Expr, Self::Error> {
        self.visit_children(expr)
    }
    fn visit_array_length(&mut self, expr: &Expr) -> Result<Expr, Self::Error> {
        self.visit_children(expr)
    }
    fn visit_dynamic_call(&mut self, expr: &Expr) -> Result<Expr, Self::Error> {
        self.visit_children(expr)
    }
    fn visit_await(&mut self, expr: &Expr) -> Result<Expr, Self::Error> {
        self.visit_children(expr)
    }

    // ── Extended ─────────────────────────────────────────────────────

    fn visit_while(&mut self, expr: &Expr) -> Result<Expr, Self::Error> {
        self.visit_children(expr)
    }
    fn visit_do_while(&mut self, expr: &Expr) -> Result<Expr, Self::Error> {
        self.visit_children(expr)
    }
    fn visit_for(&mut self, expr: &Expr) -> Result<Expr, Self::Error> {
        self.visit_children(expr)
    }
    fn visit_for_each(&mut self, expr: &Expr) -> Result<Expr, Self::Error> {
        self.visit_children(expr)
    }
    fn visit_switch(&mut self, expr: &Expr) -> Result<Expr, Self::Error> {
        self.visit_children(expr)
    }
    fn visit_goto_case(&mut self, expr: &Expr) -> Result<Expr, Self::Error> {
        self.visit_children(expr)
    }
    fn visit_goto_default(&mut self, expr: &Expr) -> Result<Expr, Self::Error> {
        self.visit_children(expr)
    }
    fn visit_stmt_block(&mut self, expr: &Expr) -> Result<Expr, Self::Error> {
        self.visit_children(expr)
    }
    fn visit_using(&mut self, expr: &Expr) -> Result<Expr, Self::Error> {
        self.visit_children(expr)
    }
    fn visit_conditional_access(&mut self, expr: &Expr) -> Result<Expr, Self::Error> {
        self.visit_children(expr)
    }
    fn visit_conditional_receiver(&mut self, expr: &Expr) -> Result<Expr, Self::Error> {
        self.visit_children(expr)
    }
    fn visit_compound_assign(&mut self, expr: &Expr) -> Result<Expr, Self::Error> {
        self.visit_children(expr)
    }
    fn visit_unary_assign(&mut self, expr: &Expr) -> Result<Expr, Self::Error> {
        self.visit_children(expr)
    }
    fn visit_call_binding(&mut self, expr: &Expr) -> Result<Expr, Self::Error> {
        self.visit_children(expr)
    }
    fn visit_invoke_binding(&mut self, expr: &Expr) -> Result<Expr, Self::Error> {
        self.visit_children(expr)
    }
    fn visit_new_binding(&mut self, expr: &Expr) -> Result<Expr, Self::Error> {
        self.visit_children(expr)
    }
    fn visit_index_binding(&mut self, expr: &Expr) -> Result<Expr, Self::Error> {
        self.visit_children(expr)
    }
    fn visit_array_access(&mut self, expr: &Expr) -> Result<Expr, Self::Error> {
        self.visit_children(expr)
    }
    fn visit_from_end_index(&mut self, expr: &Expr) -> Result<Expr, Self::Error> {
        self.visit_children(expr)
    }
    fn visit_range(&mut self, expr: &Expr) -> Result<Expr, Self::Error> {
        self.visit_children(expr)
    }
    fn visit_interpolated_string(&mut self, expr: &Expr) -> Result<Expr, Self::Error> {
        self.visit_children(expr)
    }
    fn visit_tuple_convert(&mut self, expr: &Expr) -> Result<Expr, Self::Error> {
        self.visit_children(expr)
    }
    fn visit_tuple_literal(&mut self, expr: &Expr) -> Result<Expr, Self::Error> {
        self.visit_children(expr)
    }
    fn visit_dynamic(&mut self, expr: &Expr) -> Result<Expr, Self::Error> {
        self.visit_children(expr)
    }
    fn visit_with(&mut self, expr: &Expr) -> Result<Expr, Self::Error> {
        self.visit_children(expr)
    }
}

/// Dispatch `expr` to the visitor hook for its kind.
pub fn walk<V: Visitor + ?Sized>(v: &mut V, expr: &Expr) -> Result<Expr, V::Error> {
    match expr.kind() {
        ExprKind::Constant(_) => v.visit_constant(expr),
        ExprKind::Default(_) => v.visit_default(expr),
        ExprKind::Variable(_) => v.visit_variable(expr),
        ExprKind::Lambda(_) => v.visit_lambda(expr),
        ExprKind::Assign(_) => v.visit_assign(expr),
        ExprKind::Unary(_) => v.visit_unary(expr),
        ExprKind::Binary(_) => v.visit_binary(expr),
        ExprKind::Convert(_) => v.visit_convert(expr),
        ExprKind::Conditional(_) => v.visit_conditional(expr),
        ExprKind::Block(_) => v.visit_block(expr),
        ExprKind::Loop(_) => v.visit_loop(expr),
        ExprKind::Goto(_) => v.visit_goto(expr),
        ExprKind::Label(_) => v.visit_label(expr),
        ExprKind::Try(_) => v.visit_try(expr),
        ExprKind::Throw(_) => v.visit_throw(expr),
        ExprKind::Call(_) => v.visit_call(expr),
        ExprKind::Invoke(_) => v.visit_invoke(expr),
        ExprKind::New(_) => v.visit_new(expr),
        ExprKind::NewArray(_) => v.visit_new_array(expr),
        ExprKind::NewTuple(_) => v.visit_new_tuple(expr),
        ExprKind::TupleItem(_) => v.visit_tuple_item(expr),
        ExprKind::Member(_) => v.visit_member(expr),
        ExprKind::Index(_) => v.visit_index(expr),
        ExprKind::ArrayLength(_) => v.visit_array_length(expr),
        ExprKind::Dynamic(_) => v.visit_dynamic_call(expr),
        ExprKind::Await(_) => v.visit_await(expr),
        ExprKind::While(_) => v.visit_while(expr),
        ExprKind::DoWhile(_) => v.visit_do_while(expr),
        ExprKind::For(_) => v.visit_for(expr),
        ExprKind::ForEach(_) => v.visit_for_each(expr),
        ExprKind::Switch(_) => v.visit_switch(expr),
        ExprKind::GotoCase(_) => v.visit_goto_case(expr),
        ExprKind::GotoDefault => v.visit_goto_default(expr),
        ExprKind::StmtBlock(_) => v.visit_stmt_block(expr),
        ExprKind::Using(_) => v.visit_using(expr),
        ExprKind::ConditionalAccess(_) => v.visit_conditional_access(expr),
        ExprKind::ConditionalReceiver(_) => v.visit_conditional_receiver(expr),
        ExprKind::CompoundAssign(_) => v.visit_compound_assign(expr),
        ExprKind::UnaryAssign(_) => v.visit_unary_assign(expr),
        ExprKind::CallBinding(_) => v.visit_call_binding(expr),
        ExprKind::InvokeBinding(_) => v.visit_invoke_binding(expr),
        ExprKind::NewBinding(_) => v.visit_new_binding(expr),
        ExprKind::IndexBinding(_) => v.visit_index_binding(expr),
        ExprKind::ArrayAccess(_) => v.visit_array_access(expr),
        ExprKind::FromEndIndex(_) => v.visit_from_end_index(expr),
        ExprKind::Range(_) => v.visit_range(expr),
        ExprKind::InterpolatedString(_) => v.visit_interpolated_string(expr),
        ExprKind::TupleConvert(_) => v.visit_tuple_convert(expr),
        ExprKind::TupleLiteral(_) => v.visit_tuple_literal(expr),
        ExprKind::DynamicOp(_) => v.visit_dynamic(expr),
        ExprKind::With(_) => v.visit_with(expr),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::BinaryOp;

    /// Replaces every integer constant with its double.
    struct Doubler;

    impl Visitor for Doubler {
        type Error = IrError;

        fn visit_constant(&mut self, expr: &Expr) -> Result<Expr, IrError> {
            match expr.kind() {
                ExprKind::Constant(c) => match c.value {
                    arbor_common::Literal::Int(n) => Ok(Expr::int(n * 2)),
                    _ => Ok(expr.clone()),
                },
                _ => Ok(expr.clone()),
            }
        }
    }

    struct Identity;

    impl Visitor for Identity {
        type Error = IrError;
    }

    #[test]
    fn default_visitor_preserves_identity() {
        let e = Expr::binary(
            BinaryOp::Add,
            Expr::str("a"),
            Expr::binary(BinaryOp::Add, Expr::str("b"), Expr::str("c")).unwrap(),
        )
        .unwrap();
        let out = Identity.visit(&e).unwrap();
        assert!(Expr::ptr_eq(&e, &out));
    }

    #[test]
    fn overridden_hook_rebuilds_ancestors() {
        let e = Expr::binary(BinaryOp::Mul, Expr::int(3), Expr::int(4)).unwrap();
        let out = Doubler.visit(&e).unwrap();
        assert_eq!(out, Expr::binary(BinaryOp::Mul, Expr::int(6), Expr::int(8)).unwrap());
    }
}
