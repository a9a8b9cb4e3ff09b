//! Statement blocks and scoped resources.

use arbor_common::{IrResult, Ty};
use arbor_ir::ext::{StmtBlock, Using, UsingResource};
use arbor_ir::labels::block_labels;
use arbor_ir::{BinaryOp, Expr, Visitor};

use super::Reducer;

impl Reducer<'_> {
    /// `{ statements; return: }`, where the return label yields the
    /// block's value (its type's default when control falls off the end).
    pub(super) fn lower_stmt_block(&mut self, b: &StmtBlock) -> IrResult<Expr> {
        let ty = b.ty();
        let mut labels = block_labels(&b.statements);
        if let Some(ret) = &b.return_label {
            self.declare(ret)?;
            labels.push(ret.clone());
        }
        let mut stmts = self.with_labels(labels, |r| {
            b.statements.iter().map(|s| r.visit(s)).collect::<IrResult<Vec<_>>>()
        })?;
        if let Some(ret) = &b.return_label {
            let default = (!ty.is_void()).then(|| Expr::default_of(ty.clone()));
            stmts.push(Expr::label(ret, default)?);
        }
        let lowered = Expr::block_typed(b.variables.clone(), stmts, ty)?;
        Ok(self.polish(lowered))
    }

    /// Resources are acquired in order and released in reverse order, each
    /// in the `finally` of the scope holding the ones after it.
    pub(super) fn lower_using(&mut self, u: &Using) -> IrResult<Expr> {
        let values = u
            .resources
            .iter()
            .map(|r| self.visit(&r.resource))
            .collect::<IrResult<Vec<_>>>()?;
        let mut inner = self.visit(&u.body)?;
        for (resource, value) in u.resources.iter().zip(values).rev() {
            inner = self.hold(resource, value, inner, u.is_async)?;
        }
        Ok(self.polish(inner))
    }

    /// `{ r = value; try { body } finally { if (r != null) r.Dispose() } }`
    fn hold(&mut self, resource: &UsingResource, value: Expr, body: Expr, is_async: bool) -> IrResult<Expr> {
        let var = match &resource.variable {
            Some(v) => v.clone(),
            None => self.fresh_temp(value.ty(), "resource"),
        };
        let holder = Expr::var(&var);
        let ty = var.ty().clone();

        let receiver = match &resource.via_interface {
            Some(interface) => Expr::convert(holder.clone(), interface.clone())?,
            None if ty.is_nullable_value_type() => Expr::convert(holder.clone(), ty.non_nullable().clone())?,
            None => holder.clone(),
        };
        let mut release = Expr::call(Some(receiver), &resource.dispose, vec![])?;
        if is_async && !resource.dispose.ret().is_void() {
            release = Expr::await_expr(release, Ty::Void)?;
        }
        if resource.is_nullable() {
            let present = Expr::binary(BinaryOp::NotEqual, holder.clone(), Expr::null(ty)?)?;
            release = Expr::if_then(present, release)?;
        }

        let body_ty = body.ty();
        let acquire = Expr::assign(holder, value)?;
        Expr::block_typed(vec![var], vec![acquire, Expr::try_finally(body, release)?], body_ty)
    }
}
