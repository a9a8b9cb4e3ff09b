//! Null-conditional access, array access by `Int` / `Index` / `Range`, and
//! range construction.

use arbor_common::{intrinsics, IrError, IrResult, Ty};
use arbor_ir::ext::{ArrayAccess, ConditionalAccess, RangeExpr};
use arbor_ir::{BinaryOp, Expr, Visitor};

use super::{Reducer, Sequence};

impl Reducer<'_> {
    /// `{ t = receiver; t == null ? default : when_not_null[t] }`. The
    /// receiver is evaluated exactly once; inside `when_not_null` every
    /// occurrence of the placeholder reads the temporary (unwrapped when
    /// the receiver is a nullable value).
    pub(super) fn lower_conditional_access(&mut self, c: &ConditionalAccess) -> IrResult<Expr> {
        let mut seq = Sequence::default();
        let receiver = self.visit(&c.receiver)?;
        let held = self.spill(&mut seq, receiver, "receiver")?;
        let held_ty = held.ty();
        let replacement = if held_ty.is_nullable_value_type() {
            Expr::convert(held.clone(), held_ty.non_nullable().clone())?
        } else {
            held.clone()
        };

        self.receivers.push((c.placeholder.clone(), replacement));
        let inner = self.visit(&c.when_not_null);
        self.receivers.pop();
        let inner = inner?;

        let null = Expr::null(held_ty)?;
        let result = if c.ty.is_void() {
            Expr::if_then(Expr::binary(BinaryOp::NotEqual, held, null)?, inner)?
        } else {
            Expr::condition(
                Expr::binary(BinaryOp::Equal, held, null)?,
                Expr::default_of(c.ty.clone()),
                Expr::convert_if_needed(inner, &c.ty)?,
                c.ty.clone(),
            )?
        };
        let lowered = seq.finish_as(result, c.ty.clone())?;
        Ok(self.polish(lowered))
    }

    pub(super) fn lower_array_access(&mut self, a: &ArrayAccess) -> IrResult<Expr> {
        let array = self.visit(&a.array)?;
        match a.index.ty() {
            Ty::Int => {
                let index = self.visit(&a.index)?;
                Expr::array_index(array, index)
            }
            Ty::Index => {
                let mut seq = Sequence::default();
                let array = self.stabilize(&mut seq, array, "array")?;
                let offset = self.element_offset(&array, &a.index)?;
                seq.finish(Expr::array_index(array, offset)?)
            }
            Ty::Range => {
                let Some(elem) = array.ty().element_type().cloned() else {
                    return Err(IrError::internal(format!("cannot slice a {}", array.ty())));
                };
                let range = self.visit(&a.index)?;
                Expr::call_static(&intrinsics::array_slice(&elem), vec![array, range])
            }
            other => Err(IrError::internal(format!("an array cannot be addressed by {other}"))),
        }
    }

    /// A missing start is `0`, a missing end is `^0`.
    pub(super) fn lower_range(&mut self, r: &RangeExpr) -> IrResult<Expr> {
        let start = match &r.start {
            Some(s) => self.visit(s)?,
            None => Expr::new_index(Expr::int(0), Expr::bool(false))?,
        };
        let end = match &r.end {
            Some(e) => self.visit(e)?,
            None => Expr::new_index(Expr::int(0), Expr::bool(true))?,
        };
        Expr::new_range(start, end)
    }
}
