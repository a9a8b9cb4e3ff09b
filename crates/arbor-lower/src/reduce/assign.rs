//! Compound assignment and increment/decrement on arbitrary locations.
//!
//! The location's coordinates are evaluated once; then the old value is
//! read, converted, combined with the operand, converted again and written
//! back. The node yields the written value, or the old one for postfix
//! forms.

use arbor_common::{IrResult, Ty};
use arbor_ir::ext::{CompoundAssign, UnaryAssign};
use arbor_ir::{AssignOp, BinaryOp, DynamicArgInfo, DynamicFlags, DynamicOp, Expr, UnaryOp, Visitor};

use crate::bind::one;

use super::place::Place;
use super::{Reducer, Sequence};

impl Reducer<'_> {
    pub(super) fn lower_compound_assign(&mut self, c: &CompoundAssign) -> IrResult<Expr> {
        let ty = c.target.ty();
        let mut seq = Sequence::default();
        let place = self.place(&c.target, &mut seq)?;
        let operand = self.visit(&c.operand)?;

        let result = match (c.op, c.op.binary()) {
            (AssignOp::Coalesce, _) => {
                let write = place.store(self, &mut seq, operand)?;
                Expr::binary(BinaryOp::Coalesce, place.read()?, write)?
            }
            (_, None) => place.store(self, &mut seq, operand)?,
            (_, Some(op)) => {
                let old = place.read()?;
                let left = match &c.left_conversion {
                    Some(conv) => Expr::invoke(self.visit(conv)?, vec![old])?,
                    None => old,
                };
                let combined = match (&c.method, &place) {
                    (Some(method), _) => Expr::call_static(method, vec![left, operand])?,
                    (None, Place::Dynamic(d)) => {
                        let site = d.site(
                            DynamicOp::Binary(op),
                            vec![DynamicArgInfo::default(); 2],
                            d.flags() | DynamicFlags::COMPOUND_VALUE,
                        );
                        Expr::dynamic_call(site, vec![left, operand], Ty::Object)?
                    }
                    (None, Place::Core(_)) => Expr::binary(op, left, operand)?,
                };
                let value = match &c.final_conversion {
                    Some(conv) => Expr::invoke(self.visit(conv)?, vec![combined])?,
                    None => combined,
                };
                place.store(self, &mut seq, value)?
            }
        };
        seq.finish_as(result, ty)
    }

    pub(super) fn lower_unary_assign(&mut self, u: &UnaryAssign) -> IrResult<Expr> {
        if u.method.is_none() && u.target.as_variable().is_some() {
            return Expr::unary(u.op.core(), u.target.clone());
        }
        let ty = u.target.ty();
        let mut seq = Sequence::default();
        let place = self.place(&u.target, &mut seq)?;
        let result = if u.op.is_prefix() {
            let next = self.step(u, &place, place.read()?)?;
            place.store(self, &mut seq, next)?
        } else {
            let old = self.spill(&mut seq, place.read()?, "old")?;
            let next = self.step(u, &place, old.clone())?;
            let stored = place.store(self, &mut seq, next)?;
            if let Place::Core(_) = place {
                seq.push(stored);
            }
            old
        };
        seq.finish_as(result, ty)
    }

    /// The value after one increment or decrement of `old`.
    fn step(&mut self, u: &UnaryAssign, place: &Place, old: Expr) -> IrResult<Expr> {
        if let Some(method) = &u.method {
            return Expr::call_static(method, vec![old]);
        }
        match place {
            Place::Dynamic(d) => {
                let op = if u.op.is_increment() { UnaryOp::Increment } else { UnaryOp::Decrement };
                let site = d.site(
                    DynamicOp::Unary(op),
                    vec![DynamicArgInfo::default()],
                    d.flags() | DynamicFlags::COMPOUND_VALUE,
                );
                Expr::dynamic_call(site, vec![old], Ty::Object)
            }
            Place::Core(_) => {
                let ty = old.ty();
                let op = if u.op.is_increment() { BinaryOp::Add } else { BinaryOp::Sub };
                Expr::binary(op, old, Expr::constant(one(&ty), ty)?)
            }
        }
    }
}
