//! Assignable locations with their coordinates evaluated once.
//!
//! Compound assignment, increment/decrement and by-reference arguments all
//! need to read and/or write the same location without re-evaluating the
//! receiver or index expressions. `Reducer::place` evaluates those
//! coordinates into temporaries and hands back a `Place` that can be read
//! and written any number of times.

use arbor_common::{intrinsics, IrError, IrResult, Ty};
use arbor_ir::ext::{ArrayAccess, DynamicExpr};
use arbor_ir::{
    BinaryOp, BinderRef, CallSite, DynamicArgInfo, DynamicFlags, DynamicOp, Expr, ExprKind, Visitor,
};

use super::{Reducer, Sequence};

pub(crate) enum Place {
    /// A core location: variable, field, property, array element or
    /// indexer access over stable coordinates.
    Core(Expr),
    /// A late-bound member or index.
    Dynamic(DynamicPlace),
}

pub(crate) struct DynamicPlace {
    get: DynamicOp,
    args: Vec<Expr>,
    infos: Vec<DynamicArgInfo>,
    flags: DynamicFlags,
    context: Option<Ty>,
    binder: BinderRef,
}

impl DynamicPlace {
    pub(crate) fn site(&self, op: DynamicOp, args: Vec<DynamicArgInfo>, flags: DynamicFlags) -> CallSite {
        CallSite {
            op,
            flags,
            args,
            context: self.context.clone(),
            binder: self.binder.clone(),
        }
    }

    pub(crate) fn flags(&self) -> DynamicFlags {
        self.flags
    }

    fn set_op(&self) -> IrResult<DynamicOp> {
        match &self.get {
            DynamicOp::GetMember(name) => Ok(DynamicOp::SetMember(name.clone())),
            DynamicOp::GetIndex => Ok(DynamicOp::SetIndex),
            other => Err(IrError::internal(format!("{} is not a location", other.name()))),
        }
    }
}

impl Place {
    /// The location itself, for by-reference arguments.
    pub(crate) fn location(self) -> IrResult<Expr> {
        match self {
            Place::Core(loc) => Ok(loc),
            Place::Dynamic(_) => Err(IrError::internal("a late-bound location cannot be passed by reference")),
        }
    }

    pub(crate) fn read(&self) -> IrResult<Expr> {
        match self {
            Place::Core(loc) => Ok(loc.clone()),
            Place::Dynamic(d) => {
                let site = d.site(d.get.clone(), d.infos.clone(), d.flags);
                Expr::dynamic_call(site, d.args.clone(), Ty::Object)
            }
        }
    }

    /// Store `value` and yield the stored value.
    pub(crate) fn store(&self, reducer: &mut Reducer<'_>, seq: &mut Sequence, value: Expr) -> IrResult<Expr> {
        match self {
            Place::Core(loc) => Expr::assign(loc.clone(), value),
            Place::Dynamic(d) => {
                let value = reducer.spill(seq, value, "value")?;
                let mut infos = d.infos.clone();
                infos.push(DynamicArgInfo::default());
                let mut args = d.args.clone();
                args.push(value.clone());
                let site = d.site(d.set_op()?, infos, d.flags);
                seq.push(Expr::dynamic_call(site, args, Ty::Object)?);
                Ok(value)
            }
        }
    }
}

impl Reducer<'_> {
    /// Evaluate the coordinates of the (unreduced) location `target` into
    /// `seq` and return the location over them.
    pub(crate) fn place(&mut self, target: &Expr, seq: &mut Sequence) -> IrResult<Place> {
        match target.kind() {
            ExprKind::Variable(_) => Ok(Place::Core(target.clone())),
            ExprKind::Member(m) => {
                let object = match &m.object {
                    Some(o) => {
                        let o = self.visit(o)?;
                        Some(self.capture_receiver(seq, o)?)
                    }
                    None => None,
                };
                Ok(Place::Core(Expr::member(object, &m.member)?))
            }
            ExprKind::Index(i) => {
                let object = self.visit(&i.object)?;
                let object = self.capture_receiver(seq, object)?;
                let mut args = Vec::with_capacity(i.args.len());
                for arg in &i.args {
                    let arg = self.visit(arg)?;
                    args.push(self.capture(seq, arg, "index")?);
                }
                Ok(Place::Core(Expr::index(object, i.indexer.as_ref(), args)?))
            }
            ExprKind::IndexBinding(i) => {
                let plan = crate::bind::resolve(i.indexer.params(), &i.bindings)?;
                let object = self.visit(&i.object)?;
                let object = self.capture_receiver(seq, object)?;
                let args = self.plan_args(&plan, seq, true)?;
                Ok(Place::Core(Expr::index(object, Some(&i.indexer), args)?))
            }
            ExprKind::ArrayAccess(a) => self.element_place(a, seq),
            ExprKind::DynamicOp(d) => self.dynamic_place(d, seq),
            _ => Err(IrError::internal(format!("{} is not an assignable location", target.kind_name()))),
        }
    }

    fn element_place(&mut self, a: &ArrayAccess, seq: &mut Sequence) -> IrResult<Place> {
        if !a.is_element() {
            return Err(IrError::internal("an array slice is not an assignable location"));
        }
        let array = self.visit(&a.array)?;
        let array = self.capture(seq, array, "array")?;
        let offset = if a.index.ty() == Ty::Int {
            self.visit(&a.index)?
        } else {
            self.element_offset(&array, &a.index)?
        };
        let offset = self.capture(seq, offset, "index")?;
        Ok(Place::Core(Expr::array_index(array, offset)?))
    }

    fn dynamic_place(&mut self, d: &DynamicExpr, seq: &mut Sequence) -> IrResult<Place> {
        if !d.is_member_or_index_get() {
            return Err(IrError::internal(format!("{} is not an assignable location", d.op.name())));
        }
        let mut args = Vec::with_capacity(d.args.len());
        for arg in &d.args {
            let value = self.visit(&arg.value)?;
            args.push(self.capture(seq, value, "arg")?);
        }
        Ok(Place::Dynamic(DynamicPlace {
            get: d.op.clone(),
            args,
            infos: d.args.iter().map(|a| a.info()).collect(),
            flags: d.flags,
            context: d.context.clone(),
            binder: d.binder.clone(),
        }))
    }

    /// The absolute element position an `Index`-typed operand designates in
    /// `array` (already stable). `^n` is computed inline as `length - n`.
    pub(crate) fn element_offset(&mut self, array: &Expr, index: &Expr) -> IrResult<Expr> {
        let length = Expr::array_length(array.clone())?;
        match index.kind() {
            ExprKind::FromEndIndex(n) => {
                let n = self.visit(n)?;
                Expr::binary(BinaryOp::Sub, length, n)
            }
            _ => {
                let index = self.visit(index)?;
                Expr::call_static(&intrinsics::index_offset(), vec![index, length])
            }
        }
    }
}
