//! Canonical child order and identity-preserving `update`.
//!
//! `children_ref` lists every child expression of a node in a fixed order;
//! `update` takes a list in the same order and returns the node itself when
//! every child is the identical instance, or a freshly validated node
//! otherwise. Optional children keep the shape of the node being updated:
//! an absent child stays absent, a present one consumes one list entry.

use arbor_common::{IrError, IrResult, Ty};

use crate::expr::{CatchBlock, Expr, ExprKind};
use crate::ext::{
    ArgBinding, DynamicArg, InterpolationPart, MemberInit, Slot, SwitchCase, UsingResource,
};

impl Expr {
    /// Borrowed children in canonical order.
    pub fn children_ref(&self) -> Vec<&Expr> {
        let mut out: Vec<&Expr> = Vec::new();
        match self.kind() {
            ExprKind::Constant(_)
            | ExprKind::Default(_)
            | ExprKind::Variable(_)
            | ExprKind::GotoCase(_)
            | ExprKind::GotoDefault
            | ExprKind::ConditionalReceiver(_) => {}
            ExprKind::Lambda(l) => out.push(&l.body),
            ExprKind::Assign(a) => out.extend([&a.target, &a.value]),
            ExprKind::Unary(u) => out.push(&u.operand),
            ExprKind::Binary(b) => out.extend([&b.left, &b.right]),
            ExprKind::Convert(c) => out.push(&c.operand),
            ExprKind::Conditional(c) => out.extend([&c.test, &c.if_true, &c.if_false]),
            ExprKind::Block(b) => out.extend(&b.exprs),
            ExprKind::Loop(l) => out.push(&l.body),
            ExprKind::Goto(g) => out.extend(&g.value),
            ExprKind::Label(l) => out.extend(&l.default),
            ExprKind::Try(t) => {
                out.push(&t.body);
                for h in &t.handlers {
                    out.extend(&h.filter);
                    out.push(&h.body);
                }
                out.extend(&t.finally);
                out.extend(&t.fault);
            }
            ExprKind::Throw(t) => out.extend(&t.value),
            ExprKind::Call(c) => {
                out.extend(&c.object);
                out.extend(&c.args);
            }
            ExprKind::Invoke(i) => {
                out.push(&i.target);
                out.extend(&i.args);
            }
            ExprKind::New(n) => out.extend(&n.args),
            ExprKind::NewArray(n) => out.extend(&n.items),
            ExprKind::NewTuple(t) => out.extend(&t.items),
            ExprKind::TupleItem(t) => out.push(&t.tuple),
            ExprKind::Member(m) => out.extend(&m.object),
            ExprKind::Index(i) => {
                out.push(&i.object);
                out.extend(&i.args);
            }
            ExprKind::ArrayLength(a) => out.push(a),
            ExprKind::Dynamic(d) => out.extend(&d.args),
            ExprKind::Await(a) => out.push(&a.operand),

            ExprKind::While(w) => out.extend([&w.test, &w.body]),
            ExprKind::DoWhile(d) => out.extend([&d.body, &d.test]),
            ExprKind::For(f) => {
                out.extend(&f.initializers);
                out.extend(&f.test);
                out.extend(&f.iterators);
                out.push(&f.body);
            }
            ExprKind::ForEach(f) => {
                out.push(&f.collection);
                out.extend(&f.conversion);
                out.push(&f.body);
            }
            ExprKind::Switch(s) => {
                out.push(&s.subject);
                out.extend(s.cases.iter().map(|c| &c.body));
            }
            ExprKind::StmtBlock(b) => out.extend(&b.statements),
            ExprKind::Using(u) => {
                out.extend(u.resources.iter().map(|r| &r.resource));
                out.push(&u.body);
            }
            ExprKind::ConditionalAccess(c) => out.extend([&c.receiver, &c.when_not_null]),
            ExprKind::CompoundAssign(c) => {
                out.extend([&c.target, &c.operand]);
                out.extend(&c.left_conversion);
                out.extend(&c.final_conversion);
            }
            ExprKind::UnaryAssign(u) => out.push(&u.target),
            ExprKind::CallBinding(c) => {
                out.extend(&c.object);
                out.extend(c.bindings.iter().map(|b| &b.value));
            }
            ExprKind::InvokeBinding(i) => {
                out.push(&i.target);
                out.extend(i.bindings.iter().map(|b| &b.value));
            }
            ExprKind::NewBinding(n) => out.extend(n.bindings.iter().map(|b| &b.value)),
            ExprKind::IndexBinding(i) => {
                out.push(&i.object);
                out.extend(i.bindings.iter().map(|b| &b.value));
            }
            ExprKind::ArrayAccess(a) => out.extend([&a.array, &a.index]),
            ExprKind::FromEndIndex(v) => out.push(v),
            ExprKind::Range(r) => {
                out.extend(&r.start);
                out.extend(&r.end);
            }
            ExprKind::InterpolatedString(s) => out.extend(s.slots().map(|slot| &slot.value)),
            ExprKind::TupleConvert(t) => {
                out.push(&t.operand);
                out.extend(t.conversions.iter().flatten());
            }
            ExprKind::TupleLiteral(t) => out.extend(&t.items),
            ExprKind::DynamicOp(d) => out.extend(d.args.iter().map(|a| &a.value)),
            ExprKind::With(w) => {
                out.push(&w.source);
                out.extend(w.initializers.iter().map(|i| &i.value));
            }
        }
        out
    }

    /// Owned children in canonical order.
    pub fn children(&self) -> Vec<Expr> {
        self.children_ref().into_iter().cloned().collect()
    }

    /// Rebuild this node over `children` (canonical order). Returns `self`
    /// when every child is the identical instance.
    pub fn update(&self, children: Vec<Expr>) -> IrResult<Expr> {
        let old = self.children_ref();
        if old.len() != children.len() {
            return Err(IrError::shape(
                "children",
                format!("{} has {} children, got {}", self.kind_name(), old.len(), children.len()),
            ));
        }
        if old.iter().zip(&children).all(|(a, b)| Expr::ptr_eq(a, b)) {
            return Ok(self.clone());
        }
        let mut c = Cursor {
            items: children.into_iter(),
        };
        self.rebuild(&mut c)
    }

    fn rebuild(&self, c: &mut Cursor) -> IrResult<Expr> {
        match self.kind() {
            ExprKind::Constant(_)
            | ExprKind::Default(_)
            | ExprKind::Variable(_)
            | ExprKind::GotoCase(_)
            | ExprKind::GotoDefault
            | ExprKind::ConditionalReceiver(_) => Ok(self.clone()),
            ExprKind::Lambda(l) => {
                let body = c.next()?;
                match &l.name {
                    Some(name) => Expr::named_lambda(name, l.params.clone(), body, l.ret.clone()),
                    None => Expr::lambda(l.params.clone(), body, l.ret.clone()),
                }
            }
            ExprKind::Assign(_) => Expr::assign(c.next()?, c.next()?),
            ExprKind::Unary(u) => {
                let operand = c.next()?;
                match &u.method {
                    Some(m) => Expr::unary_method(u.op, operand, m.clone()),
                    None => Expr::unary(u.op, operand),
                }
            }
            ExprKind::Binary(b) => {
                let (left, right) = (c.next()?, c.next()?);
                match &b.method {
                    Some(m) => Expr::binary_method(b.op, left, right, m.clone()),
                    None => Expr::binary(b.op, left, right),
                }
            }
            ExprKind::Convert(cv) => Expr::convert(c.next()?, cv.ty.clone()),
            ExprKind::Conditional(cd) => Expr::condition(c.next()?, c.next()?, c.next()?, cd.ty.clone()),
            ExprKind::Block(b) => Expr::block_typed(b.variables.clone(), c.take(b.exprs.len())?, b.ty.clone()),
            ExprKind::Loop(l) => Expr::loop_expr(c.next()?, l.break_label.clone(), l.continue_label.clone()),
            ExprKind::Goto(g) => Expr::jump(g.kind, g.target.clone(), c.opt(g.value.as_ref())?),
            ExprKind::Label(l) => Expr::label(&l.target, c.opt(l.default.as_ref())?),
            ExprKind::Try(t) => {
                let body = c.next()?;
                let handlers = t
                    .handlers
                    .iter()
                    .map(|h| {
                        let filter = c.opt(h.filter.as_ref())?;
                        CatchBlock::new(h.test.clone(), h.variable.clone(), filter, c.next()?)
                    })
                    .collect::<IrResult<Vec<_>>>()?;
                let finally = c.opt(t.finally.as_ref())?;
                let fault = c.opt(t.fault.as_ref())?;
                Expr::try_expr(body, handlers, finally, fault)
            }
            ExprKind::Throw(t) => Expr::throw(c.opt(t.value.as_ref())?, t.ty.clone()),
            ExprKind::Call(call) => {
                let object = c.opt(call.object.as_ref())?;
                Expr::call(object, &call.method, c.take(call.args.len())?)
            }
            ExprKind::Invoke(i) => {
                let target = c.next()?;
                Expr::invoke(target, c.take(i.args.len())?)
            }
            ExprKind::New(n) => {
                let args = c.take(n.args.len())?;
                match (&n.ctor, &n.ty) {
                    (Some(ctor), _) => Expr::new_object(ctor, args),
                    (None, Ty::Index | Ty::Range) => {
                        let mut args = args.into_iter();
                        let (Some(a), Some(b)) = (args.next(), args.next()) else {
                            return Err(IrError::shape("args", "a builtin value takes two arguments"));
                        };
                        if n.ty == Ty::Index {
                            Expr::new_index(a, b)
                        } else {
                            Expr::new_range(a, b)
                        }
                    }
                    (None, ty) => Expr::new_instance(ty.clone()),
                }
            }
            ExprKind::NewArray(n) => Expr::new_array(n.elem.clone(), c.take(n.items.len())?),
            ExprKind::NewTuple(t) => Expr::new_tuple(c.take(t.items.len())?),
            ExprKind::TupleItem(t) => Expr::tuple_item(c.next()?, t.index),
            ExprKind::Member(m) => Expr::member(c.opt(m.object.as_ref())?, &m.member),
            ExprKind::Index(i) => {
                let object = c.next()?;
                Expr::index(object, i.indexer.as_ref(), c.take(i.args.len())?)
            }
            ExprKind::ArrayLength(_) => Expr::array_length(c.next()?),
            ExprKind::Dynamic(d) => Expr::dynamic_call(d.site.clone(), c.take(d.args.len())?, d.ty.clone()),
            ExprKind::Await(a) => Expr::await_expr(c.next()?, a.ty.clone()),

            ExprKind::While(w) => Expr::while_loop(c.next()?, c.next()?, w.labels.clone()),
            ExprKind::DoWhile(d) => Expr::do_while(c.next()?, c.next()?, d.labels.clone()),
            ExprKind::For(f) => {
                let initializers = c.take(f.initializers.len())?;
                let test = c.opt(f.test.as_ref())?;
                let iterators = c.take(f.iterators.len())?;
                let body = c.next()?;
                Expr::for_loop(f.variables.clone(), initializers, test, iterators, body, f.labels.clone())
            }
            ExprKind::ForEach(f) => {
                let collection = c.next()?;
                let conversion = c.opt(f.conversion.as_ref())?;
                let body = c.next()?;
                Expr::for_each_resolved(
                    f.variable.clone(),
                    collection,
                    conversion,
                    body,
                    f.enumeration.clone(),
                    f.labels.clone(),
                )
            }
            ExprKind::Switch(s) => {
                let subject = c.next()?;
                let cases = s
                    .cases
                    .iter()
                    .map(|case| -> IrResult<SwitchCase> {
                        Ok(SwitchCase {
                            tests: case.tests.clone(),
                            body: c.next()?,
                        })
                    })
                    .collect::<IrResult<Vec<_>>>()?;
                Expr::switch(subject, cases, s.comparison.clone(), s.break_label.clone(), s.variables.clone())
            }
            ExprKind::StmtBlock(b) => {
                Expr::stmt_block(b.variables.clone(), c.take(b.statements.len())?, b.return_label.clone())
            }
            ExprKind::Using(u) => {
                let resources = u
                    .resources
                    .iter()
                    .map(|r| r.with_resource(c.next()?))
                    .collect::<IrResult<Vec<UsingResource>>>()?;
                Expr::using_resources(resources, c.next()?, u.is_async)
            }
            ExprKind::ConditionalAccess(ca) => {
                Expr::conditional_access(c.next()?, ca.placeholder.clone(), c.next()?)
            }
            ExprKind::CompoundAssign(ca) => {
                let (target, operand) = (c.next()?, c.next()?);
                let left = c.opt(ca.left_conversion.as_ref())?;
                let last = c.opt(ca.final_conversion.as_ref())?;
                Expr::compound_assign_with(ca.op, target, operand, ca.method.clone(), left, last)
            }
            ExprKind::UnaryAssign(u) => Expr::unary_assign(u.op, c.next()?, u.method.clone()),
            ExprKind::CallBinding(cb) => {
                let object = c.opt(cb.object.as_ref())?;
                Expr::call_binding(object, &cb.method, c.bindings(&cb.bindings)?)
            }
            ExprKind::InvokeBinding(ib) => {
                let target = c.next()?;
                Expr::invoke_binding(target, ib.params.clone(), c.bindings(&ib.bindings)?)
            }
            ExprKind::NewBinding(nb) => Expr::new_binding(&nb.ctor, c.bindings(&nb.bindings)?),
            ExprKind::IndexBinding(ib) => {
                let object = c.next()?;
                Expr::index_binding(object, &ib.indexer, c.bindings(&ib.bindings)?)
            }
            ExprKind::ArrayAccess(_) => Expr::array_access(c.next()?, c.next()?),
            ExprKind::FromEndIndex(_) => Expr::from_end(c.next()?),
            ExprKind::Range(r) => {
                let start = c.opt(r.start.as_ref())?;
                Expr::range(start, c.opt(r.end.as_ref())?)
            }
            ExprKind::InterpolatedString(s) => {
                let parts = s
                    .parts
                    .iter()
                    .map(|p| -> IrResult<InterpolationPart> {
                        Ok(match p {
                            InterpolationPart::Text(t) => InterpolationPart::Text(t.clone()),
                            InterpolationPart::Slot(slot) => InterpolationPart::Slot(Slot {
                                value: c.next()?,
                                alignment: slot.alignment,
                                format: slot.format.clone(),
                            }),
                        })
                    })
                    .collect::<IrResult<Vec<_>>>()?;
                Expr::interpolated(parts, s.ty.clone())
            }
            ExprKind::TupleConvert(t) => {
                let operand = c.next()?;
                let conversions = t
                    .conversions
                    .iter()
                    .map(|conv| c.opt(conv.as_ref()))
                    .collect::<IrResult<Vec<_>>>()?;
                Expr::tuple_convert(operand, t.ty.clone(), conversions)
            }
            ExprKind::TupleLiteral(t) => Expr::tuple_literal(c.take(t.items.len())?),
            ExprKind::DynamicOp(d) => {
                let args = d
                    .args
                    .iter()
                    .map(|a| -> IrResult<DynamicArg> {
                        Ok(DynamicArg {
                            value: c.next()?,
                            name: a.name.clone(),
                            by_ref: a.by_ref,
                        })
                    })
                    .collect::<IrResult<Vec<_>>>()?;
                Expr::dynamic(d.op.clone(), args, d.flags, d.context.clone(), d.binder.clone())
            }
            ExprKind::With(w) => {
                let source = c.next()?;
                let initializers = w
                    .initializers
                    .iter()
                    .map(|i| -> IrResult<MemberInit> { Ok(MemberInit::new(&i.member, c.next()?)) })
                    .collect::<IrResult<Vec<_>>>()?;
                match &w.clone {
                    Some(clone) => Expr::with_clone(source, clone.clone(), initializers),
                    None => Expr::with_copy(source, initializers),
                }
            }
        }
    }
}

/// Hands out replacement children in canonical order.
struct Cursor {
    items: std::vec::IntoIter<Expr>,
}

impl Cursor {
    fn next(&mut self) -> IrResult<Expr> {
        self.items
            .next()
            .ok_or_else(|| IrError::shape("children", "too few children"))
    }

    /// One entry if the old child was present, none otherwise.
    fn opt(&mut self, old: Option<&Expr>) -> IrResult<Option<Expr>> {
        old.map(|_| self.next()).transpose()
    }

    fn take(&mut self, n: usize) -> IrResult<Vec<Expr>> {
        (0..n).map(|_| self.next()).collect()
    }

    fn bindings(&mut self, old: &[ArgBinding]) -> IrResult<Vec<ArgBinding>> {
        old.iter()
            .map(|b| -> IrResult<ArgBinding> {
                Ok(ArgBinding {
                    param: b.param.clone(),
                    value: self.next()?,
                })
            })
            .collect()
    }
}
