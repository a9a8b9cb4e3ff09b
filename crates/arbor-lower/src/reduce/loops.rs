//! Loops over the single core `Loop` primitive.
//!
//! Every bounded loop becomes an infinite `Loop` whose first statement
//! breaks out when the test fails. `continue` is a label placed right
//! before the step that has to run next: the top of the body for `while`,
//! the test for `do-while`, the iterators for `for`.

use arbor_common::{IrResult, Ty};
use arbor_ir::ext::{DoWhile, Enumeration, EnumeratorInfo, For, ForEach, LoopLabels, While};
use arbor_ir::{BinaryOp, Expr, LabelTarget, UnaryOp, Visitor};

use super::{Reducer, Sequence};

/// Break and continue targets of one loop being lowered.
struct Targets {
    brk: LabelTarget,
    cont: LabelTarget,
}

impl Targets {
    fn scope(&self) -> Vec<LabelTarget> {
        vec![self.brk.clone(), self.cont.clone()]
    }

    /// `if (!test) break;`
    fn exit_unless(&self, test: Expr) -> IrResult<Expr> {
        Expr::if_then(Expr::unary(UnaryOp::Not, test)?, Expr::break_to(&self.brk)?)
    }
}

impl Reducer<'_> {
    fn loop_targets(&mut self, labels: &LoopLabels) -> IrResult<Targets> {
        let brk = match &labels.break_label {
            Some(l) => {
                self.declare(l)?;
                l.clone()
            }
            None => LabelTarget::new(format!("{}break", self.options.temp_prefix)),
        };
        let cont = match &labels.continue_label {
            Some(l) => {
                self.declare(l)?;
                l.clone()
            }
            None => LabelTarget::new(format!("{}continue", self.options.temp_prefix)),
        };
        Ok(Targets { brk, cont })
    }

    pub(super) fn lower_while(&mut self, w: &While) -> IrResult<Expr> {
        let t = self.loop_targets(&w.labels)?;
        let (test, body) = self.with_labels(t.scope(), |r| Ok((r.visit(&w.test)?, r.visit(&w.body)?)))?;
        let body = Expr::seq(vec![t.exit_unless(test)?, body])?;
        let lowered = Expr::loop_expr(body, Some(t.brk), Some(t.cont))?;
        Ok(self.polish(lowered))
    }

    pub(super) fn lower_do_while(&mut self, d: &DoWhile) -> IrResult<Expr> {
        let t = self.loop_targets(&d.labels)?;
        let (body, test) = self.with_labels(t.scope(), |r| Ok((r.visit(&d.body)?, r.visit(&d.test)?)))?;
        let body = Expr::seq(vec![body, Expr::label(&t.cont, None)?, t.exit_unless(test)?])?;
        let lowered = Expr::loop_expr(body, Some(t.brk), None)?;
        Ok(self.polish(lowered))
    }

    pub(super) fn lower_for(&mut self, f: &For) -> IrResult<Expr> {
        let t = self.loop_targets(&f.labels)?;
        let (initializers, test, iterators, body) = self.with_labels(t.scope(), |r| {
            let initializers = f.initializers.iter().map(|e| r.visit(e)).collect::<IrResult<Vec<_>>>()?;
            let test = f.test.as_ref().map(|e| r.visit(e)).transpose()?;
            let iterators = f.iterators.iter().map(|e| r.visit(e)).collect::<IrResult<Vec<_>>>()?;
            let body = r.visit(&f.body)?;
            Ok((initializers, test, iterators, body))
        })?;

        let mut stmts = Vec::with_capacity(iterators.len() + 3);
        if let Some(test) = test {
            stmts.push(t.exit_unless(test)?);
        }
        stmts.push(body);
        stmts.push(Expr::label(&t.cont, None)?);
        stmts.extend(iterators);
        let looped = Expr::loop_expr(Expr::seq(stmts)?, Some(t.brk), None)?;

        let mut exprs = initializers;
        exprs.push(looped);
        let lowered = Expr::block_typed(f.variables.clone(), exprs, Ty::Void)?;
        Ok(self.polish(lowered))
    }

    pub(super) fn lower_for_each(&mut self, f: &ForEach) -> IrResult<Expr> {
        let t = self.loop_targets(&f.labels)?;
        let collection = self.visit(&f.collection)?;
        let (conversion, body) = self.with_labels(t.scope(), |r| {
            let conversion = f.conversion.as_ref().map(|c| r.visit(c)).transpose()?;
            Ok((conversion, r.visit(&f.body)?))
        })?;
        let lowered = match &f.enumeration {
            Enumeration::Array { .. } => self.array_walk(f, &t, collection, conversion, body)?,
            Enumeration::Pattern(info) => self.enumerator_walk(f, info, &t, collection, conversion, body)?,
        };
        Ok(self.polish(lowered))
    }

    /// `{ v = conversion(element); body }` with `v` scoped to one iteration.
    fn iteration(f: &ForEach, element: Expr, conversion: Option<Expr>, body: Expr) -> IrResult<Expr> {
        let value = match conversion {
            Some(conv) => Expr::invoke(conv, vec![element])?,
            None => element,
        };
        let bind = Expr::assign(Expr::var(&f.variable), value)?;
        Expr::block_typed(vec![f.variable.clone()], vec![bind, body], Ty::Void)
    }

    fn array_walk(
        &mut self,
        f: &ForEach,
        t: &Targets,
        collection: Expr,
        conversion: Option<Expr>,
        body: Expr,
    ) -> IrResult<Expr> {
        let mut seq = Sequence::default();
        let array = self.spill(&mut seq, collection, "array")?;
        let index = self.fresh_temp(Ty::Int, "index");
        let index = seq.bind(index, Expr::int(0))?;

        let in_bounds = Expr::binary(BinaryOp::Less, index.clone(), Expr::array_length(array.clone())?)?;
        let element = Expr::array_index(array, index.clone())?;
        let step = Expr::assign(index.clone(), Expr::binary(BinaryOp::Add, index, Expr::int(1))?)?;
        let body = Expr::seq(vec![
            t.exit_unless(in_bounds)?,
            Reducer::iteration(f, element, conversion, body)?,
            Expr::label(&t.cont, None)?,
            step,
        ])?;
        let looped = Expr::loop_expr(body, Some(t.brk.clone()), None)?;
        seq.finish_as(looped, Ty::Void)
    }

    fn enumerator_walk(
        &mut self,
        f: &ForEach,
        info: &EnumeratorInfo,
        t: &Targets,
        collection: Expr,
        conversion: Option<Expr>,
        body: Expr,
    ) -> IrResult<Expr> {
        let mut seq = Sequence::default();
        let enumerator = Expr::call(Some(collection), &info.get_enumerator, vec![])?;
        let enumerator = self.spill(&mut seq, enumerator, "enumerator")?;

        let advance = Expr::call(Some(enumerator.clone()), &info.move_next, vec![])?;
        let current = Expr::member(Some(enumerator.clone()), &info.current)?;
        let body = Expr::seq(vec![
            t.exit_unless(advance)?,
            Reducer::iteration(f, current, conversion, body)?,
            Expr::label(&t.cont, None)?,
        ])?;
        let looped = Expr::loop_expr(body, Some(t.brk.clone()), None)?;

        let walk = match &info.dispose {
            Some(dispose) => {
                let release = Expr::call(Some(enumerator.clone()), dispose, vec![])?;
                let ty = enumerator.ty();
                let release = if ty.is_nullable() {
                    let present = Expr::binary(BinaryOp::NotEqual, enumerator, Expr::null(ty)?)?;
                    Expr::if_then(present, release)?
                } else {
                    release
                };
                Expr::try_finally(looped, release)?
            }
            None => looped,
        };
        seq.finish_as(walk, Ty::Void)
    }
}
