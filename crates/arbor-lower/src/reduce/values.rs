//! Interpolated strings, tuple literals and conversions, and `with`.

use arbor_common::ty::TUPLE_REST_ARITY;
use arbor_common::{intrinsics, IrError, IrResult, Ty};
use arbor_ir::ext::{InterpolatedString, InterpolationPart, TupleConvert, With};
use arbor_ir::{BinaryOp, Expr, Visitor};

use super::{Reducer, Sequence};

/// One tuple value from a flat item list, nesting everything past the
/// seventh item into the rest slot.
pub(super) fn nest_tuple(mut items: Vec<Expr>) -> IrResult<Expr> {
    if items.len() > TUPLE_REST_ARITY {
        let rest = items.split_off(TUPLE_REST_ARITY);
        items.push(nest_tuple(rest)?);
    }
    Expr::new_tuple(items)
}

/// Logical element `index` of a (possibly rest-nested) tuple value.
fn tuple_element(tuple: Expr, index: usize) -> IrResult<Expr> {
    if index < TUPLE_REST_ARITY {
        Expr::tuple_item(tuple, index)
    } else {
        tuple_element(Expr::tuple_item(tuple, TUPLE_REST_ARITY)?, index - TUPLE_REST_ARITY)
    }
}

/// `{` and `}` are doubled in composite format text.
fn escape_format(text: &str) -> String {
    text.replace('{', "{{").replace('}', "}}")
}

impl Reducer<'_> {
    // ── Interpolation ────────────────────────────────────────────────

    pub(super) fn lower_interpolated(&mut self, s: &InterpolatedString) -> IrResult<Expr> {
        match s.ty {
            Ty::Formattable => self.formattable(s),
            _ => self.concatenation(s),
        }
    }

    /// `"a" + FormatValue(x, 0, "") + "b" + ...`
    fn concatenation(&mut self, s: &InterpolatedString) -> IrResult<Expr> {
        let mut out: Option<Expr> = None;
        for part in &s.parts {
            let piece = match part {
                InterpolationPart::Text(text) => Expr::str(text.clone()),
                InterpolationPart::Slot(slot) => {
                    let value = self.visit(&slot.value)?;
                    Expr::call_static(
                        &intrinsics::format_value(),
                        vec![
                            value,
                            Expr::int(slot.alignment.unwrap_or(0)),
                            Expr::str(slot.format.clone().unwrap_or_default()),
                        ],
                    )?
                }
            };
            out = Some(match out {
                Some(prev) => Expr::binary(BinaryOp::Add, prev, piece)?,
                None => piece,
            });
        }
        Ok(out.unwrap_or_else(|| Expr::str("")))
    }

    /// `CreateFormattable("a{0,5:x}b", [x])`
    fn formattable(&mut self, s: &InterpolatedString) -> IrResult<Expr> {
        let mut format = String::new();
        let mut values = Vec::new();
        for part in &s.parts {
            match part {
                InterpolationPart::Text(text) => format.push_str(&escape_format(text)),
                InterpolationPart::Slot(slot) => {
                    format.push('{');
                    format.push_str(&values.len().to_string());
                    if let Some(alignment) = slot.alignment {
                        format.push(',');
                        format.push_str(&alignment.to_string());
                    }
                    if let Some(spec) = &slot.format {
                        format.push(':');
                        format.push_str(spec);
                    }
                    format.push('}');
                    values.push(self.visit(&slot.value)?);
                }
            }
        }
        let args = Expr::new_array(Ty::Object, values)?;
        Expr::call_static(&intrinsics::create_formattable(), vec![Expr::str(format), args])
    }

    // ── Tuples ───────────────────────────────────────────────────────

    pub(super) fn lower_tuple_convert(&mut self, t: &TupleConvert) -> IrResult<Expr> {
        let operand = self.visit(&t.operand)?;
        let conversions = t
            .conversions
            .iter()
            .map(|c| c.as_ref().map(|c| self.visit(c)).transpose())
            .collect::<IrResult<Vec<_>>>()?;
        let target = t.ty.non_nullable().clone();
        let mut seq = Sequence::default();
        let source = self.stabilize(&mut seq, operand, "tuple")?;
        let source_ty = source.ty();

        let result = match (source_ty.is_nullable_value_type(), t.ty.is_nullable_value_type()) {
            (true, _) => {
                let inner = source_ty.non_nullable().clone();
                let mut unwrapped = Sequence::default();
                let value = Expr::convert(source.clone(), inner)?;
                let value = self.spill(&mut unwrapped, value, "value")?;
                let converted = self.convert_elements(value, &target, conversions)?;
                let converted = unwrapped.finish_as(Expr::convert(converted, t.ty.clone())?, t.ty.clone())?;
                let is_null = Expr::binary(BinaryOp::Equal, source.clone(), Expr::null(source_ty)?)?;
                Expr::condition(is_null, Expr::default_of(t.ty.clone()), converted, t.ty.clone())?
            }
            (false, true) => {
                let converted = self.convert_elements(source, &target, conversions)?;
                Expr::convert(converted, t.ty.clone())?
            }
            (false, false) => self.convert_elements(source, &target, conversions)?,
        };
        let lowered = seq.finish_as(result, t.ty.clone())?;
        Ok(self.polish(lowered))
    }

    /// A new tuple of type `target` built from the elements of the stable
    /// tuple value `source`.
    fn convert_elements(&mut self, source: Expr, target: &Ty, conversions: Vec<Option<Expr>>) -> IrResult<Expr> {
        let Some(targets) = target.tuple_elements() else {
            return Err(IrError::internal(format!("{target} is not a tuple type")));
        };
        let mut items = Vec::with_capacity(targets.len());
        for (i, (to, conv)) in targets.iter().zip(conversions).enumerate() {
            let element = tuple_element(source.clone(), i)?;
            items.push(self.convert_element(element, to, conv)?);
        }
        nest_tuple(items)
    }

    fn convert_element(&mut self, element: Expr, to: &Ty, conversion: Option<Expr>) -> IrResult<Expr> {
        if let Some(conv) = conversion {
            return Expr::convert_if_needed(Expr::invoke(conv, vec![element])?, to);
        }
        let from = element.ty();
        if &from == to {
            return Ok(element);
        }
        match (from.tuple_elements(), to.tuple_elements()) {
            (Some(inner), Some(_)) if !to.is_assignable_from(&from) => {
                let mut seq = Sequence::default();
                let held = self.spill(&mut seq, element, "item")?;
                let converted = self.convert_elements(held, to, vec![None; inner.len()])?;
                seq.finish(converted)
            }
            _ => Expr::convert(element, to.clone()),
        }
    }

    // ── with ─────────────────────────────────────────────────────────

    /// `{ c = source.Clone(); c.m = v; ...; c }`, or a plain copy for value
    /// types.
    pub(super) fn lower_with(&mut self, w: &With) -> IrResult<Expr> {
        let ty = w.source.ty();
        let source = self.visit(&w.source)?;
        let copy = match &w.clone {
            Some(clone) => Expr::convert_if_needed(Expr::call(Some(source), clone, vec![])?, &ty)?,
            None => source,
        };
        let mut seq = Sequence::default();
        let copy = self.spill(&mut seq, copy, "copy")?;
        for init in &w.initializers {
            let value = self.visit(&init.value)?;
            seq.push(Expr::assign(Expr::member(Some(copy.clone()), &init.member)?, value)?);
        }
        seq.finish_as(copy, ty)
    }
}
