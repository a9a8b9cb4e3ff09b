//! Native implementations of the intrinsic operations.

use std::rc::Rc;

use arbor_common::Intrinsic;

use crate::value::{exceptions, Formattable, Value};

/// Run an intrinsic. `Err` carries a thrown value.
pub(crate) fn call(kind: Intrinsic, args: &[Value]) -> Result<Value, Value> {
    match (kind, args) {
        (Intrinsic::FormatValue, [value, Value::Int(alignment), format]) => {
            let format = format.as_str().unwrap_or("");
            Ok(Value::str(&format_value(value, *alignment, format)))
        }
        (Intrinsic::CreateFormattable, [format, args]) => {
            let format = format.as_str().unwrap_or("").to_string();
            let args = match args {
                Value::Array(arr) => arr.to_vec(),
                Value::Null => return Err(null_argument("args")),
                other => vec![other.clone()],
            };
            render_composite(&format, &args).map_err(|msg| Value::exception(exceptions::FORMAT, msg))?;
            Ok(Value::Formattable(Rc::new(Formattable { format, args })))
        }
        (Intrinsic::IndexOffset, [Value::Index(index), Value::Int(length)]) => {
            Ok(Value::Int(index.offset(*length)))
        }
        (Intrinsic::ArraySlice, [Value::Array(array), Value::Range(start, end)]) => {
            let len = array.len() as i64;
            let (from, to) = (start.offset(len), end.offset(len));
            if from < 0 || to > len || from > to {
                return Err(Value::exception(
                    exceptions::ARGUMENT_OUT_OF_RANGE,
                    format!("range {from}..{to} is outside an array of {len}"),
                ));
            }
            let items = array.to_vec();
            let slice = items[from as usize..to as usize].to_vec();
            Ok(Value::array(array.elem.clone(), slice))
        }
        (Intrinsic::ArraySlice, [Value::Null, _]) => Err(null_argument("array")),
        (Intrinsic::ToString, [value]) => Ok(Value::str(&value.to_string())),
        (kind, args) => Err(Value::exception(
            exceptions::INVALID_OPERATION,
            format!("{kind:?} cannot take {args:?}"),
        )),
    }
}

fn null_argument(name: &str) -> Value {
    Value::exception(exceptions::NULL_REFERENCE, format!("`{name}` is null"))
}

// ── Formatting ───────────────────────────────────────────────────────

/// `value` rendered with a format specifier, padded to `alignment`
/// (right-aligned when positive, left-aligned when negative).
pub(crate) fn format_value(value: &Value, alignment: i64, format: &str) -> String {
    let text = apply_format(value, format);
    let width = alignment.unsigned_abs() as usize;
    if alignment > 0 {
        format!("{text:>width$}")
    } else if alignment < 0 {
        format!("{text:<width$}")
    } else {
        text
    }
}

/// The standard numeric specifiers `D`, `X`, `F` and `N`, each with an
/// optional precision. Anything else renders as `ToString`.
fn apply_format(value: &Value, format: &str) -> String {
    let mut chars = format.chars();
    let Some(letter) = chars.next() else {
        return value.to_string();
    };
    let digits = chars.as_str();
    let precision: Option<usize> = if digits.is_empty() {
        None
    } else {
        match digits.parse() {
            Ok(p) => Some(p),
            Err(_) => return value.to_string(),
        }
    };
    match (letter, value) {
        ('D' | 'd', Value::Int(i)) => {
            let width = precision.unwrap_or(0);
            let sign = if *i < 0 { "-" } else { "" };
            format!("{sign}{:0width$}", i.unsigned_abs())
        }
        ('X', Value::Int(i)) => format!("{:0width$X}", i, width = precision.unwrap_or(0)),
        ('x', Value::Int(i)) => format!("{:0width$x}", i, width = precision.unwrap_or(0)),
        ('F' | 'f', Value::Int(i)) => fixed(*i as f64, precision.unwrap_or(2)),
        ('F' | 'f', Value::Float(x)) => fixed(*x, precision.unwrap_or(2)),
        ('N' | 'n', Value::Int(i)) => grouped(*i as f64, precision.unwrap_or(2)),
        ('N' | 'n', Value::Float(x)) => grouped(*x, precision.unwrap_or(2)),
        _ => value.to_string(),
    }
}

fn fixed(x: f64, precision: usize) -> String {
    format!("{x:.precision$}")
}

/// Fixed-point with `,` thousands separators.
fn grouped(x: f64, precision: usize) -> String {
    let text = fixed(x.abs(), precision);
    let (int_part, frac_part) = match text.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (text.as_str(), None),
    };
    let mut out = String::new();
    if x < 0.0 {
        out.push('-');
    }
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(frac);
    }
    out
}

/// Render a composite format string: `{i}`, `{i,alignment}`,
/// `{i:format}`, `{i,alignment:format}`, with `{{` and `}}` as literal
/// braces.
pub(crate) fn render_composite(format: &str, args: &[Value]) -> Result<String, String> {
    let mut out = String::with_capacity(format.len());
    let mut chars = format.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut item = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(c) => item.push(c),
                        None => return Err(format!("unterminated format item in {format:?}")),
                    }
                }
                out.push_str(&render_item(&item, args)?);
            }
            '}' => return Err(format!("unmatched `}}` in {format:?}")),
            c => out.push(c),
        }
    }
    Ok(out)
}

fn render_item(item: &str, args: &[Value]) -> Result<String, String> {
    let (head, spec) = match item.split_once(':') {
        Some((h, s)) => (h, s),
        None => (item, ""),
    };
    let (index, alignment) = match head.split_once(',') {
        Some((i, a)) => (i, a.trim()),
        None => (head, ""),
    };
    let index: usize = index
        .trim()
        .parse()
        .map_err(|_| format!("bad format item index {index:?}"))?;
    let alignment: i64 = if alignment.is_empty() {
        0
    } else {
        alignment
            .parse()
            .map_err(|_| format!("bad alignment {alignment:?}"))?
    };
    let value = args
        .get(index)
        .ok_or_else(|| format!("format item {index} has no argument"))?;
    Ok(format_value(value, alignment, spec))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::IndexValue;
    use arbor_common::Ty;

    #[test]
    fn numeric_specifiers() {
        assert_eq!(format_value(&Value::Int(42), 0, "D5"), "00042");
        assert_eq!(format_value(&Value::Int(-7), 0, "D3"), "-007");
        assert_eq!(format_value(&Value::Int(255), 0, "X"), "FF");
        assert_eq!(format_value(&Value::Int(255), 0, "x4"), "00ff");
        assert_eq!(format_value(&Value::Float(3.14159), 0, "F2"), "3.14");
        assert_eq!(format_value(&Value::Int(1234567), 0, "N0"), "1,234,567");
        assert_eq!(format_value(&Value::Float(-1234.5), 0, "N1"), "-1,234.5");
    }

    #[test]
    fn alignment_pads() {
        assert_eq!(format_value(&Value::Int(7), 4, ""), "   7");
        assert_eq!(format_value(&Value::str("ab"), -4, ""), "ab  ");
        assert_eq!(format_value(&Value::str("abcdef"), 3, ""), "abcdef");
    }

    #[test]
    fn composite_rendering() {
        let args = [Value::Int(3), Value::str("x")];
        assert_eq!(render_composite("{0} and {1,3}", &args).unwrap(), "3 and   x");
        assert_eq!(render_composite("{{{0:D2}}}", &args).unwrap(), "{03}");
        assert!(render_composite("{2}", &args).is_err());
        assert!(render_composite("{0", &args).is_err());
        assert!(render_composite("}", &args).is_err());
    }

    #[test]
    fn slices_and_offsets() {
        let array = Value::array(Ty::Int, (0..5).map(Value::Int).collect());
        let range = Value::Range(IndexValue::start(1), IndexValue::end(1));
        let slice = call(Intrinsic::ArraySlice, &[array.clone(), range]).unwrap();
        let Value::Array(items) = slice else {
            panic!("expected an array");
        };
        assert_eq!(items.to_vec(), vec![Value::Int(1), Value::Int(2), Value::Int(3)]);

        let offset = call(Intrinsic::IndexOffset, &[Value::Index(IndexValue::end(2)), Value::Int(5)]).unwrap();
        assert_eq!(offset, Value::Int(3));

        let bad = Value::Range(IndexValue::start(4), IndexValue::start(2));
        assert!(call(Intrinsic::ArraySlice, &[array, bad]).is_err());
    }
}
