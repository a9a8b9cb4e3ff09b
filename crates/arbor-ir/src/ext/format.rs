//! Interpolated strings.

use arbor_common::{IrError, IrResult, Ty};

use crate::expr::{Expr, ExprKind};

/// A formatted hole in an interpolated string: `{value,alignment:format}`.
#[derive(Debug, PartialEq)]
pub struct Slot {
    pub value: Expr,
    pub alignment: Option<i64>,
    pub format: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum InterpolationPart {
    Text(String),
    Slot(Slot),
}

impl InterpolationPart {
    pub fn text(text: impl Into<String>) -> InterpolationPart {
        InterpolationPart::Text(text.into())
    }

    pub fn value(value: Expr) -> InterpolationPart {
        InterpolationPart::Slot(Slot {
            value,
            alignment: None,
            format: None,
        })
    }

    pub fn formatted(value: Expr, alignment: Option<i64>, format: Option<&str>) -> InterpolationPart {
        InterpolationPart::Slot(Slot {
            value,
            alignment,
            format: format.map(str::to_string),
        })
    }
}

#[derive(Debug, PartialEq)]
pub struct InterpolatedString {
    pub parts: Vec<InterpolationPart>,
    /// `String` renders eagerly; `Formattable` captures format and values.
    pub ty: Ty,
}

impl InterpolatedString {
    pub fn slots(&self) -> impl Iterator<Item = &Slot> {
        self.parts.iter().filter_map(|p| match p {
            InterpolationPart::Slot(s) => Some(s),
            InterpolationPart::Text(_) => None,
        })
    }
}

impl Expr {
    pub fn interpolated(parts: Vec<InterpolationPart>, ty: Ty) -> IrResult<Expr> {
        if !matches!(ty, Ty::String | Ty::Formattable) {
            return Err(IrError::shape("ty", format!("an interpolated string is String or Formattable, not {ty}")));
        }
        for part in &parts {
            let InterpolationPart::Slot(slot) = part else {
                continue;
            };
            if slot.value.ty().is_void() {
                return Err(IrError::shape("parts", "an interpolation slot cannot be Void"));
            }
            if slot.format.as_deref() == Some("") {
                return Err(IrError::shape("parts", "an empty format specifier is written as no specifier"));
            }
        }
        Ok(Expr::from_kind(ExprKind::InterpolatedString(InterpolatedString { parts, ty })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_type_is_string_or_formattable() {
        let parts = || vec![InterpolationPart::text("n = "), InterpolationPart::value(Expr::int(1))];
        assert_eq!(Expr::interpolated(parts(), Ty::String).unwrap().ty(), Ty::String);
        assert_eq!(Expr::interpolated(parts(), Ty::Formattable).unwrap().ty(), Ty::Formattable);
        assert!(Expr::interpolated(parts(), Ty::Int).is_err());
    }

    #[test]
    fn void_slot_rejected() {
        let parts = vec![InterpolationPart::value(Expr::empty())];
        assert!(Expr::interpolated(parts, Ty::String).is_err());
    }
}
