//! Static type representation for Arbor trees.
//!
//! Every expression node has a result type drawn from `Ty`. The set is
//! small: a handful of primitives, named class/struct/interface
//! types resolved through the [`TypeRegistry`](crate::registry::TypeRegistry),
//! nullable wrappers for value types, and structural tuple/array/function
//! types.

use std::fmt;

use serde::Serialize;

/// Number of elements stored directly in a tuple before the remainder is
/// nested into a trailing `rest` tuple.
pub const TUPLE_REST_ARITY: usize = 7;

/// An Arbor static type.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Ty {
    /// The type of statements; has no values.
    Void,
    Bool,
    /// 64-bit signed integer.
    Int,
    /// 64-bit float.
    Float,
    String,
    /// The top reference type. Every value converts to it.
    Object,
    /// A value type that may additionally hold `null`.
    Nullable(Box<Ty>),
    /// A named reference type.
    Class(String),
    /// A named value type with copy semantics.
    Struct(String),
    /// A named interface; values of implementing types convert to it.
    Interface(String),
    /// A tuple value type. Tuples longer than [`TUPLE_REST_ARITY`] keep their
    /// tail in a nested tuple in the last slot.
    Tuple(Vec<Ty>),
    Array(Box<Ty>),
    /// A position in a sequence, counted from the start or from the end.
    Index,
    /// A pair of [`Ty::Index`] bounds.
    Range,
    /// A function (lambda/delegate) type: `(params) -> ret`.
    Fn(Vec<Ty>, Box<Ty>),
    /// A format string plus captured arguments, rendered lazily.
    Formattable,
}

impl Ty {
    pub fn nullable(inner: Ty) -> Ty {
        Ty::Nullable(Box::new(inner))
    }

    pub fn array(elem: Ty) -> Ty {
        Ty::Array(Box::new(elem))
    }

    pub fn class(name: impl Into<String>) -> Ty {
        Ty::Class(name.into())
    }

    pub fn struct_ty(name: impl Into<String>) -> Ty {
        Ty::Struct(name.into())
    }

    pub fn interface(name: impl Into<String>) -> Ty {
        Ty::Interface(name.into())
    }

    pub fn fun(params: Vec<Ty>, ret: Ty) -> Ty {
        Ty::Fn(params, Box::new(ret))
    }

    /// Build a tuple type from a flat element list, nesting every element
    /// past the seventh into a trailing rest tuple.
    ///
    /// `tuple([Int; 9])` -> `(Int, Int, Int, Int, Int, Int, Int, (Int, Int))`
    pub fn tuple(mut elems: Vec<Ty>) -> Ty {
        if elems.len() <= TUPLE_REST_ARITY {
            return Ty::Tuple(elems);
        }
        let rest = elems.split_off(TUPLE_REST_ARITY);
        elems.push(Ty::tuple(rest));
        Ty::Tuple(elems)
    }

    /// Flatten a (possibly rest-nested) tuple type into its logical elements.
    /// Returns `None` for non-tuple types.
    pub fn tuple_elements(&self) -> Option<Vec<Ty>> {
        let Ty::Tuple(elems) = self else {
            return None;
        };
        let mut out = Vec::with_capacity(elems.len());
        for (i, elem) in elems.iter().enumerate() {
            if i == TUPLE_REST_ARITY {
                out.extend(elem.tuple_elements()?);
            } else {
                out.push(elem.clone());
            }
        }
        Some(out)
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Ty::Void)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Ty::Int | Ty::Float)
    }

    /// Value types are copied on assignment and need `Nullable` to hold null.
    pub fn is_value_type(&self) -> bool {
        matches!(
            self,
            Ty::Bool
                | Ty::Int
                | Ty::Float
                | Ty::Struct(_)
                | Ty::Tuple(_)
                | Ty::Index
                | Ty::Range
                | Ty::Nullable(_)
        )
    }

    pub fn is_reference_type(&self) -> bool {
        matches!(
            self,
            Ty::String
                | Ty::Object
                | Ty::Class(_)
                | Ty::Interface(_)
                | Ty::Array(_)
                | Ty::Fn(_, _)
                | Ty::Formattable
        )
    }

    /// Whether `null` is a valid value of this type.
    pub fn is_nullable(&self) -> bool {
        self.is_reference_type() || matches!(self, Ty::Nullable(_))
    }

    pub fn is_nullable_value_type(&self) -> bool {
        matches!(self, Ty::Nullable(_))
    }

    /// Strip one `Nullable` wrapper, if present.
    pub fn non_nullable(&self) -> &Ty {
        match self {
            Ty::Nullable(inner) => inner,
            other => other,
        }
    }

    /// The type able to hold this type's values plus `null`.
    ///
    /// Reference types are returned unchanged; value types are wrapped once.
    pub fn to_nullable(&self) -> Ty {
        if self.is_nullable() || self.is_void() {
            self.clone()
        } else {
            Ty::nullable(self.clone())
        }
    }

    /// Element type of an array, `None` otherwise.
    pub fn element_type(&self) -> Option<&Ty> {
        match self {
            Ty::Array(elem) => Some(elem),
            _ => None,
        }
    }

    /// Registry key for named types.
    pub fn type_name(&self) -> Option<&str> {
        match self {
            Ty::Class(name) | Ty::Struct(name) | Ty::Interface(name) => Some(name),
            _ => None,
        }
    }

    /// Structural assignability without consulting the type registry.
    ///
    /// Accepts identity, anything to `Object`, `T` to `T?`, `Int` to `Float`
    /// widening is *not* implicit here (that takes an explicit convert).
    pub fn is_assignable_from(&self, from: &Ty) -> bool {
        if self == from {
            return true;
        }
        match (self, from) {
            (Ty::Object, f) => !f.is_void(),
            (Ty::Nullable(inner), f) => inner.as_ref() == f,
            (Ty::Tuple(to), Ty::Tuple(fr)) => {
                to.len() == fr.len() && to.iter().zip(fr).all(|(t, f)| t.is_assignable_from(f))
            }
            _ => false,
        }
    }

    /// Assignability that also admits any named type into an interface.
    ///
    /// Used where no registry is at hand; factories that can consult a
    /// [`TypeRegistry`](crate::registry::TypeRegistry) check implementation
    /// precisely.
    pub fn accepts(&self, from: &Ty) -> bool {
        if self.is_assignable_from(from) {
            return true;
        }
        matches!(self, Ty::Interface(_)) && from.non_nullable().type_name().is_some()
    }

    /// Whether a value of `from` can be explicitly converted to `self`
    /// by a core convert node (numeric, nullable wrap/unwrap, boxing,
    /// reference casts).
    pub fn is_convertible_from(&self, from: &Ty) -> bool {
        if self.is_assignable_from(from) || from.is_assignable_from(self) {
            return true;
        }
        match (self.non_nullable(), from.non_nullable()) {
            (a, b) if a.is_numeric() && b.is_numeric() => true,
            (a, b) if a == b => true,
            (a, b) if a.is_reference_type() && b.is_reference_type() => true,
            (Ty::Interface(_), b) => b.type_name().is_some(),
            (Ty::Index, Ty::Int) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Void => write!(f, "Void"),
            Ty::Bool => write!(f, "Bool"),
            Ty::Int => write!(f, "Int"),
            Ty::Float => write!(f, "Float"),
            Ty::String => write!(f, "String"),
            Ty::Object => write!(f, "Object"),
            Ty::Nullable(inner) => write!(f, "{}?", inner),
            Ty::Class(name) | Ty::Struct(name) | Ty::Interface(name) => write!(f, "{}", name),
            Ty::Tuple(elems) => {
                write!(f, "(")?;
                for (i, e) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", e)?;
                }
                write!(f, ")")
            }
            Ty::Array(elem) => write!(f, "{}[]", elem),
            Ty::Index => write!(f, "Index"),
            Ty::Range => write!(f, "Range"),
            Ty::Fn(params, ret) => {
                write!(f, "(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", p)?;
                }
                write!(f, ") -> {}", ret)
            }
            Ty::Formattable => write!(f, "Formattable"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_tuple_nests_rest() {
        let ty = Ty::tuple(vec![Ty::Int; 9]);
        let Ty::Tuple(slots) = &ty else {
            panic!("expected tuple, got {ty}");
        };
        assert_eq!(slots.len(), 8);
        assert_eq!(slots[7], Ty::Tuple(vec![Ty::Int, Ty::Int]));
        assert_eq!(ty.tuple_elements().map(|e| e.len()), Some(9));
    }

    #[test]
    fn short_tuple_stays_flat() {
        let ty = Ty::tuple(vec![Ty::Int, Ty::String]);
        assert_eq!(ty, Ty::Tuple(vec![Ty::Int, Ty::String]));
    }

    #[test]
    fn nullability() {
        assert!(Ty::String.is_nullable());
        assert!(!Ty::Int.is_nullable());
        assert!(Ty::nullable(Ty::Int).is_nullable());
        assert_eq!(Ty::Int.to_nullable(), Ty::nullable(Ty::Int));
        assert_eq!(Ty::String.to_nullable(), Ty::String);
        assert_eq!(Ty::nullable(Ty::Int).non_nullable(), &Ty::Int);
    }

    #[test]
    fn assignability() {
        assert!(Ty::Object.is_assignable_from(&Ty::Int));
        assert!(Ty::nullable(Ty::Int).is_assignable_from(&Ty::Int));
        assert!(!Ty::Int.is_assignable_from(&Ty::nullable(Ty::Int)));
        assert!(!Ty::Float.is_assignable_from(&Ty::Int));
        assert!(Ty::Float.is_convertible_from(&Ty::Int));
        assert!(Ty::Int.is_convertible_from(&Ty::nullable(Ty::Int)));
        assert!(Ty::Index.is_convertible_from(&Ty::Int));
        assert!(Ty::interface("IDisposable").accepts(&Ty::class("Stream")));
        assert!(!Ty::Int.accepts(&Ty::class("Stream")));
    }

    #[test]
    fn display() {
        assert_eq!(Ty::nullable(Ty::Int).to_string(), "Int?");
        assert_eq!(Ty::array(Ty::String).to_string(), "String[]");
        assert_eq!(Ty::fun(vec![Ty::Int], Ty::Bool).to_string(), "(Int) -> Bool");
        assert_eq!(Ty::Tuple(vec![Ty::Int, Ty::Float]).to_string(), "(Int, Float)");
    }
}
