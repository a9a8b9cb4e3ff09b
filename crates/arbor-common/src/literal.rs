//! Constant values embedded in trees (constants, parameter defaults,
//! switch test values).

use std::fmt;

use serde::Serialize;

use crate::ty::Ty;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Literal {
    /// The natural type of the literal. `Null` has no type of its own.
    pub fn natural_type(&self) -> Option<Ty> {
        match self {
            Literal::Null => None,
            Literal::Bool(_) => Some(Ty::Bool),
            Literal::Int(_) => Some(Ty::Int),
            Literal::Float(_) => Some(Ty::Float),
            Literal::Str(_) => Some(Ty::String),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Literal::Null)
    }

    /// Whether this literal is a valid value of `ty`.
    pub fn fits(&self, ty: &Ty) -> bool {
        match self.natural_type() {
            None => ty.is_nullable(),
            Some(natural) => ty.is_assignable_from(&natural),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => write!(f, "null"),
            Literal::Bool(b) => write!(f, "{b}"),
            Literal::Int(i) => write!(f, "{i}"),
            Literal::Float(x) => write!(f, "{x:?}"),
            Literal::Str(s) => write!(f, "{s:?}"),
        }
    }
}
