//! Failures of a compiled tree at run time.

use std::fmt;

use arbor_common::IrError;

use crate::value::Value;

#[derive(Debug, Clone)]
pub enum RuntimeError {
    /// A value was thrown and no handler caught it.
    Thrown(Value),
    /// The binder of a late-bound call site could not produce an operation.
    Bind(IrError),
    /// The compiled lambda was invoked with the wrong number of arguments.
    Arity { expected: usize, found: usize },
    /// An operation met a value of a shape the factories should have ruled
    /// out.
    Internal(String),
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::Thrown(value) => write!(f, "unhandled exception: {value:?}"),
            RuntimeError::Bind(err) => write!(f, "late binding failed: {err}"),
            RuntimeError::Arity { expected, found } => {
                write!(f, "expected {expected} arguments, found {found}")
            }
            RuntimeError::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for RuntimeError {}

impl RuntimeError {
    /// The thrown value, if this is an unhandled exception.
    pub fn thrown(&self) -> Option<&Value> {
        match self {
            RuntimeError::Thrown(value) => Some(value),
            _ => None,
        }
    }
}
