//! Error taxonomy shared by node construction and reduction.
//!
//! Every error is raised synchronously by the call that detects it. The four
//! kinds separate caller mistakes (absent or ill-shaped inputs, combinations
//! with no lowering) from defects in an upstream component.

use std::fmt;

use serde::Serialize;

/// A construction or reduction error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IrError {
    pub kind: ErrorKind,
    /// Name of the offending argument, when one can be singled out.
    pub argument: Option<String>,
    pub message: String,
}

/// The category of an [`IrError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    /// A required child or descriptor was absent.
    ArgumentNull,
    /// Wrong arity, wrong static type, a non-writable target, a duplicate
    /// label/local/parameter, an unbound required parameter, or an
    /// operation resolved from the wrong declaring type.
    ArgumentShape,
    /// A node kind combination that has no valid lowering.
    UnsupportedNodeKind,
    /// A reference without a matching declaration found while reducing.
    /// Always a defect upstream; never recoverable.
    InternalInconsistency,
}

impl IrError {
    pub fn new(kind: ErrorKind, argument: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            kind,
            argument: argument.map(str::to_string),
            message: message.into(),
        }
    }

    pub fn argument_null(argument: &str) -> Self {
        Self::new(
            ErrorKind::ArgumentNull,
            Some(argument),
            format!("`{argument}` is required"),
        )
    }

    pub fn shape(argument: &str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ArgumentShape, Some(argument), message)
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnsupportedNodeKind, None, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InternalInconsistency, None, message)
    }

    pub fn is_internal(&self) -> bool {
        self.kind == ErrorKind::InternalInconsistency
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ArgumentNull => write!(f, "missing argument"),
            Self::ArgumentShape => write!(f, "invalid argument"),
            Self::UnsupportedNodeKind => write!(f, "unsupported node"),
            Self::InternalInconsistency => write!(f, "internal inconsistency"),
        }
    }
}

impl fmt::Display for IrError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.argument {
            Some(arg) => write!(f, "{} `{}`: {}", self.kind, arg, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for IrError {}

/// Shorthand used throughout the workspace.
pub type IrResult<T> = Result<T, IrError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_with_argument() {
        let err = IrError::shape("body", "expected a void body");
        assert_eq!(err.to_string(), "invalid argument `body`: expected a void body");
    }

    #[test]
    fn display_without_argument() {
        let err = IrError::internal("label `L` is not declared");
        assert_eq!(err.to_string(), "internal inconsistency: label `L` is not declared");
        assert!(err.is_internal());
    }

    #[test]
    fn argument_null_message() {
        let err = IrError::argument_null("resource");
        assert_eq!(err.kind, ErrorKind::ArgumentNull);
        assert_eq!(err.to_string(), "missing argument `resource`: `resource` is required");
    }
}
