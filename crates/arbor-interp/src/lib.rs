//! Reference tree compiler for core Arbor IR.
//!
//! [`compile`] checks a core tree and returns a [`Compiled`] callable;
//! [`Compiled::invoke`] evaluates it by walking the tree. Intrinsic
//! operations (formatting, index offsets, array slices, formattable
//! construction) run natively. Everything else a tree calls (methods,
//! constructors, property and indexer accessors, awaits) goes through the
//! caller's [`Host`]. Late-bound call sites are bound on first use per
//! distinct list of argument types and the bound lambda is cached.

mod compile;
mod env;
pub mod error;
mod eval;
pub mod host;
mod intrinsics;
pub mod value;

pub use compile::{compile, Compiled};
pub use error::RuntimeError;
pub use host::{Host, NoHost};
pub use value::{exceptions, IndexValue, Object, Value};
