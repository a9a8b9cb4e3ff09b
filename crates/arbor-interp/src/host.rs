//! The seam between compiled trees and the embedding application.
//!
//! Intrinsic operations run inside the evaluator. Every other method call,
//! constructor, property accessor, indexer accessor and await is handed to
//! the [`Host`].

use arbor_common::Method;

use crate::value::{exceptions, Value};

pub trait Host {
    /// Run `method`. `receiver` is `None` for static methods and
    /// constructors. By-reference arguments are written back from `args`
    /// after the call returns. `Err` carries a thrown value.
    fn call(&mut self, method: &Method, receiver: Option<&Value>, args: &mut [Value]) -> Result<Value, Value>;

    /// Resolve an awaited value. The default treats every value as already
    /// complete.
    fn await_value(&mut self, value: Value) -> Result<Value, Value> {
        Ok(value)
    }
}

/// A host with no operations: every call throws.
#[derive(Debug, Default)]
pub struct NoHost;

impl Host for NoHost {
    fn call(&mut self, method: &Method, _receiver: Option<&Value>, _args: &mut [Value]) -> Result<Value, Value> {
        Err(Value::exception(
            exceptions::MISSING_METHOD,
            format!("no host to run {method}"),
        ))
    }
}
