//! Lowering of extended Arbor trees.
//!
//! - [`reduce`](reduce()): rewrite every extended node into an equivalent
//!   core subtree, recursively, until none is left
//! - [`optimize`]: clean up the result without changing its behavior
//! - [`lower`]: both, as configured by [`LowerOptions`]
//!
//! Malformed input never reaches this crate: the factories in `arbor-ir`
//! reject it at construction. Every error produced here is an internal
//! inconsistency.

pub mod bind;
pub mod optimize;
pub mod options;
pub mod reduce;

use arbor_common::IrResult;
use arbor_ir::Expr;

pub use bind::EvaluationPlan;
pub use optimize::{optimize, optimize_preserving_labels};
pub use options::{ConfigError, LowerOptions};
pub use reduce::Reducer;

/// Reduce `expr` to the core vocabulary with default options.
pub fn reduce(expr: &Expr) -> IrResult<Expr> {
    reduce_with(expr, &LowerOptions::default())
}

pub fn reduce_with(expr: &Expr, options: &LowerOptions) -> IrResult<Expr> {
    Reducer::new(options).reduce(expr)
}

/// Reduce, then optimize when `options.optimize` is set.
pub fn lower(expr: &Expr, options: &LowerOptions) -> IrResult<Expr> {
    let reduced = reduce_with(expr, options)?;
    if options.optimize {
        Ok(optimize(&reduced))
    } else {
        Ok(reduced)
    }
}
