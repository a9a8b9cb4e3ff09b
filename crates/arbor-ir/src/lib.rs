//! The Arbor expression-tree IR: the node catalog, its validating factories
//! and the generic traversal every later pass is built on.
//!
//! - [`expr`]: `Expr`, `ExprKind` and the core node payloads
//! - [`build`]: factories for the core vocabulary (the nodes the tree
//!   compiler executes)
//! - [`ext`]: factories and payloads for the extended vocabulary (loops,
//!   switch, using, conditional access, compound assignment, argument
//!   bindings, index/range access, interpolation, tuple conversion,
//!   late-bound operations, `with`)
//! - [`children`]: canonical child order and rebuild-with-new-children
//! - [`visit`]: the `Visitor` trait with one hook per node kind
//! - [`binder`]: call sites and the `Binder` seam for late-bound operations
//! - [`print`]: the S-expression debug view

pub mod binder;
pub mod build;
pub mod children;
pub mod expr;
pub mod ext;
pub mod labels;
pub mod node;
pub mod ops;
pub mod print;
pub mod visit;

pub use binder::{Binder, BinderRef, CallSite, DynamicArgInfo, DynamicFlags, DynamicOp};
pub use expr::{CatchBlock, Expr, ExprKind};
pub use node::{LabelTarget, Placeholder, Variable};
pub use ops::{AssignOp, BinaryOp, GotoKind, UnaryAssignOp, UnaryOp};
pub use visit::{walk, Visitor};
