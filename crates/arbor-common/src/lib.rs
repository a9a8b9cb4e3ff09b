//! Shared types for the Arbor expression-tree IR.
//!
//! Static types, literal values, operation descriptors, the type registry
//! and the error taxonomy used by every other crate in the workspace.

pub mod error;
pub mod intrinsics;
pub mod literal;
pub mod member;
pub mod registry;
pub mod ty;

pub use error::{ErrorKind, IrError, IrResult};
pub use literal::Literal;
pub use member::{Indexer, Intrinsic, Member, MemberKind, Method, Param};
pub use registry::{TypeDef, TypeDefKind, TypeRegistry};
pub use ty::Ty;
