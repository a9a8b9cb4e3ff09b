//! Late-binding contract for dynamic operations.
//!
//! A dynamic node does not know which operation it performs until run time.
//! Lowering turns it into a call site: a description of the operation (tag,
//! flags, argument descriptors, context type) plus the [`Binder`] that will
//! resolve it. The tree compiler evaluates the arguments, asks the binder for
//! a bound operation given their runtime types, and invokes the result.

use std::fmt;
use std::ops::BitOr;
use std::sync::Arc;

use arbor_common::{IrResult, Ty};

use crate::expr::Expr;
use crate::ops::{BinaryOp, UnaryOp};

/// The operation a dynamic node performs.
#[derive(Clone, Debug, PartialEq)]
pub enum DynamicOp {
    Binary(BinaryOp),
    Unary(UnaryOp),
    Convert(Ty),
    GetMember(String),
    SetMember(String),
    InvokeMember(String),
    Invoke,
    GetIndex,
    SetIndex,
}

impl DynamicOp {
    /// Minimum and maximum argument counts (receiver included).
    pub fn arity(&self) -> (usize, Option<usize>) {
        match self {
            DynamicOp::Binary(_) => (2, Some(2)),
            DynamicOp::Unary(_) | DynamicOp::Convert(_) | DynamicOp::GetMember(_) => (1, Some(1)),
            DynamicOp::SetMember(_) => (2, Some(2)),
            DynamicOp::InvokeMember(_) | DynamicOp::Invoke => (1, None),
            DynamicOp::GetIndex => (2, None),
            DynamicOp::SetIndex => (3, None),
        }
    }

    /// Static result type of the operation.
    pub fn result_ty(&self) -> Ty {
        match self {
            DynamicOp::Convert(ty) => ty.clone(),
            DynamicOp::Unary(UnaryOp::IsTrue | UnaryOp::IsFalse) => Ty::Bool,
            _ => Ty::Object,
        }
    }

    pub fn name(&self) -> String {
        match self {
            DynamicOp::Binary(op) => format!("binary {}", op.symbol()),
            DynamicOp::Unary(op) => format!("unary {}", op.name()),
            DynamicOp::Convert(ty) => format!("convert {ty}"),
            DynamicOp::GetMember(name) => format!("get .{name}"),
            DynamicOp::SetMember(name) => format!("set .{name}"),
            DynamicOp::InvokeMember(name) => format!("invoke .{name}"),
            DynamicOp::Invoke => "invoke".to_string(),
            DynamicOp::GetIndex => "get []".to_string(),
            DynamicOp::SetIndex => "set []".to_string(),
        }
    }
}

/// Flags carried to the binder.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct DynamicFlags(u8);

impl DynamicFlags {
    pub const NONE: DynamicFlags = DynamicFlags(0);
    /// Arithmetic overflow throws.
    pub const CHECKED: DynamicFlags = DynamicFlags(1);
    /// `&&` / `||`: the right operand is evaluated only when the left one
    /// does not decide the result.
    pub const LOGICAL_SHORT_CIRCUIT: DynamicFlags = DynamicFlags(1 << 1);
    /// The caller discards the result.
    pub const RESULT_DISCARDED: DynamicFlags = DynamicFlags(1 << 2);
    /// The operation computes the new value of a compound assignment.
    pub const COMPOUND_VALUE: DynamicFlags = DynamicFlags(1 << 3);

    pub fn contains(self, other: DynamicFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn bits(self) -> u8 {
        self.0
    }
}

impl BitOr for DynamicFlags {
    type Output = DynamicFlags;

    fn bitor(self, rhs: DynamicFlags) -> DynamicFlags {
        DynamicFlags(self.0 | rhs.0)
    }
}

/// Per-argument information for the binder.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DynamicArgInfo {
    /// Named-argument name, if the argument was passed by name.
    pub name: Option<String>,
    pub by_ref: bool,
}

/// Resolves dynamic operations against runtime argument types.
pub trait Binder: Send + Sync {
    /// Produce a lambda taking one parameter per entry of `shapes` (in
    /// order) that performs `site`'s operation.
    fn bind(&self, site: &CallSite, shapes: &[Ty]) -> IrResult<Expr>;
}

/// Shared handle to a [`Binder`]. Two handles are equal when they point to
/// the same binder instance.
#[derive(Clone)]
pub struct BinderRef(pub Arc<dyn Binder>);

impl BinderRef {
    pub fn new(binder: impl Binder + 'static) -> BinderRef {
        BinderRef(Arc::new(binder))
    }

    pub fn get(&self) -> &dyn Binder {
        self.0.as_ref()
    }
}

impl PartialEq for BinderRef {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.0), Arc::as_ptr(&other.0))
    }
}

impl fmt::Debug for BinderRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Binder@{:p}", Arc::as_ptr(&self.0))
    }
}

/// A fully described dynamic operation waiting to be bound.
#[derive(Clone, Debug, PartialEq)]
pub struct CallSite {
    pub op: DynamicOp,
    pub flags: DynamicFlags,
    pub args: Vec<DynamicArgInfo>,
    /// Static type in whose context the operation was written (member
    /// accessibility, extension lookup).
    pub context: Option<Ty>,
    pub binder: BinderRef,
}

impl CallSite {
    pub fn bind(&self, shapes: &[Ty]) -> IrResult<Expr> {
        self.binder.get().bind(self, shapes)
    }
}
