//! Extended node kinds: constructs frontends build and the reducer lowers
//! into the core vocabulary.

pub mod access;
pub mod assign;
pub mod binding;
pub mod block;
pub mod dynamic;
pub mod format;
pub mod loops;
pub mod switch;
pub mod tuple;
pub mod using;
pub mod with;

pub use access::{mentions, ArrayAccess, ConditionalAccess, RangeExpr};
pub use assign::{CompoundAssign, UnaryAssign};
pub use binding::{
    bind_arguments, validate_bindings, ArgBinding, Argument, CallBinding, IndexBinding,
    InvokeBinding, NewBinding,
};
pub use block::StmtBlock;
pub use dynamic::{DynamicArg, DynamicExpr};
pub use format::{InterpolatedString, InterpolationPart, Slot};
pub use loops::{DoWhile, Enumeration, EnumeratorInfo, For, ForEach, LoopLabels, While};
pub use switch::{CaseTest, Switch, SwitchCase};
pub use tuple::{element_convertible, TupleConvert, TupleLiteral};
pub use using::{Using, UsingResource};
pub use with::{MemberInit, With};
