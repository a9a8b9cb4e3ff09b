//! Identity-carrying tree elements: variables, label targets and
//! conditional-access placeholders.
//!
//! These are the only parts of a tree compared by reference rather than by
//! structure. Two variables with the same name and type are still distinct
//! slots; a jump refers to the exact label target its loop or block declares.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use arbor_common::Ty;

macro_rules! identity_eq {
    ($name:ident) => {
        impl $name {
            pub fn ptr_eq(a: &$name, b: &$name) -> bool {
                Arc::ptr_eq(&a.0, &b.0)
            }

            /// A process-unique key for this identity, stable while any clone
            /// is alive.
            pub fn id(&self) -> usize {
                Arc::as_ptr(&self.0) as *const () as usize
            }
        }

        impl PartialEq for $name {
            fn eq(&self, other: &Self) -> bool {
                Arc::ptr_eq(&self.0, &other.0)
            }
        }

        impl Eq for $name {}

        impl Hash for $name {
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.id().hash(state);
            }
        }
    };
}

// ── Variables ────────────────────────────────────────────────────────

#[derive(Debug)]
struct VariableInfo {
    name: String,
    ty: Ty,
}

/// A local or lambda parameter slot.
#[derive(Clone)]
pub struct Variable(Arc<VariableInfo>);

impl Variable {
    pub fn new(name: impl Into<String>, ty: Ty) -> Variable {
        Variable(Arc::new(VariableInfo {
            name: name.into(),
            ty,
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn ty(&self) -> &Ty {
        &self.0.ty
    }
}

identity_eq!(Variable);

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.0.name, self.0.ty)
    }
}

// ── Labels ───────────────────────────────────────────────────────────

#[derive(Debug)]
struct LabelInfo {
    name: String,
    ty: Ty,
}

/// The target of a jump. Declared once (by a label statement, a loop, a
/// switch or a statement block) and referenced by any number of jumps.
///
/// A non-void label carries a value: jumps to it must supply one.
#[derive(Clone)]
pub struct LabelTarget(Arc<LabelInfo>);

impl LabelTarget {
    pub fn new(name: impl Into<String>) -> LabelTarget {
        LabelTarget::typed(name, Ty::Void)
    }

    pub fn typed(name: impl Into<String>, ty: Ty) -> LabelTarget {
        LabelTarget(Arc::new(LabelInfo {
            name: name.into(),
            ty,
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn ty(&self) -> &Ty {
        &self.0.ty
    }
}

identity_eq!(LabelTarget);

impl fmt::Debug for LabelTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "label {}", self.0.name)
    }
}

// ── Placeholders ─────────────────────────────────────────────────────

#[derive(Debug)]
struct PlaceholderInfo {
    ty: Ty,
}

/// Stands for "the non-null receiver value" inside the `when_not_null`
/// branch of the conditional access that declares it.
#[derive(Clone)]
pub struct Placeholder(Arc<PlaceholderInfo>);

impl Placeholder {
    pub fn new(ty: Ty) -> Placeholder {
        Placeholder(Arc::new(PlaceholderInfo { ty }))
    }

    pub fn ty(&self) -> &Ty {
        &self.0.ty
    }
}

identity_eq!(Placeholder);

impl fmt::Debug for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "receiver: {}", self.0.ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashSet;

    #[test]
    fn variables_compare_by_identity() {
        let a = Variable::new("x", Ty::Int);
        let b = Variable::new("x", Ty::Int);
        assert_ne!(a, b);
        assert_eq!(a, a.clone());

        let mut set = FxHashSet::default();
        set.insert(a.clone());
        assert!(set.contains(&a));
        assert!(!set.contains(&b));
    }

    #[test]
    fn labels_default_to_void() {
        let l = LabelTarget::new("brk");
        assert!(l.ty().is_void());
        assert_eq!(LabelTarget::typed("ret", Ty::Int).ty(), &Ty::Int);
    }
}
