//! Type registry: named type definitions and convention-based lookups.
//!
//! Factories that resolve an operation "by convention" (the disposal
//! operation of a resource, the enumerator pattern of a collection, the
//! clone operation of a record-like class) consult the registry. Everything
//! else works from the descriptors stored directly in the nodes.

use rustc_hash::FxHashMap;

use crate::member::{Indexer, Member, Method};
use crate::ty::Ty;

/// Names the conventions are keyed on.
pub mod well_known {
    pub const DISPOSABLE: &str = "IDisposable";
    pub const ASYNC_DISPOSABLE: &str = "IAsyncDisposable";
    pub const DISPOSE: &str = "Dispose";
    pub const DISPOSE_ASYNC: &str = "DisposeAsync";
    pub const GET_ENUMERATOR: &str = "GetEnumerator";
    pub const MOVE_NEXT: &str = "MoveNext";
    pub const CURRENT: &str = "Current";
    pub const CLONE: &str = "Clone";
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypeDefKind {
    Class,
    Struct,
    Interface,
}

/// A named type and the operations it declares.
#[derive(Clone, Debug)]
pub struct TypeDef {
    pub name: String,
    pub kind: TypeDefKind,
    pub members: Vec<Member>,
    pub methods: Vec<Method>,
    pub indexers: Vec<Indexer>,
    /// Interfaces implemented directly by this type.
    pub interfaces: Vec<String>,
}

impl TypeDef {
    pub fn new(name: impl Into<String>, kind: TypeDefKind) -> Self {
        TypeDef {
            name: name.into(),
            kind,
            members: Vec::new(),
            methods: Vec::new(),
            indexers: Vec::new(),
            interfaces: Vec::new(),
        }
    }

    pub fn ty(&self) -> Ty {
        match self.kind {
            TypeDefKind::Class => Ty::Class(self.name.clone()),
            TypeDefKind::Struct => Ty::Struct(self.name.clone()),
            TypeDefKind::Interface => Ty::Interface(self.name.clone()),
        }
    }

    pub fn with_member(mut self, member: Member) -> Self {
        self.members.push(member);
        self
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.methods.push(method);
        self
    }

    pub fn with_indexer(mut self, indexer: Indexer) -> Self {
        self.indexers.push(indexer);
        self
    }

    pub fn implementing(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }
}

/// All named types known to a frontend.
#[derive(Clone, Debug, Default)]
pub struct TypeRegistry {
    defs: FxHashMap<String, TypeDef>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a definition.
    pub fn define(&mut self, def: TypeDef) {
        self.defs.insert(def.name.clone(), def);
    }

    pub fn get(&self, name: &str) -> Option<&TypeDef> {
        self.defs.get(name)
    }

    fn def_of(&self, ty: &Ty) -> Option<&TypeDef> {
        self.get(ty.non_nullable().type_name()?)
    }

    /// Whether `ty` implements `interface`, directly or through the
    /// interfaces it implements.
    pub fn implements(&self, ty: &Ty, interface: &str) -> bool {
        if ty.non_nullable() == &Ty::Interface(interface.to_string()) {
            return true;
        }
        let Some(def) = self.def_of(ty) else {
            return false;
        };
        def.interfaces.iter().any(|i| {
            i == interface
                || self
                    .get(i)
                    .is_some_and(|iface| self.implements(&iface.ty(), interface))
        })
    }

    /// Find a method declared on `ty` itself (not its interfaces) with the
    /// given name and parameter count.
    pub fn find_declared_method(&self, ty: &Ty, name: &str, arity: usize) -> Option<Method> {
        self.def_of(ty)?
            .methods
            .iter()
            .find(|m| m.name() == name && m.params().len() == arity && !m.is_static())
            .cloned()
    }

    /// Find an instance method on `ty` or, failing that, on an interface it
    /// implements.
    pub fn find_method(&self, ty: &Ty, name: &str, arity: usize) -> Option<Method> {
        if let Some(m) = self.find_declared_method(ty, name, arity) {
            return Some(m);
        }
        let def = self.def_of(ty)?;
        def.interfaces.iter().find_map(|i| {
            self.get(i)
                .and_then(|iface| self.find_method(&iface.ty(), name, arity))
        })
    }

    pub fn find_member(&self, ty: &Ty, name: &str) -> Option<Member> {
        self.def_of(ty)?
            .members
            .iter()
            .find(|m| m.name() == name)
            .cloned()
    }

    pub fn find_indexer(&self, ty: &Ty, arity: usize) -> Option<Indexer> {
        self.def_of(ty)?
            .indexers
            .iter()
            .find(|i| i.params().len() == arity)
            .cloned()
    }

    /// Assignability including interface implementation.
    pub fn is_assignable(&self, to: &Ty, from: &Ty) -> bool {
        if to.is_assignable_from(from) {
            return true;
        }
        match to.non_nullable() {
            Ty::Interface(name) => self.implements(from, name),
            _ => false,
        }
    }

    /// Whether `method` can be invoked on a receiver of static type `ty`:
    /// declared by the type itself or by an interface it implements.
    pub fn declares(&self, ty: &Ty, method: &Method) -> bool {
        let declaring = method.declaring();
        if declaring == ty.non_nullable() {
            return true;
        }
        match declaring {
            Ty::Interface(name) => self.implements(ty, name),
            _ => false,
        }
    }
}
