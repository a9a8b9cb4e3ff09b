//! Variable storage.
//!
//! One frame per executed block, lambda call or catch clause, chained to
//! the frame it was entered from. Closures keep their defining chain alive,
//! so a captured variable is shared between the closure and its scope.

use std::cell::RefCell;
use std::rc::Rc;

use arbor_ir::Variable;
use rustc_hash::FxHashMap;

use crate::value::Value;

struct Frame {
    slots: RefCell<FxHashMap<usize, Value>>,
    parent: Env,
}

#[derive(Clone, Default)]
pub(crate) struct Env(Option<Rc<Frame>>);

impl Env {
    /// A new frame holding `bindings`, chained to `self`.
    pub(crate) fn child<'a>(&self, bindings: impl IntoIterator<Item = (&'a Variable, Value)>) -> Env {
        let slots = bindings.into_iter().map(|(v, value)| (v.id(), value)).collect();
        Env(Some(Rc::new(Frame {
            slots: RefCell::new(slots),
            parent: self.clone(),
        })))
    }

    pub(crate) fn get(&self, var: &Variable) -> Option<Value> {
        let mut env = self;
        while let Some(frame) = &env.0 {
            if let Some(value) = frame.slots.borrow().get(&var.id()) {
                return Some(value.clone());
            }
            env = &frame.parent;
        }
        None
    }

    /// Overwrite the innermost binding of `var`; `false` when unbound.
    pub(crate) fn set(&self, var: &Variable, value: Value) -> bool {
        let mut env = self;
        while let Some(frame) = &env.0 {
            if let Some(slot) = frame.slots.borrow_mut().get_mut(&var.id()) {
                *slot = value;
                return true;
            }
            env = &frame.parent;
        }
        false
    }
}
