//! Runtime values.
//!
//! Reference types (classes, arrays, closures) share one allocation between
//! every holder. Structs and tuples are values: storing one into a variable,
//! field or element stores a copy, so later writes through the original do
//! not show through the copy.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use arbor_common::ty::TUPLE_REST_ARITY;
use arbor_common::{Literal, Ty};
use arbor_ir::Expr;
use rustc_hash::FxHashMap;

use crate::env::Env;

/// Names of the exception types raised by the evaluator itself.
pub mod exceptions {
    pub const NULL_REFERENCE: &str = "NullReferenceException";
    pub const INDEX_OUT_OF_RANGE: &str = "IndexOutOfRangeException";
    pub const ARGUMENT_OUT_OF_RANGE: &str = "ArgumentOutOfRangeException";
    pub const DIVIDE_BY_ZERO: &str = "DivideByZeroException";
    pub const INVALID_CAST: &str = "InvalidCastException";
    pub const INVALID_OPERATION: &str = "InvalidOperationException";
    pub const FORMAT: &str = "FormatException";
    pub const MISSING_METHOD: &str = "MissingMethodException";
}

#[derive(Clone)]
pub enum Value {
    Null,
    /// The value of a statement.
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    Object(Rc<Object>),
    Array(Rc<Array>),
    /// One tuple level; slot 7 holds the rest tuple of a long tuple.
    Tuple(Rc<[Value]>),
    Index(IndexValue),
    Range(IndexValue, IndexValue),
    Closure(Rc<Closure>),
    Formattable(Rc<Formattable>),
    Exception(Rc<Exception>),
}

// ── Payloads ─────────────────────────────────────────────────────────

/// A position counted from the start, or from the end when `from_end`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndexValue {
    pub value: i64,
    pub from_end: bool,
}

impl IndexValue {
    pub fn start(value: i64) -> IndexValue {
        IndexValue { value, from_end: false }
    }

    pub fn end(value: i64) -> IndexValue {
        IndexValue { value, from_end: true }
    }

    /// The absolute position in a sequence of `length` elements.
    pub fn offset(self, length: i64) -> i64 {
        if self.from_end {
            length - self.value
        } else {
            self.value
        }
    }
}

/// An instance of a class or struct. Fields missing from the map hold the
/// default of their type.
#[derive(Debug)]
pub struct Object {
    pub ty: Ty,
    fields: RefCell<FxHashMap<String, Value>>,
}

impl Object {
    pub fn new(ty: Ty) -> Object {
        Object {
            ty,
            fields: RefCell::new(FxHashMap::default()),
        }
    }

    pub fn with_fields(ty: Ty, fields: impl IntoIterator<Item = (String, Value)>) -> Object {
        Object {
            ty,
            fields: RefCell::new(fields.into_iter().collect()),
        }
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.fields.borrow().get(name).cloned()
    }

    pub fn set(&self, name: &str, value: Value) {
        self.fields.borrow_mut().insert(name.to_string(), value);
    }

    pub fn is_struct(&self) -> bool {
        matches!(self.ty, Ty::Struct(_))
    }

    fn copy(&self) -> Object {
        let fields = self
            .fields
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.copied()))
            .collect();
        Object {
            ty: self.ty.clone(),
            fields: RefCell::new(fields),
        }
    }
}

#[derive(Debug)]
pub struct Array {
    pub elem: Ty,
    items: RefCell<Vec<Value>>,
}

impl Array {
    pub fn new(elem: Ty, items: Vec<Value>) -> Array {
        Array {
            elem,
            items: RefCell::new(items),
        }
    }

    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    pub fn get(&self, index: i64) -> Option<Value> {
        let i = usize::try_from(index).ok()?;
        self.items.borrow().get(i).cloned()
    }

    /// `false` when `index` is out of range.
    pub fn set(&self, index: i64, value: Value) -> bool {
        let Ok(i) = usize::try_from(index) else {
            return false;
        };
        match self.items.borrow_mut().get_mut(i) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn to_vec(&self) -> Vec<Value> {
        self.items.borrow().clone()
    }
}

/// A lambda value together with the variables it captured.
pub struct Closure {
    pub(crate) lambda: Expr,
    pub(crate) env: Env,
}

impl Closure {
    pub fn name(&self) -> Option<&str> {
        self.lambda.as_lambda().and_then(|l| l.name.as_deref())
    }
}

impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "closure {}", self.name().unwrap_or("<anonymous>"))
    }
}

/// A composite format string and its arguments, rendered on demand.
#[derive(Debug)]
pub struct Formattable {
    pub format: String,
    pub args: Vec<Value>,
}

#[derive(Debug)]
pub struct Exception {
    pub ty: Ty,
    pub message: String,
}

// ── Construction ─────────────────────────────────────────────────────

impl Value {
    pub fn str(s: &str) -> Value {
        Value::Str(Rc::from(s))
    }

    pub fn from_literal(lit: &Literal) -> Value {
        match lit {
            Literal::Null => Value::Null,
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Int(i) => Value::Int(*i),
            Literal::Float(x) => Value::Float(*x),
            Literal::Str(s) => Value::str(s),
        }
    }

    /// `default(ty)`.
    pub fn default_of(ty: &Ty) -> Value {
        match ty {
            Ty::Void => Value::Unit,
            Ty::Bool => Value::Bool(false),
            Ty::Int => Value::Int(0),
            Ty::Float => Value::Float(0.0),
            Ty::Struct(_) => Value::Object(Rc::new(Object::new(ty.clone()))),
            Ty::Tuple(elems) => Value::Tuple(elems.iter().map(Value::default_of).collect()),
            Ty::Index => Value::Index(IndexValue::start(0)),
            Ty::Range => Value::Range(IndexValue::start(0), IndexValue::start(0)),
            Ty::String
            | Ty::Object
            | Ty::Nullable(_)
            | Ty::Class(_)
            | Ty::Interface(_)
            | Ty::Array(_)
            | Ty::Fn(..)
            | Ty::Formattable => Value::Null,
        }
    }

    pub fn exception(ty_name: &str, message: impl Into<String>) -> Value {
        Value::Exception(Rc::new(Exception {
            ty: Ty::class(ty_name),
            message: message.into(),
        }))
    }

    pub fn array(elem: Ty, items: Vec<Value>) -> Value {
        Value::Array(Rc::new(Array::new(elem, items)))
    }

    /// A tuple value from a flat element list, nesting past the seventh
    /// element the way tuple types do.
    pub fn tuple(mut items: Vec<Value>) -> Value {
        if items.len() > TUPLE_REST_ARITY {
            let rest = items.split_off(TUPLE_REST_ARITY);
            items.push(Value::tuple(rest));
        }
        Value::Tuple(items.into())
    }

    /// The value to store into a new slot: structs and tuples are copied,
    /// everything else is shared.
    pub fn copied(&self) -> Value {
        match self {
            Value::Object(obj) if obj.is_struct() => Value::Object(Rc::new(obj.copy())),
            Value::Tuple(items) => Value::Tuple(items.iter().map(Value::copied).collect()),
            other => other.clone(),
        }
    }
}

// ── Inspection ───────────────────────────────────────────────────────

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Every element of a (possibly rest-nested) tuple, in order.
    pub fn tuple_elements(&self) -> Option<Vec<Value>> {
        let Value::Tuple(items) = self else {
            return None;
        };
        let mut out = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            match item {
                Value::Tuple(_) if i == TUPLE_REST_ARITY => out.extend(item.tuple_elements()?),
                _ => out.push(item.clone()),
            }
        }
        Some(out)
    }

    /// The dynamic type of the value, as handed to a binder.
    pub fn runtime_ty(&self) -> Ty {
        match self {
            Value::Null => Ty::Object,
            Value::Unit => Ty::Void,
            Value::Bool(_) => Ty::Bool,
            Value::Int(_) => Ty::Int,
            Value::Float(_) => Ty::Float,
            Value::Str(_) => Ty::String,
            Value::Object(obj) => obj.ty.clone(),
            Value::Array(arr) => Ty::array(arr.elem.clone()),
            Value::Tuple(items) => Ty::Tuple(items.iter().map(Value::runtime_ty).collect()),
            Value::Index(_) => Ty::Index,
            Value::Range(..) => Ty::Range,
            Value::Closure(c) => c.lambda.ty(),
            Value::Formattable(_) => Ty::Formattable,
            Value::Exception(e) => e.ty.clone(),
        }
    }

    /// Whether a non-null value passes a type test for `ty` (a catch
    /// clause, a reference cast). Interfaces are not tracked at run time;
    /// every object passes an interface test.
    pub fn is_instance_of(&self, ty: &Ty) -> bool {
        match ty {
            Ty::Object => !self.is_null(),
            Ty::Interface(_) => matches!(self, Value::Object(_) | Value::Exception(_)),
            Ty::Nullable(inner) => self.is_null() || self.is_instance_of(inner),
            other => !self.is_null() && other.accepts(&self.runtime_ty()),
        }
    }

    /// `==` as the evaluator implements it: numbers, strings, indices and
    /// tuples by value, structs field by field, everything else by
    /// reference.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) | (Value::Unit, Value::Unit) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => (*a as f64) == *b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Index(a), Value::Index(b)) => a == b,
            (Value::Range(a1, a2), Value::Range(b1, b2)) => a1 == b1 && a2 == b2,
            (Value::Tuple(a), Value::Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.equals(y))
            }
            (Value::Object(a), Value::Object(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                if !a.is_struct() || a.ty != b.ty {
                    return false;
                }
                let (fa, fb) = (a.fields.borrow(), b.fields.borrow());
                fa.len() == fb.len()
                    && fa.iter().all(|(k, v)| fb.get(k).is_some_and(|w| v.equals(w)))
            }
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            (Value::Formattable(a), Value::Formattable(b)) => Rc::ptr_eq(a, b),
            (Value::Exception(a), Value::Exception(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Unit => write!(f, "()"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Object(obj) => write!(f, "{} {:?}", obj.ty, obj.fields.borrow()),
            Value::Array(arr) => write!(f, "{:?}", arr.items.borrow()),
            Value::Closure(c) => write!(f, "{c:?}"),
            Value::Exception(e) => write!(f, "{}: {}", e.ty, e.message),
            other => write!(f, "{other}"),
        }
    }
}

/// The `ToString` rendering.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null | Value::Unit => Ok(()),
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => f.write_str(s),
            Value::Object(obj) => write!(f, "{}", obj.ty),
            Value::Array(arr) => write!(f, "{}[]", arr.elem),
            Value::Tuple(_) => {
                let items = self.tuple_elements().unwrap_or_default();
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
            Value::Index(ix) => write_index(f, *ix),
            Value::Range(start, end) => {
                write_index(f, *start)?;
                write!(f, "..")?;
                write_index(f, *end)
            }
            Value::Closure(c) => write!(f, "{}", c.lambda.ty()),
            Value::Formattable(fm) => match crate::intrinsics::render_composite(&fm.format, &fm.args) {
                Ok(text) => f.write_str(&text),
                Err(_) => f.write_str(&fm.format),
            },
            Value::Exception(e) => write!(f, "{}: {}", e.ty, e.message),
        }
    }
}

fn write_index(f: &mut fmt::Formatter<'_>, ix: IndexValue) -> fmt::Result {
    if ix.from_end {
        write!(f, "^{}", ix.value)
    } else {
        write!(f, "{}", ix.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn struct_copies_are_independent() {
        let point = Value::default_of(&Ty::struct_ty("Point"));
        let copy = point.copied();
        if let Value::Object(obj) = &point {
            obj.set("X", Value::Int(3));
        }
        let Value::Object(copied) = &copy else {
            panic!("expected an object");
        };
        assert_eq!(copied.get("X"), None);
    }

    #[test]
    fn class_values_are_shared() {
        let obj = Value::Object(Rc::new(Object::new(Ty::class("Node"))));
        let alias = obj.copied();
        assert_eq!(obj, alias);
    }

    #[test]
    fn long_tuples_nest_and_flatten() {
        let t = Value::tuple((1..=9).map(Value::Int).collect());
        let Value::Tuple(level) = &t else {
            panic!("expected a tuple");
        };
        assert_eq!(level.len(), 8);
        assert_eq!(t.to_string(), "(1, 2, 3, 4, 5, 6, 7, 8, 9)");
    }

    #[test]
    fn display_forms() {
        assert_eq!(Value::Bool(true).to_string(), "True");
        assert_eq!(Value::Float(2.5).to_string(), "2.5");
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(
            Value::Range(IndexValue::start(1), IndexValue::end(2)).to_string(),
            "1..^2"
        );
    }

    #[test]
    fn instance_tests() {
        let e = Value::exception(exceptions::DIVIDE_BY_ZERO, "x / 0");
        assert!(e.is_instance_of(&Ty::Object));
        assert!(e.is_instance_of(&Ty::class(exceptions::DIVIDE_BY_ZERO)));
        assert!(!e.is_instance_of(&Ty::class(exceptions::NULL_REFERENCE)));
        assert!(!Value::Null.is_instance_of(&Ty::String));
        assert!(Value::Int(1).is_instance_of(&Ty::nullable(Ty::Int)));
    }
}
