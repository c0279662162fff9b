//! Runtime values.
//!
//! The tagged union every opcode manipulates. Primitives live inline;
//! strings and resources are immutable [`Heap`] payloads; objects are
//! shared mutable handles. Construction goes through the factory methods
//! so heap wrapping stays in one place.
//!
//! Equality is type-first: the numeric variants coerce to each other,
//! object comparisons are identity, and anything mixing an object with a
//! number or string is simply unequal (not an error). A deleted object
//! handle is value-null: it equals `Null` and is falsy.

use std::sync::Arc;

use dm_ir::{Constant, TypePath};
use dm_objtree::ProcRef;

use crate::heap::{Heap, Mutable};
use crate::object::ObjectRef;

/// A runtime value.
#[derive(Clone)]
pub enum Value {
    Null,
    Integer(i32),
    Double(f64),
    String(Heap<String>),
    Path(TypePath),
    Object(ObjectRef),
    Resource(Heap<String>),
    Proc(ProcRef),
}

impl Value {
    #[inline]
    pub fn integer(n: i32) -> Self {
        Value::Integer(n)
    }

    #[inline]
    pub fn double(d: f64) -> Self {
        Value::Double(d)
    }

    #[inline]
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(Heap::new(s.into()))
    }

    #[inline]
    pub fn path(p: TypePath) -> Self {
        Value::Path(p)
    }

    #[inline]
    pub fn resource(path: impl Into<String>) -> Self {
        Value::Resource(Heap::new(path.into()))
    }

    #[inline]
    pub fn object(object: ObjectRef) -> Self {
        Value::Object(object)
    }

    #[inline]
    pub fn from_proc(proc: ProcRef) -> Self {
        Value::Proc(proc)
    }

    /// Widen a compile-time constant into a runtime value.
    pub fn from_constant(constant: &Constant) -> Self {
        match constant {
            Constant::Null => Value::Null,
            Constant::Integer(n) => Value::Integer(*n),
            Constant::Double(d) => Value::Double(*d),
            Constant::String(s) => Value::string(s.clone()),
            Constant::Path(p) => Value::Path(p.clone()),
        }
    }

    /// Name of the value's type, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Integer(_) => "integer",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::Path(_) => "path",
            Value::Object(_) => "object",
            Value::Resource(_) => "resource",
            Value::Proc(_) => "proc",
        }
    }

    /// Truthiness: null, integer zero, the empty string, and deleted
    /// object handles are false; every other value is true.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Integer(n) => *n != 0,
            Value::String(s) => !s.is_empty(),
            Value::Object(o) => !o.borrow().is_deleted(),
            Value::Double(_) | Value::Path(_) | Value::Resource(_) | Value::Proc(_) => true,
        }
    }

    /// Whether the value is null or a deleted object handle.
    pub fn is_null_like(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Object(o) => o.borrow().is_deleted(),
            _ => false,
        }
    }

    /// Numeric view, when the value is numeric.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(f64::from(*n)),
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    /// Integral view, truncating doubles.
    pub fn as_integer(&self) -> Option<i32> {
        match self {
            Value::Integer(n) => Some(*n),
            Value::Double(d) => Some(*d as i32),
            _ => None,
        }
    }

    /// The live object behind the value, unless null or deleted.
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) if !o.borrow().is_deleted() => Some(o),
            _ => None,
        }
    }

    /// Type-first equality with numeric coercion.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Null, Value::Object(o)) | (Value::Object(o), Value::Null) => {
                o.borrow().is_deleted()
            }
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Integer(a), Value::Double(b)) | (Value::Double(b), Value::Integer(a)) => {
                f64::from(*a) == *b
            }
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Path(a), Value::Path(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Mutable::ptr_eq(a, b),
            (Value::Resource(a), Value::Resource(b)) => a == b,
            (Value::Proc(a), Value::Proc(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Text form used by `join`, string coercion, and format templates.
    /// Null (and value-null) coerces to empty text.
    pub fn stringify(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Integer(n) => n.to_string(),
            Value::Double(d) => d.to_string(),
            Value::String(s) => (**s).clone(),
            Value::Path(p) => p.to_string(),
            Value::Object(o) => {
                let instance = o.borrow();
                if instance.is_deleted() {
                    return String::new();
                }
                // Atoms stringify by their `name` variable when set.
                match instance.get_field("name") {
                    Ok(Value::String(name)) if !name.is_empty() => (*name).clone(),
                    _ => instance.definition().path().to_string(),
                }
            }
            Value::Resource(r) => (**r).clone(),
            Value::Proc(p) => format!("{}/proc/{}", p.owner, p.name),
        }
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Integer(n) => write!(f, "{n}"),
            Value::Double(d) => write!(f, "{d}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Path(p) => write!(f, "{p}"),
            Value::Object(o) => {
                let instance = o.borrow();
                if instance.is_deleted() {
                    write!(f, "<deleted>")
                } else {
                    write!(f, "<{}>", instance.definition().path())
                }
            }
            Value::Resource(r) => write!(f, "'{r}'"),
            Value::Proc(p) => write!(f, "{}/proc/{}", p.owner, p.name),
        }
    }
}
