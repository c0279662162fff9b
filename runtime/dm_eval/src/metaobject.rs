//! Metaobjects: per-type operator overrides.
//!
//! A metaobject supplies the binary-operator hooks for one type subtree.
//! The runtime keeps them in a table keyed by type path rather than as
//! virtual dispatch through the value model, so `Value` stays free of
//! hidden polymorphism. Lookup walks the receiver's inheritance chain and
//! takes the nearest registration.

use crate::errors::{invalid_operation, RunResult};
use crate::list::ListInstance;
use crate::object::ObjectRef;
use crate::runtime::Runtime;
use crate::value::Value;

/// Operator overrides for one type subtree. Every hook defaults to the
/// same failure a type without a metaobject produces.
pub trait Metaobject {
    fn add(&self, _runtime: &Runtime, lhs: &Value, rhs: &Value) -> RunResult<Value> {
        Err(invalid_operation("+", lhs, rhs))
    }

    fn subtract(&self, _runtime: &Runtime, lhs: &Value, rhs: &Value) -> RunResult<Value> {
        Err(invalid_operation("-", lhs, rhs))
    }

    fn append(&self, _runtime: &Runtime, lhs: &Value, rhs: &Value) -> RunResult<Value> {
        Err(invalid_operation("+=", lhs, rhs))
    }

    fn remove(&self, _runtime: &Runtime, lhs: &Value, rhs: &Value) -> RunResult<Value> {
        Err(invalid_operation("-=", lhs, rhs))
    }

    fn combine(&self, _runtime: &Runtime, lhs: &Value, rhs: &Value) -> RunResult<Value> {
        Err(invalid_operation("|=", lhs, rhs))
    }

    fn output(&self, _runtime: &Runtime, lhs: &Value, rhs: &Value) -> RunResult<Value> {
        Err(invalid_operation("<<", lhs, rhs))
    }

    /// Observation hook run when an instance of the type is deleted.
    fn on_deleted(&self, _runtime: &Runtime, _object: &ObjectRef) {}
}

/// The `/list` metaobject: arithmetic copies, compound forms mutate.
pub struct ListMetaobject;

impl ListMetaobject {
    /// The receiver's list payload, or the standard failure.
    fn payload(op: &'static str, lhs: &Value, rhs: &Value) -> RunResult<ObjectRef> {
        match lhs.as_object() {
            Some(object) if object.borrow().list().is_some() => Ok(object.clone()),
            _ => Err(invalid_operation(op, lhs, rhs)),
        }
    }

    /// Snapshot of the right-hand side's payload when it is a list.
    ///
    /// Taken before any mutation so `L += L` cannot alias a live borrow.
    fn rhs_snapshot(rhs: &Value) -> Option<ListInstance> {
        let object = rhs.as_object()?;
        let instance = object.borrow();
        instance.list().map(|list| list.copy(1, 0))
    }
}

impl Metaobject for ListMetaobject {
    /// `L + x`: independent copy with `x` (or `x`'s elements) appended.
    fn add(&self, runtime: &Runtime, lhs: &Value, rhs: &Value) -> RunResult<Value> {
        let object = Self::payload("+", lhs, rhs)?;
        let rhs_list = Self::rhs_snapshot(rhs);
        let mut copy = object
            .borrow()
            .list()
            .map(|list| list.copy(1, 0))
            .unwrap_or_default();
        match rhs_list {
            Some(list) => copy.extend_from(&list),
            None => copy.add(rhs.clone()),
        }
        runtime.list_value(copy)
    }

    /// `L - x`: independent copy with first occurrences removed.
    fn subtract(&self, runtime: &Runtime, lhs: &Value, rhs: &Value) -> RunResult<Value> {
        let object = Self::payload("-", lhs, rhs)?;
        let rhs_list = Self::rhs_snapshot(rhs);
        let mut copy = object
            .borrow()
            .list()
            .map(|list| list.copy(1, 0))
            .unwrap_or_default();
        match rhs_list {
            Some(list) => {
                for value in list.values() {
                    copy.remove(value);
                }
            }
            None => {
                copy.remove(rhs);
            }
        }
        runtime.list_value(copy)
    }

    /// `L += x`: append in place.
    fn append(&self, _runtime: &Runtime, lhs: &Value, rhs: &Value) -> RunResult<Value> {
        let object = Self::payload("+=", lhs, rhs)?;
        let rhs_list = Self::rhs_snapshot(rhs);
        let mut instance = object.borrow_mut();
        let list = instance
            .list_mut()
            .unwrap_or_else(|| unreachable!("payload checked above"));
        match rhs_list {
            Some(other) => list.extend_from(&other),
            None => list.add(rhs.clone()),
        }
        drop(instance);
        Ok(lhs.clone())
    }

    /// `L -= x`: remove first occurrences in place.
    fn remove(&self, _runtime: &Runtime, lhs: &Value, rhs: &Value) -> RunResult<Value> {
        let object = Self::payload("-=", lhs, rhs)?;
        let rhs_list = Self::rhs_snapshot(rhs);
        let mut instance = object.borrow_mut();
        let list = instance
            .list_mut()
            .unwrap_or_else(|| unreachable!("payload checked above"));
        match rhs_list {
            Some(other) => {
                for value in other.values() {
                    list.remove(value);
                }
            }
            None => {
                list.remove(rhs);
            }
        }
        drop(instance);
        Ok(lhs.clone())
    }

    /// `L |= x`: set-union into the positional sequence.
    fn combine(&self, _runtime: &Runtime, lhs: &Value, rhs: &Value) -> RunResult<Value> {
        let object = Self::payload("|=", lhs, rhs)?;
        let rhs_list = Self::rhs_snapshot(rhs);
        let mut instance = object.borrow_mut();
        let list = instance
            .list_mut()
            .unwrap_or_else(|| unreachable!("payload checked above"));
        match rhs_list {
            Some(other) => list.combine_from(&other),
            None => {
                if !list.contains(rhs) {
                    list.add(rhs.clone());
                }
            }
        }
        drop(instance);
        Ok(lhs.clone())
    }

    /// `L << x`: append.
    fn output(&self, _runtime: &Runtime, lhs: &Value, rhs: &Value) -> RunResult<Value> {
        let object = Self::payload("<<", lhs, rhs)?;
        let mut instance = object.borrow_mut();
        let list = instance
            .list_mut()
            .unwrap_or_else(|| unreachable!("payload checked above"));
        list.add(rhs.clone());
        drop(instance);
        Ok(lhs.clone())
    }
}
