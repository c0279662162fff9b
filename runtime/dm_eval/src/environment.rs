//! Lexical scopes.
//!
//! Scopes form a singly-linked chain; each holds its local bindings and a
//! back-reference to the owning object (`src`). Name resolution walks the
//! local chain, then the owner's fields, then globals declared on the
//! owner's type. Scopes never own objects: `src` is just another shared
//! handle, dropped with the scope.

use rustc_hash::FxHashMap;

use crate::errors::{unknown_identifier, RunResult};
use crate::heap::Mutable;
use crate::object::ObjectRef;
use crate::runtime::Runtime;
use crate::value::Value;

/// Shared handle to one scope in the chain.
pub type ScopeRef = Mutable<Scope>;

/// One link of the scope chain.
#[derive(Debug)]
pub struct Scope {
    src: Option<ObjectRef>,
    locals: FxHashMap<String, Value>,
    parent: Option<ScopeRef>,
}

impl Scope {
    /// The root scope of a proc activation.
    pub fn root(src: Option<ObjectRef>) -> ScopeRef {
        Mutable::new(Scope {
            src,
            locals: FxHashMap::default(),
            parent: None,
        })
    }

    /// A child scope sharing the parent's `src`.
    pub fn child_of(parent: &ScopeRef) -> ScopeRef {
        let src = parent.borrow().src.clone();
        Mutable::new(Scope {
            src,
            locals: FxHashMap::default(),
            parent: Some(parent.clone()),
        })
    }

    #[inline]
    pub fn src(&self) -> Option<&ObjectRef> {
        self.src.as_ref()
    }

    #[inline]
    pub fn parent(&self) -> Option<&ScopeRef> {
        self.parent.as_ref()
    }

    /// Bind a local in this scope, shadowing any outer binding.
    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        self.locals.insert(name.into(), value);
    }

    /// Whether the chain already binds `name` as a local.
    pub fn has_local(&self, name: &str) -> bool {
        if self.locals.contains_key(name) {
            return true;
        }
        self.parent
            .as_ref()
            .is_some_and(|parent| parent.borrow().has_local(name))
    }

    fn lookup_local(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.locals.get(name) {
            return Some(value.clone());
        }
        self.parent
            .as_ref()
            .and_then(|parent| parent.borrow().lookup_local(name))
    }

    fn assign_local(&mut self, name: &str, value: &Value) -> bool {
        if let Some(slot) = self.locals.get_mut(name) {
            *slot = value.clone();
            return true;
        }
        match &self.parent {
            Some(parent) => parent.borrow_mut().assign_local(name, value),
            None => false,
        }
    }

    /// Resolve a name: local chain, then `src` fields, then globals
    /// declared on `src`'s type. Unknown names fail.
    pub fn resolve(scope: &ScopeRef, name: &str, runtime: &Runtime) -> RunResult<Value> {
        if let Some(value) = scope.borrow().lookup_local(name) {
            return Ok(value);
        }
        let src = scope.borrow().src.clone();
        if let Some(src) = src {
            let instance = src.borrow();
            if !instance.is_deleted() {
                if instance.has_field(name) {
                    return instance.get_field(name);
                }
                if let Some(id) = instance.definition().get_global_id(name) {
                    return runtime.global(id);
                }
            }
        }
        Err(unknown_identifier(name))
    }

    /// Assign a name: the nearest local that already defines it, else the
    /// owner's field, else the owner's global, else a fresh local in the
    /// topmost scope.
    pub fn assign(scope: &ScopeRef, name: &str, value: Value, runtime: &Runtime) -> RunResult<()> {
        if scope.borrow_mut().assign_local(name, &value) {
            return Ok(());
        }
        let src = scope.borrow().src.clone();
        if let Some(src) = src {
            let has_field = {
                let instance = src.borrow();
                !instance.is_deleted() && instance.has_field(name)
            };
            if has_field {
                return src.borrow_mut().set_field(name, value);
            }
            let global = src.borrow().definition().get_global_id(name);
            if let Some(id) = global {
                return runtime.set_global(id, value);
            }
        }
        scope.borrow_mut().define(name, value);
        Ok(())
    }
}

#[cfg(test)]
mod tests;
