//! Live object instances.
//!
//! An instance pairs its immutable definition with a mutable field map.
//! `/list`-typed instances additionally carry the list payload. Deletion
//! marks the instance; a deleted handle behaves as value-null everywhere
//! truthiness and equality look at it.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use dm_objtree::ObjectDefinition;

use crate::errors::{unknown_field, write_to_constant, RunResult};
use crate::heap::Mutable;
use crate::list::ListInstance;
use crate::value::Value;

/// Shared handle to a live instance.
pub type ObjectRef = Mutable<ObjectInstance>;

/// A live object: definition pointer plus mutable field state.
#[derive(Debug)]
pub struct ObjectInstance {
    definition: Arc<ObjectDefinition>,
    fields: FxHashMap<String, Value>,
    list: Option<ListInstance>,
    deleted: bool,
}

impl ObjectInstance {
    pub(crate) fn new(
        definition: Arc<ObjectDefinition>,
        fields: FxHashMap<String, Value>,
        list: Option<ListInstance>,
    ) -> Self {
        ObjectInstance {
            definition,
            fields,
            list,
            deleted: false,
        }
    }

    #[inline]
    pub fn definition(&self) -> &Arc<ObjectDefinition> {
        &self.definition
    }

    #[inline]
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub(crate) fn mark_deleted(&mut self) {
        self.deleted = true;
        self.fields.clear();
        self.list = None;
    }

    /// Read a field. Falls back to the definition default for a declared
    /// variable that was never written (instances are seeded at creation,
    /// so this covers variables added by hosts after the fact).
    pub fn get_field(&self, name: &str) -> RunResult<Value> {
        if let Some(value) = self.fields.get(name) {
            return Ok(value.clone());
        }
        if let Some(variable) = self.definition.get_variable(name) {
            return Ok(Value::from_constant(&variable.default));
        }
        Err(unknown_field(self.definition.path().to_string(), name))
    }

    /// Write a field. The variable must be declared on the type and not
    /// `const`.
    pub fn set_field(&mut self, name: &str, value: Value) -> RunResult<()> {
        let variable = self
            .definition
            .get_variable(name)
            .ok_or_else(|| unknown_field(self.definition.path().to_string(), name))?;
        if variable.is_const() {
            return Err(write_to_constant(name));
        }
        self.fields.insert(name.to_string(), value);
        Ok(())
    }

    /// Whether the type declares or inherits `name`.
    #[inline]
    pub fn has_field(&self, name: &str) -> bool {
        self.definition.has_variable(name)
    }

    /// The list payload, for `/list`-typed instances.
    #[inline]
    pub fn list(&self) -> Option<&ListInstance> {
        self.list.as_ref()
    }

    #[inline]
    pub fn list_mut(&mut self) -> Option<&mut ListInstance> {
        self.list.as_mut()
    }
}
