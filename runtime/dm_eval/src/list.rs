//! The list container.
//!
//! An ordered sequence of values plus an associative map. Positional keys
//! are 1-indexed integers; associative keys are strings, paths, objects,
//! or resources. Range arguments follow the convention `end = 0` means
//! "through the last element", and all range bounds are inclusive.
//!
//! Two event hooks, installed at construction, observe mutation:
//! `on_assigned(key, value)` after a write, `before_removed(key, value)`
//! before a removal. The `args` list uses them to write through to the
//! proc's scope.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::errors::{RunResult, RuntimeError, RuntimeErrorKind};
use crate::value::Value;

/// An associative key: string, path, object, or resource.
///
/// Wraps a [`Value`] with the hashing and equality the map needs; the
/// constructor rejects every other variant.
#[derive(Clone)]
pub struct ListKey(Value);

impl ListKey {
    /// Validate `value` as an associative key.
    pub fn new(value: Value) -> Result<Self, RuntimeError> {
        match value {
            Value::String(_) | Value::Path(_) | Value::Object(_) | Value::Resource(_) => {
                Ok(ListKey(value))
            }
            other => Err(RuntimeError::new(RuntimeErrorKind::TypeMismatch {
                expected: "string, path, object, or resource list key",
                found: other.type_name().to_string(),
            })),
        }
    }

    #[inline]
    pub fn value(&self) -> &Value {
        &self.0
    }
}

impl PartialEq for ListKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.equals(&other.0)
    }
}

impl Eq for ListKey {}

impl Hash for ListKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match &self.0 {
            Value::String(s) => {
                0u8.hash(state);
                s.hash(state);
            }
            Value::Path(p) => {
                1u8.hash(state);
                p.hash(state);
            }
            Value::Object(o) => {
                2u8.hash(state);
                o.address().hash(state);
            }
            Value::Resource(r) => {
                3u8.hash(state);
                r.hash(state);
            }
            // ListKey::new admits no other variant.
            _ => unreachable!("non-key value inside ListKey"),
        }
    }
}

impl fmt::Debug for ListKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

type HookFn = Rc<dyn Fn(&Value, &Value)>;

/// Mutation observers installed at construction.
#[derive(Clone, Default)]
pub struct ListHooks {
    pub on_assigned: Option<HookFn>,
    pub before_removed: Option<HookFn>,
}

impl ListHooks {
    fn fire_assigned(&self, key: &Value, value: &Value) {
        if let Some(hook) = &self.on_assigned {
            hook(key, value);
        }
    }

    fn fire_removed(&self, key: &Value, value: &Value) {
        if let Some(hook) = &self.before_removed {
            hook(key, value);
        }
    }
}

/// The ordered + associative hybrid container.
#[derive(Clone, Default)]
pub struct ListInstance {
    values: Vec<Value>,
    associations: FxHashMap<ListKey, Value>,
    hooks: ListHooks,
}

impl ListInstance {
    pub fn new() -> Self {
        ListInstance::default()
    }

    pub fn with_hooks(hooks: ListHooks) -> Self {
        ListInstance {
            values: Vec::new(),
            associations: FxHashMap::default(),
            hooks,
        }
    }

    pub fn from_values(values: Vec<Value>) -> Self {
        ListInstance {
            values,
            associations: FxHashMap::default(),
            hooks: ListHooks::default(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Positional sequence, in order.
    #[inline]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Associative value stored under `key`, if the key type is valid and
    /// an entry exists.
    pub fn association(&self, key: &Value) -> Option<Value> {
        let key = ListKey::new(key.clone()).ok()?;
        self.associations.get(&key).cloned()
    }

    /// Resolve `end = 0 → len`, clamp to the sequence, and return the
    /// inclusive 1-indexed range as 0-indexed `start..=end` bounds.
    fn resolve_range(&self, start: usize, end: usize) -> Option<(usize, usize)> {
        let len = self.values.len();
        let end = if end == 0 { len } else { end.min(len) };
        let start = start.max(1);
        if start > end {
            return None;
        }
        Some((start - 1, end - 1))
    }

    /// Read by key: integer keys are 1-indexed positional, associative
    /// keys fall back to null when absent.
    pub fn get(&self, key: &Value) -> RunResult<Value> {
        if let Value::Integer(i) = key {
            let index = usize::try_from(*i).ok().filter(|&i| i >= 1);
            return match index.and_then(|i| self.values.get(i - 1)) {
                Some(value) => Ok(value.clone()),
                None => Err(RuntimeError::new(RuntimeErrorKind::TypeMismatch {
                    expected: "list index between 1 and the list length",
                    found: format!("integer {i}"),
                })),
            };
        }
        let key = ListKey::new(key.clone())?;
        Ok(self.associations.get(&key).cloned().unwrap_or(Value::Null))
    }

    /// Write by key. An integer key mutates the positional slot; an
    /// associative key also enters the positional sequence if absent.
    pub fn set(&mut self, key: Value, value: Value) -> RunResult<()> {
        if let Value::Integer(i) = key {
            let index = usize::try_from(i)
                .ok()
                .filter(|&i| i >= 1 && i <= self.values.len())
                .ok_or_else(|| {
                    RuntimeError::new(RuntimeErrorKind::TypeMismatch {
                        expected: "list index between 1 and the list length",
                        found: format!("integer {i}"),
                    })
                })?;
            self.values[index - 1] = value.clone();
            self.hooks.fire_assigned(&key, &value);
            return Ok(());
        }
        let list_key = ListKey::new(key.clone())?;
        if !self.values.iter().any(|v| v.equals(&key)) {
            self.values.push(key.clone());
        }
        self.associations.insert(list_key, value.clone());
        self.hooks.fire_assigned(&key, &value);
        Ok(())
    }

    /// Append to the positional sequence.
    pub fn add(&mut self, value: Value) {
        self.values.push(value.clone());
        let key = Value::integer(self.values.len() as i32);
        self.hooks.fire_assigned(&key, &value);
    }

    /// Whether the positional sequence contains an equal value.
    pub fn contains(&self, value: &Value) -> bool {
        self.values.iter().any(|v| v.equals(value))
    }

    /// Remove the first positional occurrence of `value`. Returns whether
    /// anything was removed. The association under `value`, if any, is
    /// dropped with it.
    pub fn remove(&mut self, value: &Value) -> bool {
        let Some(position) = self.values.iter().position(|v| v.equals(value)) else {
            return false;
        };
        let key = Value::integer((position + 1) as i32);
        self.hooks.fire_removed(&key, &self.values[position].clone());
        self.values.remove(position);
        if let Ok(list_key) = ListKey::new(value.clone()) {
            self.associations.remove(&list_key);
        }
        true
    }

    /// Remove the inclusive positional range, in reverse order.
    pub fn cut(&mut self, start: usize, end: usize) {
        let Some((start, end)) = self.resolve_range(start, end) else {
            return;
        };
        for index in (start..=end).rev() {
            let key = Value::integer((index + 1) as i32);
            self.hooks.fire_removed(&key, &self.values[index].clone());
            self.values.remove(index);
        }
    }

    /// Independent clone of the positional slice plus the full
    /// associative map. Hooks do not travel with the copy.
    pub fn copy(&self, start: usize, end: usize) -> ListInstance {
        let values = match self.resolve_range(start, end) {
            Some((start, end)) => self.values[start..=end].to_vec(),
            None => Vec::new(),
        };
        ListInstance {
            values,
            associations: self.associations.clone(),
            hooks: ListHooks::default(),
        }
    }

    /// 1-indexed position of the first occurrence within the inclusive
    /// range; 0 when absent.
    pub fn find(&self, value: &Value, start: usize, end: usize) -> usize {
        let Some((start, end)) = self.resolve_range(start, end) else {
            return 0;
        };
        for index in start..=end {
            if self.values[index].equals(value) {
                return index + 1;
            }
        }
        0
    }

    /// Concatenate the stringified elements of the inclusive range.
    pub fn join(&self, glue: &str, start: usize, end: usize) -> String {
        let Some((start, end)) = self.resolve_range(start, end) else {
            return String::new();
        };
        let mut out = String::new();
        for index in start..=end {
            if index > start {
                out.push_str(glue);
            }
            out.push_str(&self.values[index].stringify());
        }
        out
    }

    /// Merge another list's entries: positional values absent from `self`
    /// are appended, and every association is carried over.
    pub fn combine_from(&mut self, other: &ListInstance) {
        for value in other.values() {
            if !self.contains(value) {
                self.add(value.clone());
            }
        }
        for (key, value) in &other.associations {
            self.associations.insert(key.clone(), value.clone());
        }
    }

    /// Append another list's positional values and carry its associations.
    pub fn extend_from(&mut self, other: &ListInstance) {
        for value in other.values() {
            self.add(value.clone());
        }
        for (key, value) in &other.associations {
            self.associations.insert(key.clone(), value.clone());
        }
    }

    /// Associative entries, in arbitrary order.
    pub fn associations(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.associations.iter().map(|(k, v)| (k.value(), v))
    }
}

impl fmt::Debug for ListInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListInstance")
            .field("values", &self.values)
            .field("associations", &self.associations)
            .finish_non_exhaustive()
    }
}
