//! List opcodes and iteration.
//!
//! Enumerators snapshot the source at `CreateListEnumerator`; mutations
//! during iteration are invisible to the loop.

use crate::errors::{null_dereference, type_mismatch, RunResult};
use crate::object::ObjectRef;
use crate::value::Value;

use super::{Interpreter, ListEnumerator};

impl Interpreter<'_> {
    /// The receiver as a list object, for indexing and append opcodes.
    fn expect_list(&self, value: &Value) -> RunResult<ObjectRef> {
        if value.is_null_like() {
            return Err(null_dereference("list operation"));
        }
        match value.as_object() {
            Some(object) if object.borrow().list().is_some() => Ok(object.clone()),
            _ => Err(type_mismatch("list", value)),
        }
    }

    /// An atom's (or the world's) `contents` list, when it has one.
    fn contents_list(&self, object: &ObjectRef) -> Option<ObjectRef> {
        let instance = object.borrow();
        if !instance.has_field("contents") {
            return None;
        }
        match instance.get_field("contents").ok()? {
            Value::Object(contents) if contents.borrow().list().is_some() => Some(contents),
            _ => None,
        }
    }

    pub(super) fn op_list_append(&mut self) -> RunResult<()> {
        let value = self.pop_value()?;
        let list_value = self.pop_value()?;
        let object = self.expect_list(&list_value)?;
        object
            .borrow_mut()
            .list_mut()
            .unwrap_or_else(|| unreachable!("expect_list checked the payload"))
            .add(value);
        // The list stays on the stack for the next append.
        self.push_value(list_value);
        Ok(())
    }

    pub(super) fn op_list_append_associated(&mut self) -> RunResult<()> {
        let value = self.pop_value()?;
        let key = self.pop_value()?;
        let list_value = self.pop_value()?;
        let object = self.expect_list(&list_value)?;
        object
            .borrow_mut()
            .list_mut()
            .unwrap_or_else(|| unreachable!("expect_list checked the payload"))
            .set(key, value)?;
        self.push_value(list_value);
        Ok(())
    }

    pub(super) fn op_index_list(&mut self) -> RunResult<()> {
        let key = self.pop_value()?;
        let list_value = self.pop_value()?;
        let object = self.expect_list(&list_value)?;
        self.push_ident(crate::identifier::Identifier::ListIndex { list: object, key });
        Ok(())
    }

    pub(super) fn op_is_in_list(&mut self) -> RunResult<()> {
        let container = self.pop_value()?;
        let needle = self.pop_value()?;
        let found = match &container {
            value if value.is_null_like() => false,
            Value::Object(object) => {
                let has_payload = object.borrow().list().is_some();
                if has_payload {
                    object
                        .borrow()
                        .list()
                        .unwrap_or_else(|| unreachable!("payload checked above"))
                        .contains(&needle)
                } else if let Some(contents) = self.contents_list(object) {
                    contents
                        .borrow()
                        .list()
                        .unwrap_or_else(|| unreachable!("contents_list checked the payload"))
                        .contains(&needle)
                } else {
                    return Err(type_mismatch("list or container", &container));
                }
            }
            other => return Err(type_mismatch("list or container", other)),
        };
        self.push_value(Value::Integer(i32::from(found)));
        Ok(())
    }

    pub(super) fn op_create_enumerator(&mut self) -> RunResult<()> {
        let source = self.pop_value()?;
        let values = match &source {
            value if value.is_null_like() => Vec::new(),
            Value::Object(object) => {
                let payload_values = {
                    let instance = object.borrow();
                    instance.list().map(|list| list.values().to_vec())
                };
                match payload_values {
                    Some(values) => values,
                    None => match self.contents_list(object) {
                        Some(contents) => {
                            let instance = contents.borrow();
                            instance
                                .list()
                                .map(|list| list.values().to_vec())
                                .unwrap_or_default()
                        }
                        None => return Err(type_mismatch("list or container", &source)),
                    },
                }
            }
            other => return Err(type_mismatch("list or container", other)),
        };
        self.enumerators.push(ListEnumerator { values, pos: 0 });
        Ok(())
    }

    /// Advance the innermost enumerator: bind the next value to `name`
    /// and push whether there was one.
    pub(super) fn op_enumerate(&mut self, name: &str) -> RunResult<()> {
        let enumerator = self
            .enumerators
            .last_mut()
            .ok_or(crate::errors::RuntimeErrorKind::EnumeratorUnderflow)
            .map_err(crate::errors::RuntimeError::new)?;
        match enumerator.values.get(enumerator.pos).cloned() {
            Some(value) => {
                enumerator.pos += 1;
                crate::environment::Scope::assign(&self.scope, name, value, self.runtime)?;
                self.push_value(Value::Integer(1));
            }
            None => self.push_value(Value::Integer(0)),
        }
        Ok(())
    }
}
