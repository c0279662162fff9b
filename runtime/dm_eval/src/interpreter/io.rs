//! I/O bridge opcodes.
//!
//! `Browse`, `BrowseResource`, and `OutputControl` each pop the receiver,
//! then the payload, then the options/control operand. The receiver must
//! be a mob (its `client` is used) or a client; a null client is a clean
//! no-op, anything else is `InvalidRecipient`. The resolved connection
//! belongs to the host.

use tracing::debug;

use dm_objtree::builtin;

use crate::errors::{invalid_operation, invalid_recipient, RunResult};
use crate::object::ObjectRef;
use crate::value::Value;

use super::Interpreter;

impl Interpreter<'_> {
    /// The client object behind an I/O receiver, or `None` for a mob
    /// without one.
    fn client_of(&self, receiver: &Value) -> RunResult<Option<ObjectRef>> {
        let Some(object) = receiver.as_object() else {
            return Err(invalid_recipient(receiver));
        };
        let instance = object.borrow();
        let definition = instance.definition();
        if definition.is_subtype_of(&builtin::client()) {
            return Ok(Some(object.clone()));
        }
        if definition.is_subtype_of(&builtin::mob()) {
            if !instance.has_field("client") {
                return Ok(None);
            }
            return match instance.get_field("client")? {
                Value::Object(client) if !client.borrow().is_deleted() => Ok(Some(client)),
                _ => Ok(None),
            };
        }
        Err(invalid_recipient(receiver))
    }

    pub(super) fn op_browse(&mut self) -> RunResult<()> {
        let receiver = self.pop_value()?;
        let payload = self.pop_value()?;
        let options = self.pop_value()?;
        if let Some(client) = self.client_of(&receiver)? {
            if let Some(connection) = self.runtime.connections().get(&client) {
                debug!(proc = %self.proc.name, "browse");
                connection.browse(&payload.stringify(), &options.stringify());
            }
        }
        Ok(())
    }

    pub(super) fn op_browse_resource(&mut self) -> RunResult<()> {
        let receiver = self.pop_value()?;
        let resource = self.pop_value()?;
        let filename = self.pop_value()?;
        if let Some(client) = self.client_of(&receiver)? {
            if let Some(connection) = self.runtime.connections().get(&client) {
                debug!(proc = %self.proc.name, "browse_rsc");
                connection.browse_resource(&resource.stringify(), &filename.stringify());
            }
        }
        Ok(())
    }

    pub(super) fn op_output_control(&mut self) -> RunResult<()> {
        let receiver = self.pop_value()?;
        let message = self.pop_value()?;
        let control = self.pop_value()?;
        if let Some(client) = self.client_of(&receiver)? {
            if let Some(connection) = self.runtime.connections().get(&client) {
                connection.output_control(&message.stringify(), &control.stringify());
            }
        }
        Ok(())
    }

    /// The `<<` statement: mobs and clients receive text on their
    /// connection; other objects dispatch their metaobject's `Output`
    /// hook; null swallows silently.
    pub(super) fn op_output(&mut self) -> RunResult<()> {
        let receiver = self.pop_value()?;
        let payload = self.pop_value()?;
        if receiver.is_null_like() {
            return Ok(());
        }
        let Some(object) = receiver.as_object() else {
            return Err(invalid_operation("<<", &receiver, &payload));
        };
        let definition = object.borrow().definition().clone();
        if definition.is_subtype_of(&builtin::mob()) || definition.is_subtype_of(&builtin::client())
        {
            if let Some(client) = self.client_of(&receiver)? {
                if let Some(connection) = self.runtime.connections().get(&client) {
                    connection.output_control(&payload.stringify(), "");
                }
            }
            return Ok(());
        }
        if let Some(meta) = self.runtime.metaobject_for(&definition) {
            meta.output(self.runtime, &receiver, &payload)?;
            return Ok(());
        }
        Err(invalid_operation("<<", &receiver, &payload))
    }
}
