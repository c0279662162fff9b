//! Identifier handles.
//!
//! An [`Identifier`] is a writable reference pushed on the operand stack:
//! every writing opcode pops one, then a value, and assigns through it.
//! Handles are short-lived within one opcode dispatch; nothing stores
//! them across suspension points (there are none).
//!
//! `SelfProc` and `SuperProc` are bound to the running activation, so the
//! interpreter intercepts them before `get`/`assign`; reaching them here
//! (for instance as a materialized call argument) is an error.

use dm_objtree::{GlobalId, ProcRef};

use crate::environment::{Scope, ScopeRef};
use crate::errors::{
    null_dereference, type_mismatch, unknown_identifier, write_to_constant, RunResult,
};
use crate::object::ObjectRef;
use crate::runtime::Runtime;
use crate::value::Value;

/// Built-in pseudo-procs reachable by name (`initial(x)`, `issaved(x)`).
///
/// They take the *identifier* of their argument, not its value, so the
/// call opcode handles them before argument materialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinProc {
    Initial,
    IsSaved,
}

impl BuiltinProc {
    pub fn name(self) -> &'static str {
        match self {
            BuiltinProc::Initial => "initial",
            BuiltinProc::IsSaved => "issaved",
        }
    }
}

/// A writable reference on the operand stack.
#[derive(Debug, Clone)]
pub enum Identifier {
    /// A name resolved through the scope chain.
    Local { scope: ScopeRef, name: String },
    /// A field of a live object.
    Field { object: ObjectRef, name: String },
    /// A global slot.
    Global(GlobalId),
    /// One list slot, positional or associative.
    ListIndex { list: ObjectRef, key: Value },
    /// A proc bound to a receiver object.
    ObjectProc { object: ObjectRef, proc: ProcRef },
    /// The running proc itself; doubles as the default-return slot.
    SelfProc,
    /// The overridden proc one definition up.
    SuperProc,
    /// `initial` / `issaved`.
    Builtin(BuiltinProc),
}

impl Identifier {
    /// Short description for diagnostics.
    pub fn describe(&self) -> String {
        match self {
            Identifier::Local { name, .. } => format!("local {name}"),
            Identifier::Field { name, .. } => format!("field {name}"),
            Identifier::Global(id) => format!("global {id}"),
            Identifier::ListIndex { .. } => "list index".to_string(),
            Identifier::ObjectProc { proc, .. } => format!("proc {}", proc.name),
            Identifier::SelfProc => ".".to_string(),
            Identifier::SuperProc => "..".to_string(),
            Identifier::Builtin(builtin) => builtin.name().to_string(),
        }
    }

    /// Read the current value behind the handle.
    pub fn get(&self, runtime: &Runtime) -> RunResult<Value> {
        match self {
            Identifier::Local { scope, name } => Scope::resolve(scope, name, runtime),
            Identifier::Field { object, name } => {
                let instance = object.borrow();
                if instance.is_deleted() {
                    return Err(null_dereference(format!("field {name}")));
                }
                instance.get_field(name)
            }
            Identifier::Global(id) => runtime.global(*id),
            Identifier::ListIndex { list, key } => {
                let instance = list.borrow();
                if instance.is_deleted() {
                    return Err(null_dereference("list index"));
                }
                match instance.list() {
                    Some(payload) => payload.get(key),
                    None => Err(type_mismatch("list", &Value::Object(list.clone()))),
                }
            }
            Identifier::ObjectProc { proc, .. } => Ok(Value::Proc(proc.clone())),
            Identifier::SelfProc | Identifier::SuperProc | Identifier::Builtin(_) => {
                Err(unknown_identifier(self.describe()))
            }
        }
    }

    /// Write a value through the handle.
    pub fn assign(&self, value: Value, runtime: &Runtime) -> RunResult<()> {
        match self {
            Identifier::Local { scope, name } => Scope::assign(scope, name, value, runtime),
            Identifier::Field { object, name } => {
                if object.borrow().is_deleted() {
                    return Err(null_dereference(format!("field {name}")));
                }
                object.borrow_mut().set_field(name, value)
            }
            Identifier::Global(id) => runtime.set_global(*id, value),
            Identifier::ListIndex { list, key } => {
                if list.borrow().is_deleted() {
                    return Err(null_dereference("list index"));
                }
                let mut instance = list.borrow_mut();
                match instance.list_mut() {
                    Some(payload) => payload.set(key.clone(), value),
                    None => Err(type_mismatch("list", &Value::Object(list.clone()))),
                }
            }
            Identifier::ObjectProc { .. }
            | Identifier::SelfProc
            | Identifier::SuperProc
            | Identifier::Builtin(_) => Err(write_to_constant(self.describe())),
        }
    }
}
