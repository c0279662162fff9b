//! Argument tuples.
//!
//! Arguments arrive at the VM as positional + named slots, each either an
//! already-evaluated value or an identifier. Identifiers stay cold until
//! invocation so `initial(x)` and `issaved(x)` can see the handle itself;
//! everything else materializes them on entry.

use smallvec::SmallVec;

use crate::errors::RunResult;
use crate::identifier::Identifier;
use crate::list::ListInstance;
use crate::runtime::Runtime;
use crate::value::Value;

/// One argument slot: a value, or an identifier not yet read.
#[derive(Debug, Clone)]
pub enum ArgSlot {
    Value(Value),
    Ident(Identifier),
}

impl ArgSlot {
    /// Resolve the slot to its current value.
    pub fn materialize(&self, runtime: &Runtime) -> RunResult<Value> {
        match self {
            ArgSlot::Value(value) => Ok(value.clone()),
            ArgSlot::Ident(ident) => ident.get(runtime),
        }
    }

    /// The identifier inside the slot, if it is one.
    pub fn as_ident(&self) -> Option<&Identifier> {
        match self {
            ArgSlot::Ident(ident) => Some(ident),
            ArgSlot::Value(_) => None,
        }
    }
}

/// An argument tuple as popped off the operand stack.
#[derive(Debug, Clone, Default)]
pub struct ProcArguments {
    pub positional: SmallVec<[ArgSlot; 4]>,
    pub named: Vec<(String, ArgSlot)>,
}

impl ProcArguments {
    pub fn empty() -> Self {
        ProcArguments::default()
    }

    pub fn from_values(values: impl IntoIterator<Item = Value>) -> Self {
        ProcArguments {
            positional: values.into_iter().map(ArgSlot::Value).collect(),
            named: Vec::new(),
        }
    }

    pub fn push(&mut self, slot: ArgSlot) {
        self.positional.push(slot);
    }

    pub fn push_named(&mut self, name: impl Into<String>, slot: ArgSlot) {
        self.named.push((name.into(), slot));
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }

    /// Flatten a list into a tuple: a positional string entry with an
    /// association becomes a named argument; every other positional entry
    /// stays positional, in order.
    pub fn from_list(list: &ListInstance) -> Self {
        let mut args = ProcArguments::empty();
        for value in list.values() {
            if let Value::String(name) = value {
                if let Some(named_value) = list.association(value) {
                    args.push_named((**name).clone(), ArgSlot::Value(named_value));
                    continue;
                }
            }
            args.push(ArgSlot::Value(value.clone()));
        }
        args
    }

    /// Resolve every slot to its current value.
    pub fn materialize(&self, runtime: &Runtime) -> RunResult<MaterializedArgs> {
        let mut positional = SmallVec::with_capacity(self.positional.len());
        for slot in &self.positional {
            positional.push(slot.materialize(runtime)?);
        }
        let mut named = Vec::with_capacity(self.named.len());
        for (name, slot) in &self.named {
            named.push((name.clone(), slot.materialize(runtime)?));
        }
        Ok(MaterializedArgs { positional, named })
    }
}

/// An argument tuple after identifier resolution.
#[derive(Debug, Clone, Default)]
pub struct MaterializedArgs {
    pub positional: SmallVec<[Value; 4]>,
    pub named: Vec<(String, Value)>,
}

impl MaterializedArgs {
    pub fn empty() -> Self {
        MaterializedArgs::default()
    }

    /// Rebuild a cold tuple, for super-call forwarding.
    pub fn to_arguments(&self) -> ProcArguments {
        let mut args = ProcArguments::empty();
        for value in &self.positional {
            args.push(ArgSlot::Value(value.clone()));
        }
        for (name, value) in &self.named {
            args.push_named(name.clone(), ArgSlot::Value(value.clone()));
        }
        args
    }
}

#[cfg(test)]
mod tests;
