//! Compiled procedure records.

use std::sync::Arc;

use dm_ir::{Constant, TypePath};

/// A declared proc parameter.
#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    /// Constant default bound when the caller supplies no value.
    pub default: Option<Constant>,
}

impl Parameter {
    pub fn new(name: impl Into<String>) -> Self {
        Parameter {
            name: name.into(),
            default: None,
        }
    }

    #[must_use]
    pub fn with_default(mut self, default: Constant) -> Self {
        self.default = Some(default);
        self
    }
}

/// A compiled procedure: parameters plus a flat bytecode stream.
#[derive(Debug, Clone)]
pub struct ProcDef {
    pub name: String,
    /// The type that declared this proc (super-call resolution starts at
    /// this type's parent, not at the instance's type).
    pub owner: TypePath,
    pub parameters: Vec<Parameter>,
    pub bytecode: Vec<u8>,
}

/// Shared handle to a proc definition.
pub type ProcRef = Arc<ProcDef>;

impl ProcDef {
    pub fn new(name: impl Into<String>, owner: TypePath, bytecode: Vec<u8>) -> Self {
        ProcDef {
            name: name.into(),
            owner,
            parameters: Vec::new(),
            bytecode,
        }
    }

    #[must_use]
    pub fn with_parameters(mut self, parameters: Vec<Parameter>) -> Self {
        self.parameters = parameters;
        self
    }

    /// Position of a parameter by name.
    pub fn parameter_index(&self, name: &str) -> Option<usize> {
        self.parameters.iter().position(|p| p.name == name)
    }
}
