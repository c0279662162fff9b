//! Type metadata for the DM runtime.
//!
//! The object tree is built once by a loader (an external collaborator)
//! and read by both the compile side and the runtime:
//!
//! - [`Variable`]: a declared instance variable with its default constant
//!   and [`VariableFlags`]
//! - [`ProcDef`]: a compiled procedure (parameters + bytecode)
//! - [`ObjectDefinition`]: one type's tables, linked to its parent
//! - [`ObjectTree`]: path → definition map with global-id allocation
//!
//! Inheritance forms a tree by construction: every definition except the
//! root names an already-registered parent, so cycles cannot be built.

mod definition;
mod proc;
mod tree;
mod variable;

pub use definition::{DefinitionBuilder, ObjectDefinition};
pub use proc::{Parameter, ProcDef, ProcRef};
pub use tree::{builtin, GlobalId, ObjectTree, TreeError};
pub use variable::{ValTypeFlags, Variable, VariableFlags};
