//! The DM runtime core.
//!
//! Executes compiled procedures against a loaded object tree:
//!
//! - [`Value`]: the tagged runtime value (null, integer, double, string,
//!   path, object, resource, proc)
//! - [`ListInstance`]: the ordered + associative hybrid container with
//!   assignment/removal hooks
//! - [`Scope`] / [`Identifier`]: the lexical scope chain and the mutable
//!   l-value handles the interpreter pushes on its operand stack
//! - [`ProcArguments`]: ordered + named + splatted argument tuples
//! - [`Interpreter`]: the stack machine driving a flat byte stream
//! - [`Runtime`]: shared state one execution world owns (global slots,
//!   metaobject table, connection registry, reference ids)
//!
//! Execution is single-threaded cooperative per procedure: one interpreter
//! drives one byte stream; nested calls get their own interpreter state.

mod arguments;
mod environment;
mod errors;
mod heap;
mod identifier;
mod interpreter;
mod list;
mod metaobject;
mod object;
mod operators;
mod runtime;
mod stack_safety;
mod value;

#[cfg(test)]
mod tests;

pub use arguments::{ArgSlot, MaterializedArgs, ProcArguments};
pub use environment::{Scope, ScopeRef};
pub use errors::{RunResult, RuntimeError, RuntimeErrorKind};
pub use heap::{Heap, Mutable};
pub use identifier::{BuiltinProc, Identifier};
pub use interpreter::{run_proc, Interpreter, StackEntry};
pub use list::{ListHooks, ListInstance, ListKey};
pub use metaobject::{ListMetaobject, Metaobject};
pub use object::{ObjectInstance, ObjectRef};
pub use operators::{evaluate_binary, BinaryOp};
pub use runtime::{Connection, ConnectionRegistry, Runtime};
pub use stack_safety::ensure_sufficient_stack;
pub use value::Value;
