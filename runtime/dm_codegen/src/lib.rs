//! Compile-side bytecode emission.
//!
//! The parser hands this crate typed operation chains; it hands back flat
//! byte streams the interpreter consumes:
//!
//! - [`BytecodeBuilder`]: typed emit helpers plus label allocation and
//!   absolute-offset patching
//! - [`OperandExpr`]: the seam to the external AST - anything that can
//!   emit itself, report a compile-time constant, or a static type path
//! - [`DerefChain`]: chained field/index/call lowering for the four
//!   consumers (read, reference, `initial`, `issaved`), with safe-access
//!   short-circuiting and constant folding
//! - [`ScopeReference`]: the `E::name` form (definition-time reads and
//!   global loads)

mod builder;
mod deref;
mod errors;
mod expr;
mod fold;
mod scope_ref;

pub use builder::{BytecodeBuilder, Label};
pub use deref::{CallArg, ChainOp, DerefChain, DerefOp, ShortCircuitMode};
pub use errors::{CompileError, CompileErrorKind, CompileResult};
pub use expr::{ConstantExpr, LowerContext, OperandExpr};
pub use scope_ref::ScopeReference;
