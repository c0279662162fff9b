//! Shared IR for the DM runtime.
//!
//! This crate holds the types both sides of the pipeline speak:
//!
//! - [`TypePath`]: dotted type paths (`/mob/living`), absolute or relative
//! - [`Span`]: compact source locations for compile-side errors
//! - [`Constant`]: the compile-time value universe (variable defaults,
//!   folding results)
//! - [`Opcode`]: the instruction set tags
//! - [`BytecodeReader`]: cursor over a flat byte stream with typed decode
//!   errors
//!
//! The compile side (`dm_codegen`) writes byte streams; the runtime
//! (`dm_eval`) reads them back through [`BytecodeReader`]. Keeping both
//! ends against the same opcode table is the whole point of this crate.

mod constant;
mod opcode;
mod path;
mod reader;
mod span;

pub use constant::Constant;
pub use opcode::Opcode;
pub use path::{PathError, TypePath};
pub use reader::{ArgRecord, BytecodeReader, FormatKind, FormatTemplate, ReadError, TemplatePiece};
pub use span::Span;
