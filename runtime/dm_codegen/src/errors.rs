//! Compile-side errors.
//!
//! Every error carries the span of the expression that produced it so
//! diagnostics can point back into source.

use std::fmt;

use dm_ir::Span;

/// Result alias for the compile side.
pub type CompileResult<T> = Result<T, CompileError>;

/// What the lowering rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileErrorKind {
    /// Operand shape mismatch: l-value of a call result, `initial` of a
    /// call result, a scope reference without a static type.
    ShapeError(String),
    /// A name not present on the statically known type.
    UnresolvedName(String),
    /// An operation the lowering does not support.
    NotImplemented(String),
    /// A malformed operand: an embedded NUL in a string, an unbound
    /// label at finish.
    InvalidOperand(String),
}

impl fmt::Display for CompileErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileErrorKind::ShapeError(msg) => write!(f, "{msg}"),
            CompileErrorKind::UnresolvedName(name) => write!(f, "unresolved name: {name}"),
            CompileErrorKind::NotImplemented(what) => write!(f, "not implemented: {what}"),
            CompileErrorKind::InvalidOperand(msg) => write!(f, "invalid operand: {msg}"),
        }
    }
}

/// A located compile error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    pub kind: CompileErrorKind,
    pub span: Span,
}

impl CompileError {
    pub fn new(kind: CompileErrorKind, span: Span) -> Self {
        CompileError { kind, span }
    }

    pub fn shape(message: impl Into<String>, span: Span) -> Self {
        CompileError::new(CompileErrorKind::ShapeError(message.into()), span)
    }

    pub fn unresolved(name: impl Into<String>, span: Span) -> Self {
        CompileError::new(CompileErrorKind::UnresolvedName(name.into()), span)
    }

    pub fn not_implemented(what: impl Into<String>, span: Span) -> Self {
        CompileError::new(CompileErrorKind::NotImplemented(what.into()), span)
    }

    pub fn invalid_operand(message: impl Into<String>, span: Span) -> Self {
        CompileError::new(CompileErrorKind::InvalidOperand(message.into()), span)
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.kind, self.span)
    }
}

impl std::error::Error for CompileError {}
