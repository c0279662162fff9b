//! Runtime errors.
//!
//! Every failure the interpreter can raise is a [`RuntimeErrorKind`];
//! [`RuntimeError`] wraps a kind with location metadata (proc name and
//! byte offset) attached as the error unwinds out of the dispatch loop.
//! The interpreter never swallows an error: the host receives it with
//! its stacks already cleared.

use std::fmt;

use dm_ir::ReadError;

/// Result alias used throughout the runtime.
pub type RunResult<T> = Result<T, RuntimeError>;

/// What went wrong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeErrorKind {
    /// Operator applied to an unsupported operand combination with no
    /// metaobject override.
    InvalidOperation {
        operation: &'static str,
        lhs: String,
        rhs: String,
    },
    /// A value of the wrong type where a specific type was required.
    TypeMismatch { expected: &'static str, found: String },
    /// Operand stack entry of the wrong kind at a pop site.
    StackTypeError {
        expected: &'static str,
        found: &'static str,
    },
    /// Field, index, or call through a non-safe operator on a null
    /// receiver.
    NullDereference { access: String },
    DivideByZero,
    /// Byte-stream corruption.
    InvalidOpcode { byte: u8 },
    TruncatedBytecode,
    StringNotTerminated,
    InvalidJumpTarget { target: i32 },
    /// Call target could not be resolved.
    ProcUnresolved { name: String },
    /// Identifier not found in scope, fields, or globals.
    UnknownIdentifier { name: String },
    /// Field not declared on the receiver's type.
    UnknownField { type_path: String, name: String },
    /// Assignment through an identifier naming a `const` variable.
    WriteToConstant { name: String },
    /// I/O opcode receiver that is neither mob nor client.
    InvalidRecipient { found: String },
    /// Unknown type path at object creation.
    UnknownType { path: String },
    EnumeratorUnderflow,
    ScopeUnderflow,
    StackUnderflow,
    /// The `Error` opcode.
    Aborted,
}

impl fmt::Display for RuntimeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeErrorKind::InvalidOperation {
                operation,
                lhs,
                rhs,
            } => {
                if rhs.is_empty() {
                    write!(f, "invalid operation: {operation}{lhs}")
                } else {
                    write!(f, "invalid operation: {lhs} {operation} {rhs}")
                }
            }
            RuntimeErrorKind::TypeMismatch { expected, found } => {
                write!(f, "type mismatch: expected {expected}, found {found}")
            }
            RuntimeErrorKind::StackTypeError { expected, found } => {
                write!(f, "stack entry mismatch: expected {expected}, found {found}")
            }
            RuntimeErrorKind::NullDereference { access } => {
                write!(f, "null dereference: {access}")
            }
            RuntimeErrorKind::DivideByZero => write!(f, "division by zero"),
            RuntimeErrorKind::InvalidOpcode { byte } => {
                write!(f, "invalid opcode 0x{byte:02X}")
            }
            RuntimeErrorKind::TruncatedBytecode => write!(f, "bytecode truncated"),
            RuntimeErrorKind::StringNotTerminated => {
                write!(f, "unterminated string operand")
            }
            RuntimeErrorKind::InvalidJumpTarget { target } => {
                write!(f, "jump target {target} out of range")
            }
            RuntimeErrorKind::ProcUnresolved { name } => {
                write!(f, "unresolved proc: {name}")
            }
            RuntimeErrorKind::UnknownIdentifier { name } => {
                write!(f, "unknown identifier: {name}")
            }
            RuntimeErrorKind::UnknownField { type_path, name } => {
                write!(f, "type {type_path} has no variable {name}")
            }
            RuntimeErrorKind::WriteToConstant { name } => {
                write!(f, "cannot assign to const variable {name}")
            }
            RuntimeErrorKind::InvalidRecipient { found } => {
                write!(f, "output recipient must be a mob or client, found {found}")
            }
            RuntimeErrorKind::UnknownType { path } => write!(f, "unknown type {path}"),
            RuntimeErrorKind::EnumeratorUnderflow => {
                write!(f, "enumerator stack underflow")
            }
            RuntimeErrorKind::ScopeUnderflow => write!(f, "scope stack underflow"),
            RuntimeErrorKind::StackUnderflow => write!(f, "operand stack underflow"),
            RuntimeErrorKind::Aborted => write!(f, "execution aborted"),
        }
    }
}

/// A runtime error with location metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    /// Name of the proc that raised the error.
    pub proc_name: Option<String>,
    /// Byte offset of the opcode being dispatched.
    pub offset: Option<usize>,
}

impl RuntimeError {
    pub fn new(kind: RuntimeErrorKind) -> Self {
        RuntimeError {
            kind,
            proc_name: None,
            offset: None,
        }
    }

    /// Attach location metadata if none is present; an error from a
    /// nested proc keeps its original location.
    #[must_use]
    pub fn with_location(mut self, proc_name: &str, offset: usize) -> Self {
        if self.proc_name.is_none() {
            self.proc_name = Some(proc_name.to_string());
            self.offset = Some(offset);
        }
        self
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.proc_name, self.offset) {
            (Some(name), Some(offset)) => write!(f, "{} (in {name} at +{offset})", self.kind),
            (Some(name), None) => write!(f, "{} (in {name})", self.kind),
            _ => self.kind.fmt(f),
        }
    }
}

impl std::error::Error for RuntimeError {}

impl From<RuntimeErrorKind> for RuntimeError {
    fn from(kind: RuntimeErrorKind) -> Self {
        RuntimeError::new(kind)
    }
}

impl From<ReadError> for RuntimeError {
    fn from(err: ReadError) -> Self {
        let kind = match err {
            ReadError::TruncatedBytecode { .. } => RuntimeErrorKind::TruncatedBytecode,
            ReadError::StringNotTerminated { .. } => RuntimeErrorKind::StringNotTerminated,
            ReadError::InvalidOpcode { byte, .. } => RuntimeErrorKind::InvalidOpcode { byte },
            ReadError::InvalidJumpTarget { target, .. } => {
                RuntimeErrorKind::InvalidJumpTarget { target }
            }
        };
        RuntimeError::new(kind)
    }
}

// Constructor helpers: call sites read as `Err(invalid_operation(...))`.

pub(crate) fn invalid_operation(
    operation: &'static str,
    lhs: &crate::Value,
    rhs: &crate::Value,
) -> RuntimeError {
    RuntimeError::new(RuntimeErrorKind::InvalidOperation {
        operation,
        lhs: lhs.type_name().to_string(),
        rhs: rhs.type_name().to_string(),
    })
}

pub(crate) fn invalid_unary_operation(
    operation: &'static str,
    operand: &crate::Value,
) -> RuntimeError {
    RuntimeError::new(RuntimeErrorKind::InvalidOperation {
        operation,
        lhs: operand.type_name().to_string(),
        rhs: String::new(),
    })
}

pub(crate) fn type_mismatch(expected: &'static str, found: &crate::Value) -> RuntimeError {
    RuntimeError::new(RuntimeErrorKind::TypeMismatch {
        expected,
        found: found.type_name().to_string(),
    })
}

pub(crate) fn null_dereference(access: impl Into<String>) -> RuntimeError {
    RuntimeError::new(RuntimeErrorKind::NullDereference {
        access: access.into(),
    })
}

pub(crate) fn divide_by_zero() -> RuntimeError {
    RuntimeError::new(RuntimeErrorKind::DivideByZero)
}

pub(crate) fn proc_unresolved(name: impl Into<String>) -> RuntimeError {
    RuntimeError::new(RuntimeErrorKind::ProcUnresolved { name: name.into() })
}

pub(crate) fn unknown_identifier(name: impl Into<String>) -> RuntimeError {
    RuntimeError::new(RuntimeErrorKind::UnknownIdentifier { name: name.into() })
}

pub(crate) fn unknown_field(type_path: impl Into<String>, name: impl Into<String>) -> RuntimeError {
    RuntimeError::new(RuntimeErrorKind::UnknownField {
        type_path: type_path.into(),
        name: name.into(),
    })
}

pub(crate) fn write_to_constant(name: impl Into<String>) -> RuntimeError {
    RuntimeError::new(RuntimeErrorKind::WriteToConstant { name: name.into() })
}

pub(crate) fn invalid_recipient(found: &crate::Value) -> RuntimeError {
    RuntimeError::new(RuntimeErrorKind::InvalidRecipient {
        found: found.type_name().to_string(),
    })
}

pub(crate) fn unknown_type(path: impl Into<String>) -> RuntimeError {
    RuntimeError::new(RuntimeErrorKind::UnknownType { path: path.into() })
}

pub(crate) fn stack_type_error(expected: &'static str, found: &'static str) -> RuntimeError {
    RuntimeError::new(RuntimeErrorKind::StackTypeError { expected, found })
}
