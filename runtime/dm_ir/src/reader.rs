//! Bytecode stream reading.
//!
//! [`BytecodeReader`] is a cursor over a flat byte stream. All decode
//! failures are typed: a truncated operand, an unterminated string, or an
//! unknown opcode tag each carry the offset where decoding stopped.

use std::fmt;

use crate::Opcode;

/// Error while decoding a byte stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadError {
    /// The stream ended inside an opcode or operand.
    TruncatedBytecode { offset: usize },
    /// A string operand ran to the end of the stream without a terminator.
    StringNotTerminated { offset: usize },
    /// An opcode tag not in the instruction set.
    InvalidOpcode { byte: u8, offset: usize },
    /// A jump operand pointing outside the stream.
    InvalidJumpTarget { target: i32, offset: usize },
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadError::TruncatedBytecode { offset } => {
                write!(f, "bytecode truncated at offset {offset}")
            }
            ReadError::StringNotTerminated { offset } => {
                write!(f, "unterminated string operand starting at offset {offset}")
            }
            ReadError::InvalidOpcode { byte, offset } => {
                write!(f, "invalid opcode 0x{byte:02X} at offset {offset}")
            }
            ReadError::InvalidJumpTarget { target, offset } => {
                write!(f, "jump target {target} out of range at offset {offset}")
            }
        }
    }
}

impl std::error::Error for ReadError {}

/// Formatting kind following a `0xFF` escape in a format template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatKind {
    /// Insert the value's text form.
    Stringify,
    /// Insert a stable reference id for the value.
    Ref,
}

/// One piece of a decoded format template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplatePiece {
    /// Literal text between escapes.
    Text(String),
    /// An escape consuming one stack value.
    Interpolate(FormatKind),
}

/// A decoded format template.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FormatTemplate {
    pub pieces: Vec<TemplatePiece>,
}

impl FormatTemplate {
    /// Number of stack values the template consumes.
    pub fn interpolation_count(&self) -> usize {
        self.pieces
            .iter()
            .filter(|p| matches!(p, TemplatePiece::Interpolate(_)))
            .count()
    }
}

/// One decoded argument record of a `PushArguments` operand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgRecord {
    /// `Some` for a named argument, `None` for a positional one.
    pub name: Option<String>,
}

/// Cursor over a flat bytecode stream.
pub struct BytecodeReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> BytecodeReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        BytecodeReader { bytes, pos: 0 }
    }

    /// Current byte offset.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Whether the cursor has reached the end of the stream.
    #[inline]
    pub fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    /// Move the cursor to an absolute offset, validating the target.
    ///
    /// A target equal to the stream length is permitted: jumping to the
    /// end terminates execution cleanly.
    pub fn jump_to(&mut self, target: i32) -> Result<(), ReadError> {
        let offset = self.pos;
        let target_usize =
            usize::try_from(target).map_err(|_| ReadError::InvalidJumpTarget { target, offset })?;
        if target_usize > self.bytes.len() {
            return Err(ReadError::InvalidJumpTarget { target, offset });
        }
        self.pos = target_usize;
        Ok(())
    }

    /// Read the next opcode tag.
    pub fn opcode(&mut self) -> Result<Opcode, ReadError> {
        let offset = self.pos;
        let byte = self.read_u8()?;
        Opcode::from_u8(byte).ok_or(ReadError::InvalidOpcode { byte, offset })
    }

    /// Read one raw byte.
    pub fn read_u8(&mut self) -> Result<u8, ReadError> {
        let byte = *self
            .bytes
            .get(self.pos)
            .ok_or(ReadError::TruncatedBytecode { offset: self.pos })?;
        self.pos += 1;
        Ok(byte)
    }

    /// Read a big-endian signed 32-bit integer.
    pub fn read_i32(&mut self) -> Result<i32, ReadError> {
        let offset = self.pos;
        let end = self
            .pos
            .checked_add(4)
            .filter(|&end| end <= self.bytes.len())
            .ok_or(ReadError::TruncatedBytecode { offset })?;
        let mut buf = [0u8; 4];
        buf.copy_from_slice(&self.bytes[self.pos..end]);
        self.pos = end;
        Ok(i32::from_be_bytes(buf))
    }

    /// Read a big-endian IEEE-754 double.
    pub fn read_f64(&mut self) -> Result<f64, ReadError> {
        let offset = self.pos;
        let end = self
            .pos
            .checked_add(8)
            .filter(|&end| end <= self.bytes.len())
            .ok_or(ReadError::TruncatedBytecode { offset })?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&self.bytes[self.pos..end]);
        self.pos = end;
        Ok(f64::from_be_bytes(buf))
    }

    /// Read a NUL-terminated string operand.
    pub fn read_string(&mut self) -> Result<String, ReadError> {
        let start = self.pos;
        let terminator = self.bytes[self.pos..]
            .iter()
            .position(|&b| b == 0x00)
            .ok_or(ReadError::StringNotTerminated { offset: start })?;
        let text = String::from_utf8_lossy(&self.bytes[start..start + terminator]).into_owned();
        self.pos = start + terminator + 1;
        Ok(text)
    }

    /// Read a format template operand.
    ///
    /// Like a string, but `0xFF` escapes exactly one following kind byte
    /// (0x00 = Stringify, 0x01 = Ref), so a kind byte of `0x00` does not
    /// terminate the operand. A bare `0x00` ends the template.
    pub fn read_format_template(&mut self) -> Result<FormatTemplate, ReadError> {
        let start = self.pos;
        let mut pieces = Vec::new();
        let mut text = Vec::new();
        loop {
            let byte = self
                .bytes
                .get(self.pos)
                .copied()
                .ok_or(ReadError::StringNotTerminated { offset: start })?;
            self.pos += 1;
            match byte {
                0x00 => break,
                0xFF => {
                    if !text.is_empty() {
                        pieces.push(TemplatePiece::Text(
                            String::from_utf8_lossy(&text).into_owned(),
                        ));
                        text.clear();
                    }
                    let kind_byte = self
                        .bytes
                        .get(self.pos)
                        .copied()
                        .ok_or(ReadError::StringNotTerminated { offset: start })?;
                    self.pos += 1;
                    let kind = match kind_byte {
                        0x00 => FormatKind::Stringify,
                        0x01 => FormatKind::Ref,
                        other => {
                            return Err(ReadError::InvalidOpcode {
                                byte: other,
                                offset: self.pos - 1,
                            })
                        }
                    };
                    pieces.push(TemplatePiece::Interpolate(kind));
                }
                other => text.push(other),
            }
        }
        if !text.is_empty() {
            pieces.push(TemplatePiece::Text(
                String::from_utf8_lossy(&text).into_owned(),
            ));
        }
        Ok(FormatTemplate { pieces })
    }

    /// Read the argument records of a `PushArguments` operand.
    pub fn read_argument_records(&mut self) -> Result<Vec<ArgRecord>, ReadError> {
        let offset = self.pos;
        let count = self.read_i32()?;
        let count =
            usize::try_from(count).map_err(|_| ReadError::TruncatedBytecode { offset })?;
        let mut records = Vec::with_capacity(count);
        for _ in 0..count {
            let tag = self.read_u8()?;
            let name = if tag == 1 {
                Some(self.read_string()?)
            } else {
                None
            };
            records.push(ArgRecord { name });
        }
        Ok(records)
    }
}
