//! The bytecode assembler.
//!
//! Typed emit helpers per operand shape, plus forward labels: a jump
//! emits a 4-byte placeholder, `bind` records the target, and `finish`
//! patches every placeholder with the absolute byte offset.

use dm_ir::{Constant, FormatKind, Opcode, Span, TemplatePiece, TypePath};
use dm_objtree::GlobalId;

use crate::errors::{CompileError, CompileResult};

/// A forward-referenceable position in the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(usize);

/// Builds one proc's byte stream.
#[derive(Default)]
pub struct BytecodeBuilder {
    bytes: Vec<u8>,
    labels: Vec<Option<usize>>,
    patches: Vec<(usize, Label)>,
}

impl BytecodeBuilder {
    pub fn new() -> Self {
        BytecodeBuilder::default()
    }

    /// Current byte offset.
    #[inline]
    pub fn position(&self) -> usize {
        self.bytes.len()
    }

    /// Allocate an unbound label.
    pub fn label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    /// Bind a label to the current position.
    pub fn bind(&mut self, label: Label) {
        self.labels[label.0] = Some(self.bytes.len());
    }

    /// Patch every jump slot and return the finished stream.
    pub fn finish(self) -> CompileResult<Vec<u8>> {
        let mut bytes = self.bytes;
        for (slot, label) in self.patches {
            let target = self.labels[label.0].ok_or_else(|| {
                CompileError::invalid_operand(format!("unbound label in jump at {slot}"), Span::DUMMY)
            })?;
            let target = i32::try_from(target).map_err(|_| {
                CompileError::invalid_operand("jump target exceeds i32 range", Span::DUMMY)
            })?;
            bytes[slot..slot + 4].copy_from_slice(&target.to_be_bytes());
        }
        Ok(bytes)
    }

    fn op(&mut self, opcode: Opcode) {
        self.bytes.push(opcode as u8);
    }

    fn write_i32(&mut self, value: i32) {
        self.bytes.extend_from_slice(&value.to_be_bytes());
    }

    fn write_f64(&mut self, value: f64) {
        self.bytes.extend_from_slice(&value.to_be_bytes());
    }

    fn write_cstr(&mut self, text: &str) -> CompileResult<()> {
        if text.bytes().any(|b| b == 0x00) {
            return Err(CompileError::invalid_operand(
                "string operand contains NUL",
                Span::DUMMY,
            ));
        }
        self.bytes.extend_from_slice(text.as_bytes());
        self.bytes.push(0x00);
        Ok(())
    }

    fn jump_op(&mut self, opcode: Opcode, label: Label) {
        self.op(opcode);
        self.patches.push((self.bytes.len(), label));
        self.write_i32(0);
    }

    // Stack & constants

    pub fn push_int(&mut self, value: i32) {
        self.op(Opcode::PushInt);
        self.write_i32(value);
    }

    pub fn push_double(&mut self, value: f64) {
        self.op(Opcode::PushDouble);
        self.write_f64(value);
    }

    pub fn push_string(&mut self, text: &str) -> CompileResult<()> {
        self.op(Opcode::PushString);
        self.write_cstr(text)
    }

    pub fn push_path(&mut self, path: &TypePath) -> CompileResult<()> {
        self.op(Opcode::PushPath);
        self.write_cstr(&path.to_string())
    }

    pub fn push_null(&mut self) {
        self.op(Opcode::PushNull);
    }

    pub fn push_resource(&mut self, path: &str) -> CompileResult<()> {
        self.op(Opcode::PushResource);
        self.write_cstr(path)
    }

    pub fn push_src(&mut self) {
        self.op(Opcode::PushSrc);
    }

    pub fn push_self(&mut self) {
        self.op(Opcode::PushSelf);
    }

    pub fn push_super_proc(&mut self) {
        self.op(Opcode::PushSuperProc);
    }

    /// Emit a constant through the matching push opcode.
    pub fn push_constant(&mut self, constant: &Constant) -> CompileResult<()> {
        match constant {
            Constant::Null => self.push_null(),
            Constant::Integer(n) => self.push_int(*n),
            Constant::Double(d) => self.push_double(*d),
            Constant::String(s) => self.push_string(s)?,
            Constant::Path(p) => self.push_path(p)?,
        }
        Ok(())
    }

    /// Emit the argument records of a call. The argument values must
    /// already be on the stack, pushed in reverse order.
    pub fn push_arguments(&mut self, names: &[Option<&str>]) -> CompileResult<()> {
        self.op(Opcode::PushArguments);
        self.write_i32(names.len() as i32);
        for name in names {
            match name {
                Some(name) => {
                    self.bytes.push(1);
                    self.write_cstr(name)?;
                }
                None => self.bytes.push(0),
            }
        }
        Ok(())
    }

    pub fn push_argument_list(&mut self) {
        self.op(Opcode::PushArgumentList);
    }

    // Variables

    pub fn get_identifier(&mut self, name: &str) -> CompileResult<()> {
        self.op(Opcode::GetIdentifier);
        self.write_cstr(name)
    }

    pub fn define_variable(&mut self, name: &str) -> CompileResult<()> {
        self.op(Opcode::DefineVariable);
        self.write_cstr(name)
    }

    pub fn assign(&mut self) {
        self.op(Opcode::Assign);
    }

    pub fn dereference(&mut self, name: &str) -> CompileResult<()> {
        self.op(Opcode::Dereference);
        self.write_cstr(name)
    }

    pub fn get_global(&mut self, id: GlobalId) {
        self.op(Opcode::GetGlobal);
        self.write_i32(id.0 as i32);
    }

    pub fn initial(&mut self) {
        self.op(Opcode::Initial);
    }

    pub fn is_saved(&mut self) {
        self.op(Opcode::IsSaved);
    }

    // Arithmetic & logic

    pub fn add(&mut self) {
        self.op(Opcode::Add);
    }

    pub fn subtract(&mut self) {
        self.op(Opcode::Subtract);
    }

    pub fn multiply(&mut self) {
        self.op(Opcode::Multiply);
    }

    pub fn divide(&mut self) {
        self.op(Opcode::Divide);
    }

    pub fn modulus(&mut self) {
        self.op(Opcode::Modulus);
    }

    pub fn negate(&mut self) {
        self.op(Opcode::Negate);
    }

    pub fn bit_and(&mut self) {
        self.op(Opcode::BitAnd);
    }

    pub fn bit_or(&mut self) {
        self.op(Opcode::BitOr);
    }

    pub fn bit_xor(&mut self) {
        self.op(Opcode::BitXor);
    }

    pub fn bit_not(&mut self) {
        self.op(Opcode::BitNot);
    }

    pub fn bit_shift_left(&mut self) {
        self.op(Opcode::BitShiftLeft);
    }

    pub fn append(&mut self) {
        self.op(Opcode::Append);
    }

    pub fn remove(&mut self) {
        self.op(Opcode::Remove);
    }

    pub fn combine(&mut self) {
        self.op(Opcode::Combine);
    }

    pub fn mask(&mut self) {
        self.op(Opcode::Mask);
    }

    // Comparisons

    pub fn compare_equals(&mut self) {
        self.op(Opcode::CompareEquals);
    }

    pub fn compare_not_equals(&mut self) {
        self.op(Opcode::CompareNotEquals);
    }

    pub fn compare_less_than(&mut self) {
        self.op(Opcode::CompareLessThan);
    }

    pub fn compare_less_than_or_equal(&mut self) {
        self.op(Opcode::CompareLessThanOrEqual);
    }

    pub fn compare_greater_than(&mut self) {
        self.op(Opcode::CompareGreaterThan);
    }

    pub fn compare_greater_than_or_equal(&mut self) {
        self.op(Opcode::CompareGreaterThanOrEqual);
    }

    // Control flow

    pub fn jump(&mut self, label: Label) {
        self.jump_op(Opcode::Jump, label);
    }

    pub fn jump_if_true(&mut self, label: Label) {
        self.jump_op(Opcode::JumpIfTrue, label);
    }

    pub fn jump_if_false(&mut self, label: Label) {
        self.jump_op(Opcode::JumpIfFalse, label);
    }

    pub fn boolean_and(&mut self, label: Label) {
        self.jump_op(Opcode::BooleanAnd, label);
    }

    pub fn boolean_or(&mut self, label: Label) {
        self.jump_op(Opcode::BooleanOr, label);
    }

    pub fn boolean_not(&mut self) {
        self.op(Opcode::BooleanNot);
    }

    pub fn switch_case(&mut self, label: Label) {
        self.jump_op(Opcode::SwitchCase, label);
    }

    pub fn ret(&mut self) {
        self.op(Opcode::Return);
    }

    pub fn error(&mut self) {
        self.op(Opcode::Error);
    }

    pub fn jump_if_null(&mut self, label: Label) {
        self.jump_op(Opcode::JumpIfNull, label);
    }

    pub fn jump_if_null_pop(&mut self, label: Label) {
        self.jump_op(Opcode::JumpIfNullPop, label);
    }

    // Scopes

    pub fn create_scope(&mut self) {
        self.op(Opcode::CreateScope);
    }

    pub fn destroy_scope(&mut self) {
        self.op(Opcode::DestroyScope);
    }

    // Calls & objects

    pub fn call(&mut self) {
        self.op(Opcode::Call);
    }

    pub fn call_statement(&mut self) {
        self.op(Opcode::CallStatement);
    }

    pub fn create_object(&mut self) {
        self.op(Opcode::CreateObject);
    }

    pub fn delete_object(&mut self) {
        self.op(Opcode::DeleteObject);
    }

    // Lists & iteration

    pub fn create_list(&mut self) {
        self.op(Opcode::CreateList);
    }

    pub fn list_append(&mut self) {
        self.op(Opcode::ListAppend);
    }

    pub fn list_append_associated(&mut self) {
        self.op(Opcode::ListAppendAssociated);
    }

    pub fn index_list(&mut self) {
        self.op(Opcode::IndexList);
    }

    pub fn is_in_list(&mut self) {
        self.op(Opcode::IsInList);
    }

    pub fn create_list_enumerator(&mut self) {
        self.op(Opcode::CreateListEnumerator);
    }

    pub fn enumerate_list(&mut self, name: &str) -> CompileResult<()> {
        self.op(Opcode::EnumerateList);
        self.write_cstr(name)
    }

    pub fn destroy_list_enumerator(&mut self) {
        self.op(Opcode::DestroyListEnumerator);
    }

    // I/O bridges

    pub fn browse(&mut self) {
        self.op(Opcode::Browse);
    }

    pub fn browse_resource(&mut self) {
        self.op(Opcode::BrowseResource);
    }

    pub fn output_control(&mut self) {
        self.op(Opcode::OutputControl);
    }

    pub fn output(&mut self) {
        self.op(Opcode::Output);
    }

    // Formatting

    /// Emit a format template. Text pieces may not contain NUL or the
    /// escape byte; each interpolation consumes one stack value, pushed
    /// in template order.
    pub fn format_string(&mut self, pieces: &[TemplatePiece]) -> CompileResult<()> {
        self.op(Opcode::FormatString);
        for piece in pieces {
            match piece {
                TemplatePiece::Text(text) => {
                    if text.bytes().any(|b| b == 0x00 || b == 0xFF) {
                        return Err(CompileError::invalid_operand(
                            "format text contains a reserved byte",
                            Span::DUMMY,
                        ));
                    }
                    self.bytes.extend_from_slice(text.as_bytes());
                }
                TemplatePiece::Interpolate(kind) => {
                    self.bytes.push(0xFF);
                    self.bytes.push(match kind {
                        FormatKind::Stringify => 0x00,
                        FormatKind::Ref => 0x01,
                    });
                }
            }
        }
        self.bytes.push(0x00);
        Ok(())
    }
}
