//! The bytecode interpreter.
//!
//! A stack machine over a flat byte stream. The operand stack holds a
//! three-way variant ([`StackEntry`]): plain values, identifier handles,
//! and argument tuples. Pop sites check the tag; a mismatch is a
//! `StackTypeError`.
//!
//! One interpreter drives one proc activation. Nested calls build a fresh
//! interpreter (their own stacks), recursing through the host stack with
//! [`ensure_sufficient_stack`]. On exit the operand, scope, and
//! enumerator stacks are cleared unconditionally, error or not.

mod calls;
mod format;
mod io;
mod lists;

use std::mem;
use std::sync::Arc;

use tracing::{debug, trace};

use dm_ir::{BytecodeReader, Opcode};
use dm_objtree::{GlobalId, ProcRef};

use crate::arguments::{ArgSlot, MaterializedArgs, ProcArguments};
use crate::environment::{Scope, ScopeRef};
use crate::errors::{
    null_dereference, stack_type_error, type_mismatch, unknown_field, unknown_identifier,
    RunResult, RuntimeError, RuntimeErrorKind,
};
use crate::identifier::{BuiltinProc, Identifier};
use crate::object::ObjectRef;
use crate::operators::{
    bit_not, compare_greater, compare_less, evaluate_binary, negate, BinaryOp,
};
use crate::runtime::Runtime;
use crate::stack_safety::ensure_sufficient_stack;
use crate::value::Value;

/// One operand stack entry.
#[derive(Debug, Clone)]
pub enum StackEntry {
    Value(Value),
    Ident(Identifier),
    Args(ProcArguments),
}

impl StackEntry {
    fn kind(&self) -> &'static str {
        match self {
            StackEntry::Value(_) => "value",
            StackEntry::Ident(_) => "identifier",
            StackEntry::Args(_) => "argument tuple",
        }
    }
}

/// A list iteration in progress: an owned snapshot of the source.
struct ListEnumerator {
    values: Vec<Value>,
    pos: usize,
}

enum Flow {
    Continue,
    Return,
}

/// Run a proc to completion and return its result.
///
/// This is the entry point hosts call; the interpreter itself calls it
/// re-entrantly for nested invocations.
pub fn run_proc(
    runtime: &Runtime,
    proc: ProcRef,
    src: Option<ObjectRef>,
    usr: Option<ObjectRef>,
    args: ProcArguments,
) -> RunResult<Value> {
    let args = args.materialize(runtime)?;
    let mut interpreter = Interpreter::new(runtime, proc, src, usr, args);
    interpreter.run()
}

/// One proc activation.
pub struct Interpreter<'rt> {
    runtime: &'rt Runtime,
    proc: ProcRef,
    src: Option<ObjectRef>,
    usr: Option<ObjectRef>,
    /// The activation's materialized argument tuple, kept for `..()`
    /// forwarding and the lazy `args` list.
    args: MaterializedArgs,
    args_list: Option<ObjectRef>,
    stack: Vec<StackEntry>,
    scope: ScopeRef,
    scope_depth: usize,
    enumerators: Vec<ListEnumerator>,
    default_return: Value,
}

impl<'rt> Interpreter<'rt> {
    fn new(
        runtime: &'rt Runtime,
        proc: ProcRef,
        src: Option<ObjectRef>,
        usr: Option<ObjectRef>,
        args: MaterializedArgs,
    ) -> Self {
        let scope = Scope::root(src.clone());
        Interpreter {
            runtime,
            proc,
            src,
            usr,
            args,
            args_list: None,
            stack: Vec::new(),
            scope,
            scope_depth: 0,
            enumerators: Vec::new(),
            default_return: Value::Null,
        }
    }

    /// Bind parameters into the root scope: a named argument claims its
    /// parameter; positional arguments fill the remaining parameters in
    /// order; declared defaults cover the gaps, and anything still
    /// missing binds null.
    fn bind_parameters(&mut self) {
        let proc = Arc::clone(&self.proc);
        let values = self.bound_parameter_values();
        let mut scope = self.scope.borrow_mut();
        for (parameter, value) in proc.parameters.iter().zip(values) {
            scope.define(parameter.name.clone(), value);
        }
    }

    fn run(&mut self) -> RunResult<Value> {
        debug!(
            proc = %self.proc.name,
            args = self.args.positional.len(),
            "proc invoked"
        );
        self.bind_parameters();
        let proc = Arc::clone(&self.proc);
        let mut reader = BytecodeReader::new(&proc.bytecode);
        let result = self.execute(&mut reader);
        // Both stacks are cleared unconditionally on the way out.
        self.stack.clear();
        self.enumerators.clear();
        result
    }

    fn execute(&mut self, reader: &mut BytecodeReader<'_>) -> RunResult<Value> {
        loop {
            if reader.at_end() {
                return Ok(mem::replace(&mut self.default_return, Value::Null));
            }
            let offset = reader.position();
            let opcode = match reader.opcode() {
                Ok(opcode) => opcode,
                Err(e) => return Err(self.at(RuntimeError::from(e), offset)),
            };
            trace!(proc = %self.proc.name, offset, ?opcode, "dispatch");
            match self.dispatch(opcode, reader) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Return) => {
                    return Ok(mem::replace(&mut self.default_return, Value::Null));
                }
                Err(e) => return Err(self.at(e, offset)),
            }
        }
    }

    fn at(&self, error: RuntimeError, offset: usize) -> RuntimeError {
        error.with_location(&self.proc.name, offset)
    }

    fn dispatch(&mut self, opcode: Opcode, reader: &mut BytecodeReader<'_>) -> RunResult<Flow> {
        match opcode {
            // Stack & constants
            Opcode::PushInt => {
                let n = reader.read_i32()?;
                self.push_value(Value::Integer(n));
            }
            Opcode::PushDouble => {
                let d = reader.read_f64()?;
                self.push_value(Value::Double(d));
            }
            Opcode::PushString => {
                let s = reader.read_string()?;
                self.push_value(Value::string(s));
            }
            Opcode::PushPath => {
                let text = reader.read_string()?;
                let path = dm_ir::TypePath::parse(&text).map_err(|_| {
                    RuntimeError::new(RuntimeErrorKind::TypeMismatch {
                        expected: "type path operand",
                        found: text.clone(),
                    })
                })?;
                self.push_value(Value::Path(path));
            }
            Opcode::PushNull => self.push_value(Value::Null),
            Opcode::PushResource => {
                let path = reader.read_string()?;
                self.push_value(Value::resource(path));
            }
            Opcode::PushSrc => {
                let src = self.src_value();
                self.push_value(src);
            }
            Opcode::PushSelf => self.push_ident(Identifier::SelfProc),
            Opcode::PushSuperProc => self.push_ident(Identifier::SuperProc),
            Opcode::PushArguments => self.op_push_arguments(reader)?,
            Opcode::PushArgumentList => self.op_push_argument_list()?,

            // Variables
            Opcode::GetIdentifier => {
                let name = reader.read_string()?;
                self.op_get_identifier(&name)?;
            }
            Opcode::DefineVariable => {
                let name = reader.read_string()?;
                let value = self.pop_value()?;
                self.scope.borrow_mut().define(name, value);
            }
            Opcode::Assign => {
                let ident = self.pop_identifier()?;
                let value = self.pop_value()?;
                self.write_identifier(&ident, value)?;
            }
            Opcode::Dereference => {
                let name = reader.read_string()?;
                self.op_dereference(&name)?;
            }
            Opcode::GetGlobal => {
                let id = reader.read_i32()?;
                let id = u32::try_from(id)
                    .map_err(|_| unknown_identifier(format!("global slot {id}")))?;
                self.push_ident(Identifier::Global(GlobalId(id)));
            }
            Opcode::Initial => self.op_initial(false)?,
            Opcode::IsSaved => self.op_initial(true)?,

            // Arithmetic & logic
            Opcode::Add => self.op_binary(BinaryOp::Add)?,
            Opcode::Subtract => self.op_binary(BinaryOp::Subtract)?,
            Opcode::Multiply => self.op_binary(BinaryOp::Multiply)?,
            Opcode::Divide => self.op_binary(BinaryOp::Divide)?,
            Opcode::Modulus => self.op_binary(BinaryOp::Modulus)?,
            Opcode::BitAnd => self.op_binary(BinaryOp::BitAnd)?,
            Opcode::BitOr => self.op_binary(BinaryOp::BitOr)?,
            Opcode::BitXor => self.op_binary(BinaryOp::BitXor)?,
            Opcode::BitShiftLeft => self.op_binary(BinaryOp::BitShiftLeft)?,
            Opcode::Negate => {
                let value = self.pop_value()?;
                let result = negate(value)?;
                self.push_value(result);
            }
            Opcode::BitNot => {
                let value = self.pop_value()?;
                let result = bit_not(value)?;
                self.push_value(result);
            }
            Opcode::Append => self.op_compound(BinaryOp::Append)?,
            Opcode::Remove => self.op_compound(BinaryOp::Remove)?,
            Opcode::Combine => self.op_compound(BinaryOp::Combine)?,
            Opcode::Mask => self.op_compound(BinaryOp::Mask)?,

            // Comparisons
            Opcode::CompareEquals => self.op_compare(|l, r| Ok(l.equals(r)))?,
            Opcode::CompareNotEquals => self.op_compare(|l, r| Ok(!l.equals(r)))?,
            Opcode::CompareLessThan => self.op_compare(compare_less)?,
            Opcode::CompareLessThanOrEqual => {
                self.op_compare(|l, r| Ok(l.equals(r) || compare_less(l, r)?))?;
            }
            Opcode::CompareGreaterThan => self.op_compare(compare_greater)?,
            Opcode::CompareGreaterThanOrEqual => {
                self.op_compare(|l, r| Ok(l.equals(r) || compare_greater(l, r)?))?;
            }

            // Control flow
            Opcode::Jump => {
                let target = reader.read_i32()?;
                reader.jump_to(target)?;
            }
            Opcode::JumpIfTrue => {
                let target = reader.read_i32()?;
                let value = self.pop_value()?;
                if value.is_truthy() {
                    reader.jump_to(target)?;
                }
            }
            Opcode::JumpIfFalse => {
                let target = reader.read_i32()?;
                let value = self.pop_value()?;
                if !value.is_truthy() {
                    reader.jump_to(target)?;
                }
            }
            Opcode::BooleanAnd => {
                let target = reader.read_i32()?;
                let value = self.pop_value()?;
                if !value.is_truthy() {
                    // Short-circuit: the falsy value is the result.
                    self.push_value(value);
                    reader.jump_to(target)?;
                }
            }
            Opcode::BooleanOr => {
                let target = reader.read_i32()?;
                let value = self.pop_value()?;
                if value.is_truthy() {
                    self.push_value(value);
                    reader.jump_to(target)?;
                }
            }
            Opcode::BooleanNot => {
                let value = self.pop_value()?;
                self.push_value(Value::Integer(i32::from(!value.is_truthy())));
            }
            Opcode::SwitchCase => {
                let target = reader.read_i32()?;
                let test = self.pop_value()?;
                let subject = self.pop_value()?;
                if subject.equals(&test) {
                    reader.jump_to(target)?;
                } else {
                    // Keep the subject for the next case.
                    self.push_value(subject);
                }
            }
            Opcode::Return => {
                let value = self.pop_value()?;
                self.default_return = value;
                return Ok(Flow::Return);
            }
            Opcode::Error => return Err(RuntimeError::new(RuntimeErrorKind::Aborted)),
            Opcode::JumpIfNull => {
                let target = reader.read_i32()?;
                let value = self.pop_value()?;
                if value.is_null_like() {
                    // Keep mode: the null is the chain's result.
                    self.push_value(Value::Null);
                    reader.jump_to(target)?;
                } else {
                    self.push_value(value);
                }
            }
            Opcode::JumpIfNullPop => {
                let target = reader.read_i32()?;
                let value = self.pop_value()?;
                if value.is_null_like() {
                    reader.jump_to(target)?;
                } else {
                    self.push_value(value);
                }
            }

            // Scopes
            Opcode::CreateScope => {
                self.scope = Scope::child_of(&self.scope);
                self.scope_depth += 1;
            }
            Opcode::DestroyScope => {
                if self.scope_depth == 0 {
                    return Err(RuntimeError::new(RuntimeErrorKind::ScopeUnderflow));
                }
                let parent = self
                    .scope
                    .borrow()
                    .parent()
                    .cloned()
                    .ok_or(RuntimeErrorKind::ScopeUnderflow)
                    .map_err(RuntimeError::new)?;
                self.scope = parent;
                self.scope_depth -= 1;
            }

            // Calls & objects
            Opcode::Call => self.op_call()?,
            Opcode::CallStatement => self.op_call_statement()?,
            Opcode::CreateObject => self.op_create_object()?,
            Opcode::DeleteObject => self.op_delete_object()?,

            // Lists & iteration
            Opcode::CreateList => {
                let object = self.runtime.create_instance(&dm_objtree::builtin::list())?;
                self.push_value(Value::Object(object));
            }
            Opcode::ListAppend => self.op_list_append()?,
            Opcode::ListAppendAssociated => self.op_list_append_associated()?,
            Opcode::IndexList => self.op_index_list()?,
            Opcode::IsInList => self.op_is_in_list()?,
            Opcode::CreateListEnumerator => self.op_create_enumerator()?,
            Opcode::EnumerateList => {
                let name = reader.read_string()?;
                self.op_enumerate(&name)?;
            }
            Opcode::DestroyListEnumerator => {
                self.enumerators
                    .pop()
                    .ok_or(RuntimeErrorKind::EnumeratorUnderflow)
                    .map_err(RuntimeError::new)?;
            }

            // I/O bridges
            Opcode::Browse => self.op_browse()?,
            Opcode::BrowseResource => self.op_browse_resource()?,
            Opcode::OutputControl => self.op_output_control()?,
            Opcode::Output => self.op_output()?,

            // Formatting
            Opcode::FormatString => {
                let template = reader.read_format_template()?;
                self.op_format_string(&template)?;
            }
        }
        Ok(Flow::Continue)
    }

    // Stack helpers

    fn push_value(&mut self, value: Value) {
        self.stack.push(StackEntry::Value(value));
    }

    fn push_ident(&mut self, ident: Identifier) {
        self.stack.push(StackEntry::Ident(ident));
    }

    fn push_args(&mut self, args: ProcArguments) {
        self.stack.push(StackEntry::Args(args));
    }

    fn pop_entry(&mut self) -> RunResult<StackEntry> {
        self.stack
            .pop()
            .ok_or(RuntimeErrorKind::StackUnderflow)
            .map_err(RuntimeError::new)
    }

    /// Pop a value, reading through an identifier if one is on top.
    fn pop_value(&mut self) -> RunResult<Value> {
        match self.pop_entry()? {
            StackEntry::Value(value) => Ok(value),
            StackEntry::Ident(ident) => self.read_identifier(&ident),
            StackEntry::Args(_) => Err(stack_type_error("value", "argument tuple")),
        }
    }

    fn pop_identifier(&mut self) -> RunResult<Identifier> {
        match self.pop_entry()? {
            StackEntry::Ident(ident) => Ok(ident),
            other => Err(stack_type_error("identifier", other.kind())),
        }
    }

    fn pop_arguments(&mut self) -> RunResult<ProcArguments> {
        match self.pop_entry()? {
            StackEntry::Args(args) => Ok(args),
            other => Err(stack_type_error("argument tuple", other.kind())),
        }
    }

    /// Read through an identifier, resolving the activation-bound
    /// variants the handle itself cannot.
    fn read_identifier(&mut self, ident: &Identifier) -> RunResult<Value> {
        match ident {
            Identifier::SelfProc => Ok(self.default_return.clone()),
            Identifier::SuperProc => Ok(self
                .super_proc()
                .map(Value::Proc)
                .unwrap_or(Value::Null)),
            other => other.get(self.runtime),
        }
    }

    fn write_identifier(&mut self, ident: &Identifier, value: Value) -> RunResult<()> {
        match ident {
            // `.` is the default-return slot.
            Identifier::SelfProc => {
                self.default_return = value;
                Ok(())
            }
            other => other.assign(value, self.runtime),
        }
    }

    fn src_value(&self) -> Value {
        self.src.clone().map(Value::Object).unwrap_or(Value::Null)
    }

    fn usr_value(&self) -> Value {
        self.usr.clone().map(Value::Object).unwrap_or(Value::Null)
    }

    // Identifier resolution

    fn op_get_identifier(&mut self, name: &str) -> RunResult<()> {
        match name {
            "src" => {
                let value = self.src_value();
                self.push_value(value);
            }
            "usr" => {
                let value = self.usr_value();
                self.push_value(value);
            }
            "args" => {
                let list = self.args_list()?;
                self.push_value(Value::Object(list));
            }
            "." => self.push_ident(Identifier::SelfProc),
            ".." => self.push_ident(Identifier::SuperProc),
            "initial" => self.push_ident(Identifier::Builtin(BuiltinProc::Initial)),
            "issaved" => self.push_ident(Identifier::Builtin(BuiltinProc::IsSaved)),
            _ => {
                let ident = self.resolve_identifier(name)?;
                self.push_ident(ident);
            }
        }
        Ok(())
    }

    /// Resolve a plain name: local chain, then `src` fields, globals, and
    /// procs. Unknown names fail now, not at first read.
    fn resolve_identifier(&mut self, name: &str) -> RunResult<Identifier> {
        if self.scope.borrow().has_local(name) {
            return Ok(Identifier::Local {
                scope: self.scope.clone(),
                name: name.to_string(),
            });
        }
        if let Some(src) = &self.src {
            let instance = src.borrow();
            if !instance.is_deleted() {
                if instance.has_field(name) {
                    return Ok(Identifier::Field {
                        object: src.clone(),
                        name: name.to_string(),
                    });
                }
                if let Some(id) = instance.definition().get_global_id(name) {
                    return Ok(Identifier::Global(id));
                }
                if let Some(proc) = instance.definition().get_proc(name) {
                    return Ok(Identifier::ObjectProc {
                        object: src.clone(),
                        proc,
                    });
                }
            }
        }
        // A fresh name in the current scope would have been created by
        // DefineVariable; a bare read of an unknown name is an error.
        Err(unknown_identifier(name))
    }

    fn op_dereference(&mut self, name: &str) -> RunResult<()> {
        let receiver = self.pop_value()?;
        if receiver.is_null_like() {
            return Err(null_dereference(format!(".{name}")));
        }
        let Some(object) = receiver.as_object() else {
            return Err(type_mismatch("object", &receiver));
        };
        let instance = object.borrow();
        let ident = if instance.has_field(name) {
            Identifier::Field {
                object: object.clone(),
                name: name.to_string(),
            }
        } else if let Some(id) = instance.definition().get_global_id(name) {
            Identifier::Global(id)
        } else if let Some(proc) = instance.definition().get_proc(name) {
            Identifier::ObjectProc {
                object: object.clone(),
                proc,
            }
        } else {
            return Err(unknown_field(
                instance.definition().path().to_string(),
                name,
            ));
        };
        drop(instance);
        self.push_ident(ident);
        Ok(())
    }

    /// `Initial` / `IsSaved`: pop the variable name (or index), then the
    /// receiver, and read definition-time state.
    fn op_initial(&mut self, saved: bool) -> RunResult<()> {
        let key = self.pop_value()?;
        let receiver = self.pop_value()?;
        if receiver.is_null_like() {
            return Err(null_dereference("initial"));
        }
        let Some(object) = receiver.as_object() else {
            return Err(type_mismatch("object", &receiver));
        };
        let instance = object.borrow();
        let result = match &key {
            Value::String(name) => {
                let variable = instance
                    .definition()
                    .get_variable(name)
                    .ok_or_else(|| {
                        unknown_field(instance.definition().path().to_string(), (**name).clone())
                    })?;
                if saved {
                    Value::Integer(i32::from(variable.is_saved()))
                } else {
                    Value::from_constant(&variable.default)
                }
            }
            // Indexed form: lists have no definition-time defaults, so
            // `initial` reads the current slot and nothing is saved.
            Value::Integer(_) if instance.list().is_some() => {
                if saved {
                    Value::Integer(0)
                } else {
                    instance
                        .list()
                        .map(|list| list.get(&key))
                        .transpose()?
                        .unwrap_or(Value::Null)
                }
            }
            other => return Err(type_mismatch("variable name", other)),
        };
        drop(instance);
        self.push_value(result);
        Ok(())
    }

    // Operator helpers

    fn op_binary(&mut self, op: BinaryOp) -> RunResult<()> {
        let rhs = self.pop_value()?;
        let lhs = self.pop_value()?;
        let result = evaluate_binary(self.runtime, op, lhs, rhs)?;
        self.push_value(result);
        Ok(())
    }

    /// Compound assignment: pop the identifier, then the operand; read,
    /// combine, write back.
    fn op_compound(&mut self, op: BinaryOp) -> RunResult<()> {
        let ident = self.pop_identifier()?;
        let operand = self.pop_value()?;
        let current = self.read_identifier(&ident)?;
        let result = evaluate_binary(self.runtime, op, current, operand)?;
        self.write_identifier(&ident, result)?;
        Ok(())
    }

    fn op_compare(
        &mut self,
        compare: impl FnOnce(&Value, &Value) -> RunResult<bool>,
    ) -> RunResult<()> {
        let rhs = self.pop_value()?;
        let lhs = self.pop_value()?;
        let result = compare(&lhs, &rhs)?;
        self.push_value(Value::Integer(i32::from(result)));
        Ok(())
    }

    // Argument tuples

    fn op_push_arguments(&mut self, reader: &mut BytecodeReader<'_>) -> RunResult<()> {
        let records = reader.read_argument_records()?;
        let mut args = ProcArguments::empty();
        // Values were pushed in reverse, so pops come back in record
        // order.
        for record in records {
            let slot = match self.pop_entry()? {
                StackEntry::Value(value) => ArgSlot::Value(value),
                StackEntry::Ident(ident) => ArgSlot::Ident(ident),
                StackEntry::Args(_) => {
                    return Err(stack_type_error("argument value", "argument tuple"))
                }
            };
            match record.name {
                Some(name) => args.push_named(name, slot),
                None => args.push(slot),
            }
        }
        self.push_args(args);
        Ok(())
    }

    fn op_push_argument_list(&mut self) -> RunResult<()> {
        let value = self.pop_value()?;
        let args = match &value {
            Value::Null => ProcArguments::empty(),
            _ => {
                let object = value
                    .as_object()
                    .ok_or_else(|| type_mismatch("list", &value))?;
                let instance = object.borrow();
                let list = instance
                    .list()
                    .ok_or_else(|| type_mismatch("list", &value))?;
                ProcArguments::from_list(list)
            }
        };
        self.push_args(args);
        Ok(())
    }

    /// The `args` pseudo-variable: a list over the argument tuple whose
    /// writes flow back into the scope bindings, built on first use.
    fn args_list(&mut self) -> RunResult<ObjectRef> {
        if let Some(list) = &self.args_list {
            return Ok(list.clone());
        }
        let list = calls::build_args_list(self)?;
        self.args_list = Some(list.clone());
        Ok(list)
    }

    /// The proc this activation would invoke through `..`.
    fn super_proc(&self) -> Option<ProcRef> {
        let owner = self.runtime.tree().get(&self.proc.owner)?;
        owner.parent()?.get_proc(&self.proc.name)
    }

    /// Nested invocation with its own interpreter state.
    fn invoke(
        &mut self,
        proc: ProcRef,
        src: Option<ObjectRef>,
        args: ProcArguments,
    ) -> RunResult<Value> {
        let runtime = self.runtime;
        let usr = self.usr.clone();
        ensure_sufficient_stack(|| run_proc(runtime, proc, src, usr, args))
    }
}
