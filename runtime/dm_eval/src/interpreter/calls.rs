//! Call opcodes: `Call`, `CallStatement`, `CreateObject`, `DeleteObject`,
//! plus the `args` pseudo-list and the `initial`/`issaved` builtins.

use std::rc::Rc;
use std::sync::Arc;

use dm_ir::TypePath;
use dm_objtree::{Parameter, ProcRef};

use crate::arguments::ProcArguments;
use crate::environment::{Scope, ScopeRef};
use crate::errors::{
    null_dereference, proc_unresolved, type_mismatch, unknown_field, RunResult, RuntimeError,
    RuntimeErrorKind,
};
use crate::identifier::{BuiltinProc, Identifier};
use crate::list::{ListHooks, ListInstance};
use crate::object::ObjectRef;
use crate::value::Value;

use super::Interpreter;

impl Interpreter<'_> {
    pub(super) fn op_call(&mut self) -> RunResult<()> {
        let args = self.pop_arguments()?;
        let ident = self.pop_identifier()?;
        let result = match ident {
            Identifier::Builtin(BuiltinProc::Initial) => self.builtin_initial(&args, false)?,
            Identifier::Builtin(BuiltinProc::IsSaved) => self.builtin_initial(&args, true)?,
            Identifier::SelfProc => {
                let proc = Arc::clone(&self.proc);
                let src = self.src.clone();
                self.invoke(proc, src, args)?
            }
            Identifier::SuperProc => {
                let parent = self
                    .super_proc()
                    .ok_or_else(|| proc_unresolved(format!("{} has no parent proc", self.proc.name)))?;
                // A bare `..()` forwards the caller's own argument tuple.
                let args = if args.is_empty() {
                    self.current_args_tuple()?
                } else {
                    args
                };
                let src = self.src.clone();
                self.invoke(parent, src, args)?
            }
            Identifier::ObjectProc { object, proc } => self.invoke(proc, Some(object), args)?,
            Identifier::Field { object, name } => {
                let (proc, receiver) = self.resolve_field_callable(&object, &name)?;
                self.invoke(proc, Some(receiver), args)?
            }
            ident @ (Identifier::Local { .. }
            | Identifier::Global(_)
            | Identifier::ListIndex { .. }) => {
                let callee = self.read_identifier(&ident)?;
                self.call_value(callee, args)?
            }
        };
        self.push_value(result);
        Ok(())
    }

    /// A field used as a call target: a stored proc value or proc-ref
    /// path wins; otherwise the receiver's proc table.
    fn resolve_field_callable(
        &self,
        object: &ObjectRef,
        name: &str,
    ) -> RunResult<(ProcRef, ObjectRef)> {
        let instance = object.borrow();
        if instance.is_deleted() {
            return Err(null_dereference(format!("call of {name}")));
        }
        let stored = instance.get_field(name)?;
        let proc = match stored {
            Value::Proc(proc) => proc,
            Value::Path(path) => self.resolve_proc_path(&path)?,
            _ => instance
                .definition()
                .get_proc(name)
                .ok_or_else(|| proc_unresolved(name))?,
        };
        drop(instance);
        Ok((proc, object.clone()))
    }

    /// Call through a first-class value: a proc handle or a proc-ref
    /// path, invoked against the current `src`.
    fn call_value(&mut self, callee: Value, args: ProcArguments) -> RunResult<Value> {
        let proc = match &callee {
            Value::Proc(proc) => Arc::clone(proc),
            Value::Path(path) => self.resolve_proc_path(path)?,
            other => return Err(proc_unresolved(other.type_name())),
        };
        let src = self.src.clone();
        self.invoke(proc, src, args)
    }

    /// Resolve a proc-reference path (`/mob/proc/attack`, `/proc/helper`)
    /// through the tree.
    pub(super) fn resolve_proc_path(&self, path: &TypePath) -> RunResult<ProcRef> {
        let (owner, name) = match path.sub_path_after("proc") {
            Some(sub) => {
                let name = sub
                    .last()
                    .ok_or_else(|| proc_unresolved(path.to_string()))?
                    .to_string();
                let owner = path
                    .prefix_before("proc")
                    .unwrap_or_else(TypePath::root);
                (owner, name)
            }
            None => {
                let name = path
                    .last()
                    .ok_or_else(|| proc_unresolved(path.to_string()))?
                    .to_string();
                (path.parent().unwrap_or_else(TypePath::root), name)
            }
        };
        let owner = if owner.is_empty() { TypePath::root() } else { owner };
        self.runtime
            .tree()
            .get(&owner)
            .and_then(|def| def.get_proc(&name))
            .ok_or_else(|| proc_unresolved(path.to_string()))
    }

    /// `initial(x)` / `issaved(x)`: the single argument must be an
    /// identifier; the handle, not its value, is inspected.
    fn builtin_initial(&mut self, args: &ProcArguments, saved: bool) -> RunResult<Value> {
        if args.positional.len() != 1 || !args.named.is_empty() {
            return Err(RuntimeError::new(RuntimeErrorKind::TypeMismatch {
                expected: "a single identifier argument",
                found: format!(
                    "{} positional, {} named",
                    args.positional.len(),
                    args.named.len()
                ),
            }));
        }
        let ident = args.positional[0].as_ident().ok_or_else(|| {
            RuntimeError::new(RuntimeErrorKind::TypeMismatch {
                expected: "an identifier argument",
                found: "a call result".to_string(),
            })
        })?;
        match ident {
            Identifier::Field { object, name } => {
                let instance = object.borrow();
                let variable = instance.definition().get_variable(name).ok_or_else(|| {
                    unknown_field(instance.definition().path().to_string(), name.clone())
                })?;
                if saved {
                    Ok(Value::Integer(i32::from(variable.is_saved())))
                } else {
                    Ok(Value::from_constant(&variable.default))
                }
            }
            Identifier::ListIndex { .. } | Identifier::Local { .. } | Identifier::Global(_) => {
                if saved {
                    Ok(Value::Integer(0))
                } else {
                    ident.get(self.runtime)
                }
            }
            other => Err(RuntimeError::new(RuntimeErrorKind::TypeMismatch {
                expected: "variable identifier",
                found: other.describe(),
            })),
        }
    }

    pub(super) fn op_call_statement(&mut self) -> RunResult<()> {
        let args = self.pop_arguments()?;
        let receiver = self.pop_value()?;
        let target = self.pop_value()?;
        if receiver.is_null_like() {
            return Err(null_dereference("call statement"));
        }
        let object = receiver
            .as_object()
            .ok_or_else(|| type_mismatch("object", &receiver))?
            .clone();
        let proc = match &target {
            Value::String(name) => object
                .borrow()
                .definition()
                .get_proc(name)
                .ok_or_else(|| proc_unresolved((**name).clone()))?,
            Value::Path(path) => {
                let name = path
                    .sub_path_after("proc")
                    .and_then(|sub| sub.last().map(str::to_string))
                    .or_else(|| path.last().map(str::to_string))
                    .ok_or_else(|| proc_unresolved(path.to_string()))?;
                object
                    .borrow()
                    .definition()
                    .get_proc(&name)
                    .ok_or_else(|| proc_unresolved(name))?
            }
            other => return Err(type_mismatch("proc name or path", other)),
        };
        let result = self.invoke(proc, Some(object), args)?;
        self.push_value(result);
        Ok(())
    }

    pub(super) fn op_create_object(&mut self) -> RunResult<()> {
        let args = self.pop_arguments()?;
        let path_value = self.pop_value()?;
        let Value::Path(path) = path_value else {
            return Err(type_mismatch("path", &path_value));
        };
        // A single-element relative path names a scope variable holding
        // the real path.
        let path = if !path.is_absolute() && path.len() == 1 {
            let name = path.elements()[0].clone();
            match Scope::resolve(&self.scope, &name, self.runtime)? {
                Value::Path(rebound) => rebound,
                other => return Err(type_mismatch("path", &other)),
            }
        } else {
            path
        };
        let object = self.runtime.create_instance(&path)?;
        let constructor = object.borrow().definition().get_proc("New");
        if let Some(constructor) = constructor {
            self.invoke(constructor, Some(object.clone()), args)?;
        }
        self.push_value(Value::Object(object));
        Ok(())
    }

    pub(super) fn op_delete_object(&mut self) -> RunResult<()> {
        let value = self.pop_value()?;
        match &value {
            Value::Object(object) if !object.borrow().is_deleted() => {
                let definition = object.borrow().definition().clone();
                if let Some(meta) = self.runtime.metaobject_for(&definition) {
                    meta.on_deleted(self.runtime, object);
                }
                object.borrow_mut().mark_deleted();
                Ok(())
            }
            Value::Null | Value::Object(_) => Err(null_dereference("del")),
            other => Err(type_mismatch("object", other)),
        }
    }

    /// The caller-forwardable view of this activation's arguments: the
    /// live `args` list when one exists, else the tuple as invoked.
    pub(super) fn current_args_tuple(&self) -> RunResult<ProcArguments> {
        if let Some(list_object) = &self.args_list {
            let instance = list_object.borrow();
            if let Some(list) = instance.list() {
                return Ok(ProcArguments::from_list(list));
            }
        }
        Ok(self.args.to_arguments())
    }

    /// One value per declared parameter: a named argument claims its
    /// parameter, positional arguments fill the rest in order, then the
    /// declared default, then null.
    pub(super) fn bound_parameter_values(&self) -> Vec<Value> {
        let mut next_positional = 0;
        self.proc
            .parameters
            .iter()
            .map(|parameter| self.claim_argument(parameter, &mut next_positional))
            .collect::<Vec<_>>()
    }

    /// How many positional arguments parameter binding consumes.
    pub(super) fn consumed_positional(&self) -> usize {
        let named_params = self
            .proc
            .parameters
            .iter()
            .filter(|p| self.args.named.iter().any(|(name, _)| name == &p.name))
            .count();
        (self.proc.parameters.len() - named_params).min(self.args.positional.len())
    }

    fn claim_argument(&self, parameter: &Parameter, next_positional: &mut usize) -> Value {
        if let Some((_, value)) = self
            .args
            .named
            .iter()
            .find(|(name, _)| name == &parameter.name)
        {
            return value.clone();
        }
        if let Some(value) = self.args.positional.get(*next_positional) {
            *next_positional += 1;
            return value.clone();
        }
        parameter
            .default
            .as_ref()
            .map(Value::from_constant)
            .unwrap_or(Value::Null)
    }

    /// The root scope of this activation (where parameters are bound).
    fn root_scope(&self) -> ScopeRef {
        let mut current = self.scope.clone();
        loop {
            let parent = current.borrow().parent().cloned();
            match parent {
                Some(parent) => current = parent,
                None => return current,
            }
        }
    }
}

/// Build the `args` list: parameter-order values with write-through.
///
/// String-keyed writes update the like-named binding; integer-keyed
/// writes update the positionally-corresponding parameter's binding, so
/// `args[1] = x` and `args["name"] = x` are indistinguishable to the
/// proc body.
pub(super) fn build_args_list(interp: &mut Interpreter<'_>) -> RunResult<ObjectRef> {
    let proc = Arc::clone(&interp.proc);
    let scope = interp.root_scope();
    let parameter_names: Rc<Vec<String>> =
        Rc::new(proc.parameters.iter().map(|p| p.name.clone()).collect());

    let hook_scope = scope.clone();
    let hook_params = Rc::clone(&parameter_names);
    let on_assigned: Rc<dyn Fn(&Value, &Value)> = Rc::new(move |key, value| {
        match key {
            Value::String(name) => {
                hook_scope.borrow_mut().define((**name).clone(), value.clone());
            }
            Value::Integer(index) => {
                let slot = usize::try_from(*index).ok().filter(|&i| i >= 1);
                if let Some(name) = slot.and_then(|i| hook_params.get(i - 1)) {
                    hook_scope.borrow_mut().define(name.clone(), value.clone());
                }
            }
            _ => {}
        }
    });

    let mut list = ListInstance::with_hooks(ListHooks {
        on_assigned: Some(on_assigned),
        before_removed: None,
    });
    for value in interp.bound_parameter_values() {
        list.add(value);
    }
    for extra in interp
        .args
        .positional
        .iter()
        .skip(interp.consumed_positional())
    {
        list.add(extra.clone());
    }
    for (name, value) in &interp.args.named {
        if !proc.parameters.iter().any(|p| &p.name == name) {
            list.set(Value::string(name.clone()), value.clone())?;
        }
    }

    match interp.runtime.list_value(list)? {
        Value::Object(object) => Ok(object),
        _ => unreachable!("list_value always wraps an object"),
    }
}
