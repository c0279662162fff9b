//! Scope references: the `E::name` form.
//!
//! The head must have a statically known type. Instance variables read
//! their definition-time default (`initial`), not the live field;
//! globals load their slot directly. Unknown names fail at compile time.

use dm_ir::{Constant, Span};
use dm_objtree::ObjectTree;

use crate::builder::BytecodeBuilder;
use crate::errors::{CompileError, CompileResult};
use crate::expr::{LowerContext, OperandExpr};

/// A `head::name` reference.
pub struct ScopeReference {
    pub head: Box<dyn OperandExpr>,
    pub name: String,
    pub span: Span,
}

impl ScopeReference {
    pub fn new(head: Box<dyn OperandExpr>, name: impl Into<String>, span: Span) -> Self {
        ScopeReference {
            head,
            name: name.into(),
            span,
        }
    }

    /// Emit the reference as a read.
    pub fn emit(&self, builder: &mut BytecodeBuilder, ctx: &LowerContext<'_>) -> CompileResult<()> {
        let path = self.head.static_path().ok_or_else(|| {
            CompileError::shape(
                "scope reference requires a statically known type",
                self.head.span(),
            )
        })?;
        let definition = ctx
            .tree
            .get(&path)
            .ok_or_else(|| CompileError::unresolved(path.to_string(), self.span))?;
        if definition.has_variable(&self.name) {
            // Definition-time default, not the live field.
            self.head.emit(builder, ctx)?;
            builder.push_string(&self.name)?;
            builder.initial();
            return Ok(());
        }
        if let Some(id) = definition.get_global_id(&self.name) {
            builder.get_global(id);
            return Ok(());
        }
        Err(CompileError::unresolved(&*self.name, self.span))
    }

    /// Constant-fold through the static variable table.
    pub fn try_fold(&self, tree: &ObjectTree) -> Option<Constant> {
        let path = self.head.static_path()?;
        let definition = tree.get(&path)?;
        let variable = definition.get_variable(&self.name)?;
        if variable.is_const() || variable.is_compiletime_readonly() {
            return Some(variable.default.clone());
        }
        None
    }
}
