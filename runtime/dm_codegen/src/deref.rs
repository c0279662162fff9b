//! Dereference-chain lowering.
//!
//! A chain is a head expression plus typed operations (`.f`, `?.f`,
//! `[i]`, `?.f(...)`, …). Four consumers want code for it:
//!
//! - **read**: the chain's value
//! - **reference**: a first-class l-value handle for the terminal
//!   field/index (call results are not l-values)
//! - **`initial` / `issaved`**: definition-time state of the terminal
//!   variable (call results are rejected)
//!
//! Safe operations short-circuit on a null receiver through one end
//! label shared by the whole chain. Reads keep the null as the result
//! (`KeepNull`); reference sites choose their mode.

use dm_ir::{Span, TypePath};

use crate::builder::{BytecodeBuilder, Label};
use crate::errors::{CompileError, CompileResult};
use crate::expr::{LowerContext, OperandExpr};

/// What a null-guard does with the null it found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortCircuitMode {
    /// Leave the null on the stack; the chain yields null.
    KeepNull,
    /// Pop the null before jumping.
    PopNull,
}

/// One argument of a call operation.
pub struct CallArg {
    pub name: Option<String>,
    pub expr: Box<dyn OperandExpr>,
}

impl CallArg {
    pub fn positional(expr: Box<dyn OperandExpr>) -> Self {
        CallArg { name: None, expr }
    }

    pub fn named(name: impl Into<String>, expr: Box<dyn OperandExpr>) -> Self {
        CallArg {
            name: Some(name.into()),
            expr,
        }
    }
}

/// One typed operation of a chain.
pub enum DerefOp {
    /// `.name` / `:name` / `?.name` / `?:name`
    Field {
        name: String,
        safe: bool,
        search: bool,
    },
    /// `[index]` / `?[index]`
    Index {
        index: Box<dyn OperandExpr>,
        safe: bool,
    },
    /// `.name(...)` and friends
    Call {
        name: String,
        args: Vec<CallArg>,
        safe: bool,
        search: bool,
    },
    /// An operation the parser could not classify.
    Invalid,
}

impl DerefOp {
    fn is_safe(&self) -> bool {
        match self {
            DerefOp::Field { safe, .. }
            | DerefOp::Index { safe, .. }
            | DerefOp::Call { safe, .. } => *safe,
            DerefOp::Invalid => false,
        }
    }
}

/// An operation plus what the AST knows about it.
pub struct ChainOp {
    pub op: DerefOp,
    /// Static type path of the value *after* this operation, when known.
    pub path: Option<TypePath>,
    pub span: Span,
}

/// A head expression and its operation sequence.
pub struct DerefChain {
    pub head: Box<dyn OperandExpr>,
    pub ops: Vec<ChainOp>,
}

impl DerefChain {
    pub fn new(head: Box<dyn OperandExpr>, ops: Vec<ChainOp>) -> Self {
        DerefChain { head, ops }
    }

    /// Whether any operation can short-circuit; callers use this to
    /// decide if a fused end label is needed around the chain.
    pub fn can_short_circuit(&self) -> bool {
        self.ops.iter().any(|op| op.op.is_safe())
    }

    /// Static type path the operation at `index` receives.
    fn receiver_path(&self, index: usize) -> Option<TypePath> {
        if index == 0 {
            self.head.static_path()
        } else {
            self.ops[index - 1].path.clone()
        }
    }

    /// Non-search operations on a statically known receiver must name
    /// something the type actually has.
    fn check_name(
        &self,
        ctx: &LowerContext<'_>,
        index: usize,
        name: &str,
        span: Span,
    ) -> CompileResult<()> {
        let Some(path) = self.receiver_path(index) else {
            return Ok(());
        };
        let Some(definition) = ctx.tree.get(&path) else {
            return Ok(());
        };
        let known = definition.has_variable(name)
            || definition.get_global_id(name).is_some()
            || definition.get_proc(name).is_some();
        if known {
            Ok(())
        } else {
            Err(CompileError::unresolved(name, span))
        }
    }

    fn guard(builder: &mut BytecodeBuilder, mode: ShortCircuitMode, end: Label) {
        match mode {
            ShortCircuitMode::KeepNull => builder.jump_if_null(end),
            ShortCircuitMode::PopNull => builder.jump_if_null_pop(end),
        }
    }

    /// Emit one operation: null-guard, then the dereference itself.
    fn emit_op(
        &self,
        builder: &mut BytecodeBuilder,
        ctx: &LowerContext<'_>,
        index: usize,
        end: Label,
        mode: ShortCircuitMode,
    ) -> CompileResult<()> {
        let chain_op = &self.ops[index];
        match &chain_op.op {
            DerefOp::Field { name, safe, search } => {
                if *safe {
                    Self::guard(builder, mode, end);
                }
                if !*search {
                    self.check_name(ctx, index, name, chain_op.span)?;
                }
                builder.dereference(name)
            }
            DerefOp::Index { index: index_expr, safe } => {
                if *safe {
                    Self::guard(builder, mode, end);
                }
                index_expr.emit(builder, ctx)?;
                builder.index_list();
                Ok(())
            }
            DerefOp::Call {
                name,
                args,
                safe,
                search,
            } => {
                if *safe {
                    Self::guard(builder, mode, end);
                }
                if !*search {
                    self.check_name(ctx, index, name, chain_op.span)?;
                }
                builder.dereference(name)?;
                // Argument values go on in reverse so the tuple pops
                // them back in declaration order.
                for arg in args.iter().rev() {
                    arg.expr.emit(builder, ctx)?;
                }
                let names: Vec<Option<&str>> = args.iter().map(|a| a.name.as_deref()).collect();
                builder.push_arguments(&names)?;
                builder.call();
                Ok(())
            }
            DerefOp::Invalid => Err(CompileError::not_implemented(
                "unclassified dereference operation",
                chain_op.span,
            )),
        }
    }

    /// Emit the chain as a read; the chain's value ends up on the stack
    /// (null if any safe operation short-circuited).
    pub fn emit_read(
        &self,
        builder: &mut BytecodeBuilder,
        ctx: &LowerContext<'_>,
    ) -> CompileResult<()> {
        self.head.emit(builder, ctx)?;
        let end = builder.label();
        for index in 0..self.ops.len() {
            self.emit_op(builder, ctx, index, end, ShortCircuitMode::KeepNull)?;
        }
        builder.bind(end);
        Ok(())
    }

    /// Emit the chain as a reference: the terminal field or index
    /// becomes a first-class l-value handle. Call results are rejected.
    pub fn emit_reference(
        &self,
        builder: &mut BytecodeBuilder,
        ctx: &LowerContext<'_>,
        mode: ShortCircuitMode,
    ) -> CompileResult<()> {
        let Some(split) = self.ops.len().checked_sub(1) else {
            return Err(CompileError::shape(
                "a bare expression is not a reference",
                self.head.span(),
            ));
        };
        self.head.emit(builder, ctx)?;
        let end = builder.label();
        for index in 0..split {
            self.emit_op(builder, ctx, index, end, mode)?;
        }
        let terminal = &self.ops[split];
        match &terminal.op {
            DerefOp::Field { name, safe, search } => {
                if *safe {
                    Self::guard(builder, mode, end);
                }
                if !*search {
                    self.check_name(ctx, split, name, terminal.span)?;
                }
                builder.dereference(name)?;
            }
            DerefOp::Index { index, safe } => {
                if *safe {
                    Self::guard(builder, mode, end);
                }
                index.emit(builder, ctx)?;
                builder.index_list();
            }
            DerefOp::Call { .. } => {
                return Err(CompileError::shape(
                    "a call result is not an assignable reference",
                    terminal.span,
                ));
            }
            DerefOp::Invalid => {
                return Err(CompileError::not_implemented(
                    "unclassified dereference operation",
                    terminal.span,
                ));
            }
        }
        builder.bind(end);
        Ok(())
    }

    /// Emit the chain under `initial()` (`saved = false`) or
    /// `issaved()` (`saved = true`): definition-time state of the
    /// terminal variable. Any call in the chain means the terminal is
    /// rooted in a call result and is rejected.
    pub fn emit_initial(
        &self,
        builder: &mut BytecodeBuilder,
        ctx: &LowerContext<'_>,
        saved: bool,
    ) -> CompileResult<()> {
        let what = if saved { "issaved" } else { "initial" };
        if let Some(call) = self
            .ops
            .iter()
            .find(|op| matches!(op.op, DerefOp::Call { .. }))
        {
            return Err(CompileError::shape(
                format!("{what} of a call result"),
                call.span,
            ));
        }
        let Some(split) = self.ops.len().checked_sub(1) else {
            return Err(CompileError::shape(
                format!("{what} requires a variable access"),
                self.head.span(),
            ));
        };
        self.head.emit(builder, ctx)?;
        let end = builder.label();
        for index in 0..split {
            self.emit_op(builder, ctx, index, end, ShortCircuitMode::KeepNull)?;
        }
        let terminal = &self.ops[split];
        match &terminal.op {
            DerefOp::Field { name, safe, search } => {
                if *safe {
                    Self::guard(builder, ShortCircuitMode::KeepNull, end);
                }
                if !*search {
                    self.check_name(ctx, split, name, terminal.span)?;
                }
                builder.push_string(name)?;
                if saved {
                    builder.is_saved();
                } else {
                    builder.initial();
                }
            }
            DerefOp::Index { index, safe } => {
                if *safe {
                    Self::guard(builder, ShortCircuitMode::KeepNull, end);
                }
                index.emit(builder, ctx)?;
                if saved {
                    builder.is_saved();
                } else {
                    builder.initial();
                }
            }
            // Unreachable thanks to the scan above, but the match stays
            // exhaustive.
            DerefOp::Call { .. } => {
                return Err(CompileError::shape(
                    format!("{what} of a call result"),
                    terminal.span,
                ));
            }
            DerefOp::Invalid => {
                return Err(CompileError::not_implemented(
                    "unclassified dereference operation",
                    terminal.span,
                ));
            }
        }
        builder.bind(end);
        Ok(())
    }
}

#[cfg(test)]
mod tests;
