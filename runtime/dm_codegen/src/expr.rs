//! The expression seam.
//!
//! The parser owns the AST; the lowering only needs three things from an
//! expression, so that is the whole trait. Chain heads, index
//! expressions, and call arguments all arrive as [`OperandExpr`] trait
//! objects.

use dm_ir::{Constant, Span, TypePath};
use dm_objtree::ObjectTree;

use crate::builder::BytecodeBuilder;
use crate::errors::CompileResult;

/// Compile-time context the lowering consults.
pub struct LowerContext<'a> {
    pub tree: &'a ObjectTree,
}

/// Anything the lowering can emit as a value-producing expression.
pub trait OperandExpr {
    /// Source location, for error reporting.
    fn span(&self) -> Span;

    /// Emit code leaving the expression's value on the stack.
    fn emit(&self, builder: &mut BytecodeBuilder, ctx: &LowerContext<'_>) -> CompileResult<()>;

    /// The expression's compile-time constant value, when known.
    fn constant(&self) -> Option<Constant> {
        None
    }

    /// The static type path of the expression's value, when the AST
    /// tracked one.
    fn static_path(&self) -> Option<TypePath> {
        None
    }
}

/// A literal constant expression.
pub struct ConstantExpr {
    constant: Constant,
    span: Span,
}

impl ConstantExpr {
    pub fn new(constant: Constant, span: Span) -> Self {
        ConstantExpr { constant, span }
    }
}

impl OperandExpr for ConstantExpr {
    fn span(&self) -> Span {
        self.span
    }

    fn emit(&self, builder: &mut BytecodeBuilder, _ctx: &LowerContext<'_>) -> CompileResult<()> {
        builder.push_constant(&self.constant)
    }

    fn constant(&self) -> Option<Constant> {
        Some(self.constant.clone())
    }

    fn static_path(&self) -> Option<TypePath> {
        match &self.constant {
            Constant::Path(path) => Some(path.clone()),
            _ => None,
        }
    }
}
