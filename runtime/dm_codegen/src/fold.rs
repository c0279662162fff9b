//! Constant folding for dereference chains.
//!
//! A chain folds when the type at the penultimate step is statically
//! known and the terminal operation reads a field whose variable is
//! `const` (fold to its declared value) or compile-time readonly
//! (fold opportunistically).

use tracing::debug;

use dm_ir::Constant;
use dm_objtree::ObjectTree;

use crate::deref::{DerefChain, DerefOp};

impl DerefChain {
    /// The chain's compile-time constant value, when it has one.
    pub fn try_fold(&self, tree: &ObjectTree) -> Option<Constant> {
        let (terminal, prefix) = self.ops.split_last()?;
        let DerefOp::Field { name, .. } = &terminal.op else {
            return None;
        };
        let receiver = match prefix.last() {
            Some(op) => op.path.clone(),
            None => self.head.static_path(),
        }?;
        let definition = tree.get(&receiver)?;
        let variable = definition.get_variable(name)?;
        if variable.is_const() || variable.is_compiletime_readonly() {
            debug!(%receiver, %name, "folded dereference chain");
            return Some(variable.default.clone());
        }
        None
    }
}

#[cfg(test)]
mod tests;
