//! Variable metadata.
//!
//! Flags are computed once at load time and queried with O(1) predicate
//! helpers; compile-time constness participates in folding on the
//! `dm_codegen` side.

use bitflags::bitflags;

use dm_ir::Constant;

bitflags! {
    /// Declaration-site properties of a variable.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct VariableFlags: u8 {
        /// Declared `const`: never the target of an assignment and a
        /// folding candidate.
        const CONST = 1 << 0;
        /// Lives in the global table rather than on instances.
        const GLOBAL = 1 << 1;
        /// Writable at load time only; folded opportunistically.
        const READONLY = 1 << 2;
        /// Declared temporary: excluded from persistence.
        const TEMPORARY = 1 << 3;
    }
}

bitflags! {
    /// Value types a variable accepts, as declared (`as num|text`).
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct ValTypeFlags: u16 {
        const NULL = 1 << 0;
        const NUM = 1 << 1;
        const TEXT = 1 << 2;
        const PATH = 1 << 3;
        const OBJ = 1 << 4;
        const MOB = 1 << 5;
        const TURF = 1 << 6;
        const AREA = 1 << 7;
        const FILE = 1 << 8;
        const LIST = 1 << 9;
    }
}

impl ValTypeFlags {
    /// The unconstrained declaration (`as anything`).
    pub const ANYTHING: ValTypeFlags = ValTypeFlags::empty();
}

/// An instance variable declaration: name, default value, flags.
#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    pub default: Constant,
    pub flags: VariableFlags,
    pub val_types: ValTypeFlags,
}

impl Variable {
    /// A plain variable with a default value and no flags.
    pub fn new(name: impl Into<String>, default: Constant) -> Self {
        Variable {
            name: name.into(),
            default,
            flags: VariableFlags::empty(),
            val_types: ValTypeFlags::ANYTHING,
        }
    }

    /// Builder-style flag attachment.
    #[must_use]
    pub fn with_flags(mut self, flags: VariableFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Builder-style value-type constraint.
    #[must_use]
    pub fn with_val_types(mut self, val_types: ValTypeFlags) -> Self {
        self.val_types = val_types;
        self
    }

    #[inline]
    pub fn is_const(&self) -> bool {
        self.flags.contains(VariableFlags::CONST)
    }

    #[inline]
    pub fn is_global(&self) -> bool {
        self.flags.contains(VariableFlags::GLOBAL)
    }

    #[inline]
    pub fn is_compiletime_readonly(&self) -> bool {
        self.flags.contains(VariableFlags::READONLY)
    }

    /// Whether the variable participates in persistence: neither const,
    /// global, nor temporary.
    #[inline]
    pub fn is_saved(&self) -> bool {
        !self
            .flags
            .intersects(VariableFlags::CONST | VariableFlags::GLOBAL | VariableFlags::TEMPORARY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_flags() {
        let v = Variable::new("health", Constant::Integer(100));
        assert!(!v.is_const());
        assert!(!v.is_global());
        assert!(v.is_saved());
    }

    #[test]
    fn test_is_saved_excludes_const_global_temporary() {
        for flags in [
            VariableFlags::CONST,
            VariableFlags::GLOBAL,
            VariableFlags::TEMPORARY,
        ] {
            let v = Variable::new("x", Constant::Null).with_flags(flags);
            assert!(!v.is_saved(), "{flags:?} should not be saved");
        }
        let v = Variable::new("x", Constant::Null).with_flags(VariableFlags::READONLY);
        assert!(v.is_saved());
    }
}
