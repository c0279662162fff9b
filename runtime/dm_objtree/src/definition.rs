//! Per-type definition records.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use dm_ir::TypePath;

use crate::tree::GlobalId;
use crate::{ProcDef, ProcRef, Variable};

/// Immutable per-type record: owning path, parent link, and the variable,
/// proc, and global tables declared directly on this type.
///
/// Lookups walk the parent chain, so a definition only stores what the
/// type itself declares.
#[derive(Debug)]
pub struct ObjectDefinition {
    path: TypePath,
    parent: Option<Arc<ObjectDefinition>>,
    variables: FxHashMap<String, Variable>,
    procs: FxHashMap<String, ProcRef>,
    globals: FxHashMap<String, GlobalId>,
}

impl ObjectDefinition {
    #[inline]
    pub fn path(&self) -> &TypePath {
        &self.path
    }

    #[inline]
    pub fn parent(&self) -> Option<&Arc<ObjectDefinition>> {
        self.parent.as_ref()
    }

    /// Whether this type is `ancestor` or inherits from it.
    pub fn is_subtype_of(&self, ancestor: &TypePath) -> bool {
        let mut current = Some(self);
        while let Some(def) = current {
            if def.path == *ancestor {
                return true;
            }
            current = def.parent.as_deref();
        }
        false
    }

    /// Look up a variable, walking the inheritance chain.
    pub fn get_variable(&self, name: &str) -> Option<&Variable> {
        let mut current = Some(self);
        while let Some(def) = current {
            if let Some(variable) = def.variables.get(name) {
                return Some(variable);
            }
            current = def.parent.as_deref();
        }
        None
    }

    /// Whether the type declares or inherits a variable.
    #[inline]
    pub fn has_variable(&self, name: &str) -> bool {
        self.get_variable(name).is_some()
    }

    /// Look up a proc, walking the inheritance chain.
    pub fn get_proc(&self, name: &str) -> Option<ProcRef> {
        let mut current = Some(self);
        while let Some(def) = current {
            if let Some(proc) = def.procs.get(name) {
                return Some(Arc::clone(proc));
            }
            current = def.parent.as_deref();
        }
        None
    }

    /// Look up a proc declared directly on this type.
    pub fn get_proc_here(&self, name: &str) -> Option<ProcRef> {
        self.procs.get(name).map(Arc::clone)
    }

    /// Look up a global id, walking the inheritance chain.
    pub fn get_global_id(&self, name: &str) -> Option<GlobalId> {
        let mut current = Some(self);
        while let Some(def) = current {
            if let Some(id) = def.globals.get(name) {
                return Some(*id);
            }
            current = def.parent.as_deref();
        }
        None
    }

    /// Variables declared directly on this type.
    pub fn own_variables(&self) -> impl Iterator<Item = &Variable> {
        self.variables.values()
    }

    /// All variables visible on this type: inherited first, own last, so
    /// overrides shadow correctly when collected into a map.
    pub fn all_variables(&self) -> Vec<&Variable> {
        let mut chain = Vec::new();
        let mut current = Some(self);
        while let Some(def) = current {
            chain.push(def);
            current = def.parent.as_deref();
        }
        let mut out = Vec::new();
        for def in chain.into_iter().rev() {
            out.extend(def.variables.values());
        }
        out
    }
}

/// Builder for one type's definition, consumed by
/// [`ObjectTree::define`](crate::ObjectTree::define).
pub struct DefinitionBuilder {
    pub(crate) path: TypePath,
    pub(crate) variables: Vec<Variable>,
    pub(crate) procs: Vec<ProcDef>,
    pub(crate) globals: Vec<(String, dm_ir::Constant)>,
}

impl DefinitionBuilder {
    pub fn new(path: TypePath) -> Self {
        DefinitionBuilder {
            path,
            variables: Vec::new(),
            procs: Vec::new(),
            globals: Vec::new(),
        }
    }

    #[must_use]
    pub fn variable(mut self, variable: Variable) -> Self {
        self.variables.push(variable);
        self
    }

    #[must_use]
    pub fn proc(mut self, proc: ProcDef) -> Self {
        self.procs.push(proc);
        self
    }

    /// Declare a global on this type; the tree allocates its id and seeds
    /// its slot with `default`.
    #[must_use]
    pub fn global(mut self, name: impl Into<String>, default: dm_ir::Constant) -> Self {
        self.globals.push((name.into(), default));
        self
    }

    pub(crate) fn build(
        self,
        parent: Option<Arc<ObjectDefinition>>,
        global_ids: Vec<GlobalId>,
    ) -> ObjectDefinition {
        let mut variables = FxHashMap::default();
        for variable in self.variables {
            variables.insert(variable.name.clone(), variable);
        }
        let mut procs = FxHashMap::default();
        for proc in self.procs {
            procs.insert(proc.name.clone(), Arc::new(proc));
        }
        let globals = self
            .globals
            .into_iter()
            .map(|(name, _)| name)
            .zip(global_ids)
            .collect();
        ObjectDefinition {
            path: self.path,
            parent,
            variables,
            procs,
            globals,
        }
    }
}
