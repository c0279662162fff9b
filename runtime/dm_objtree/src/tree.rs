//! The object tree.
//!
//! Path → definition map, built once by the loader then read-only at run
//! time. Parent links are resolved at registration, so inheritance is
//! acyclic by construction.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use dm_ir::{Constant, TypePath};

use crate::{DefinitionBuilder, ObjectDefinition};

/// Identifier of a global variable slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GlobalId(pub u32);

impl fmt::Display for GlobalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

/// Error while building the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// A definition's parent path is not registered yet.
    UnknownParent { path: String, parent: String },
    /// A path was registered twice.
    DuplicateType { path: String },
}

impl fmt::Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeError::UnknownParent { path, parent } => {
                write!(f, "type {path} declared before its parent {parent}")
            }
            TreeError::DuplicateType { path } => write!(f, "type {path} registered twice"),
        }
    }
}

impl std::error::Error for TreeError {}

/// Builtin type paths with special runtime semantics.
pub mod builtin {
    use dm_ir::TypePath;

    pub fn datum() -> TypePath {
        TypePath::absolute(["datum"])
    }

    pub fn atom() -> TypePath {
        TypePath::absolute(["atom"])
    }

    pub fn movable() -> TypePath {
        TypePath::absolute(["atom", "movable"])
    }

    pub fn mob() -> TypePath {
        TypePath::absolute(["mob"])
    }

    pub fn obj() -> TypePath {
        TypePath::absolute(["obj"])
    }

    pub fn turf() -> TypePath {
        TypePath::absolute(["turf"])
    }

    pub fn area() -> TypePath {
        TypePath::absolute(["area"])
    }

    pub fn world() -> TypePath {
        TypePath::absolute(["world"])
    }

    pub fn client() -> TypePath {
        TypePath::absolute(["client"])
    }

    pub fn list() -> TypePath {
        TypePath::absolute(["list"])
    }
}

/// The type tree: every registered definition plus the global slot table.
pub struct ObjectTree {
    definitions: FxHashMap<TypePath, Arc<ObjectDefinition>>,
    global_defaults: Vec<Constant>,
}

impl ObjectTree {
    /// An empty tree containing only the root type `/`.
    pub fn new() -> Self {
        let mut tree = ObjectTree {
            definitions: FxHashMap::default(),
            global_defaults: Vec::new(),
        };
        let root = DefinitionBuilder::new(TypePath::root()).build(None, Vec::new());
        tree.definitions.insert(TypePath::root(), Arc::new(root));
        tree
    }

    /// A tree pre-seeded with the builtin types the runtime gives special
    /// meaning: `/datum`, `/atom`, `/atom/movable`, `/mob`, `/obj`,
    /// `/turf`, `/area`, `/world`, `/client`, `/list`.
    pub fn with_builtins() -> Self {
        let mut tree = ObjectTree::new();
        let seeds = [
            builtin::datum(),
            builtin::atom(),
            builtin::movable(),
            builtin::mob(),
            builtin::obj(),
            builtin::turf(),
            builtin::area(),
            builtin::world(),
            builtin::client(),
            builtin::list(),
        ];
        for path in seeds {
            tree.define(DefinitionBuilder::new(path))
                .unwrap_or_else(|e| unreachable!("builtin seed registration failed: {e}"));
        }
        tree
    }

    /// Register a definition. Its parent (derived from the path) must
    /// already be registered; `/atom/movable` hangs under `/atom`, and a
    /// missing intermediate is an error, not implicitly created.
    pub fn define(&mut self, builder: DefinitionBuilder) -> Result<Arc<ObjectDefinition>, TreeError> {
        let path = builder.path.clone();
        if self.definitions.contains_key(&path) {
            return Err(TreeError::DuplicateType {
                path: path.to_string(),
            });
        }
        let parent_path = path.parent().unwrap_or_else(TypePath::root);
        let parent = self
            .definitions
            .get(&parent_path)
            .cloned()
            .ok_or_else(|| TreeError::UnknownParent {
                path: path.to_string(),
                parent: parent_path.to_string(),
            })?;

        let mut global_ids = Vec::with_capacity(builder.globals.len());
        for (_, default) in &builder.globals {
            let id = GlobalId(u32::try_from(self.global_defaults.len()).unwrap_or(u32::MAX));
            self.global_defaults.push(default.clone());
            global_ids.push(id);
        }

        let definition = Arc::new(builder.build(Some(parent), global_ids));
        self.definitions.insert(path, Arc::clone(&definition));
        Ok(definition)
    }

    /// Look up a definition by absolute path.
    pub fn get(&self, path: &TypePath) -> Option<Arc<ObjectDefinition>> {
        self.definitions.get(path).cloned()
    }

    /// Default constant seeded into a global slot.
    pub fn global_default(&self, id: GlobalId) -> Option<&Constant> {
        self.global_defaults.get(id.0 as usize)
    }

    /// Number of allocated global slots.
    pub fn global_count(&self) -> usize {
        self.global_defaults.len()
    }

    /// Number of registered types (including the root).
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

impl Default for ObjectTree {
    fn default() -> Self {
        Self::new()
    }
}
