//! Shared runtime state.
//!
//! One [`Runtime`] owns everything a world of executing procs shares: the
//! object tree, the global slot table, the metaobject table, reference
//! ids, and the connection registry. Execution itself is single-threaded;
//! the connection registry is the one table a host may write from its own
//! threads, so it alone sits behind a lock.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use dm_ir::TypePath;
use dm_objtree::{builtin, GlobalId, ObjectDefinition, ObjectTree};

use crate::errors::{unknown_type, RunResult, RuntimeError, RuntimeErrorKind};
use crate::heap::Mutable;
use crate::list::ListInstance;
use crate::metaobject::{ListMetaobject, Metaobject};
use crate::object::{ObjectInstance, ObjectRef};
use crate::value::Value;

/// Host side of the I/O bridge opcodes, one per connected client.
pub trait Connection: Send + Sync {
    /// `Browse`: display an HTML payload with window options.
    fn browse(&self, html: &str, options: &str);

    /// `BrowseResource`: ship a resource file under a client-side name.
    fn browse_resource(&self, resource: &str, filename: &str);

    /// `OutputControl`: send text at an output control.
    fn output_control(&self, message: &str, control: &str);
}

/// Client object → connection map.
///
/// Hosts register and drop connections from their own threads; the
/// interpreter only reads.
#[derive(Default)]
pub struct ConnectionRegistry {
    inner: RwLock<FxHashMap<usize, Arc<dyn Connection>>>,
}

impl ConnectionRegistry {
    pub fn register(&self, client: &ObjectRef, connection: Arc<dyn Connection>) {
        self.inner.write().insert(client.address(), connection);
    }

    pub fn unregister(&self, client: &ObjectRef) {
        self.inner.write().remove(&client.address());
    }

    pub fn get(&self, client: &ObjectRef) -> Option<Arc<dyn Connection>> {
        self.inner.read().get(&client.address()).cloned()
    }
}

/// Monotonic reference-id table for `\ref[]` formatting.
#[derive(Default)]
struct RefTable {
    next: u32,
    ids: FxHashMap<usize, u32>,
}

/// Shared state of one execution world.
pub struct Runtime {
    tree: ObjectTree,
    globals: RefCell<Vec<Value>>,
    metaobjects: FxHashMap<TypePath, Rc<dyn Metaobject>>,
    connections: ConnectionRegistry,
    refs: RefCell<RefTable>,
}

impl Runtime {
    /// Build a runtime over a loaded tree. Global slots are seeded from
    /// their declared defaults, and the `/list` metaobject is installed.
    pub fn new(tree: ObjectTree) -> Self {
        let globals = (0..tree.global_count())
            .map(|slot| {
                tree.global_default(GlobalId(slot as u32))
                    .map(Value::from_constant)
                    .unwrap_or(Value::Null)
            })
            .collect();
        let mut metaobjects: FxHashMap<TypePath, Rc<dyn Metaobject>> = FxHashMap::default();
        metaobjects.insert(builtin::list(), Rc::new(ListMetaobject));
        Runtime {
            tree,
            globals: RefCell::new(globals),
            metaobjects,
            connections: ConnectionRegistry::default(),
            refs: RefCell::new(RefTable::default()),
        }
    }

    #[inline]
    pub fn tree(&self) -> &ObjectTree {
        &self.tree
    }

    #[inline]
    pub fn connections(&self) -> &ConnectionRegistry {
        &self.connections
    }

    /// Install a metaobject for a type subtree.
    pub fn register_metaobject(&mut self, path: TypePath, metaobject: Rc<dyn Metaobject>) {
        self.metaobjects.insert(path, metaobject);
    }

    /// Nearest metaobject registered on the definition's chain.
    pub fn metaobject_for(&self, definition: &Arc<ObjectDefinition>) -> Option<Rc<dyn Metaobject>> {
        let mut current = Some(definition.clone());
        while let Some(def) = current {
            if let Some(meta) = self.metaobjects.get(def.path()) {
                return Some(Rc::clone(meta));
            }
            current = def.parent().cloned();
        }
        None
    }

    /// Read a global slot.
    pub fn global(&self, id: GlobalId) -> RunResult<Value> {
        self.globals
            .borrow()
            .get(id.0 as usize)
            .cloned()
            .ok_or_else(|| {
                RuntimeError::new(RuntimeErrorKind::UnknownIdentifier {
                    name: id.to_string(),
                })
            })
    }

    /// Write a global slot.
    pub fn set_global(&self, id: GlobalId, value: Value) -> RunResult<()> {
        let mut globals = self.globals.borrow_mut();
        let slot = globals.get_mut(id.0 as usize).ok_or_else(|| {
            RuntimeError::new(RuntimeErrorKind::UnknownIdentifier {
                name: id.to_string(),
            })
        })?;
        *slot = value;
        Ok(())
    }

    /// Create a bare instance of `path`: fields seeded from definition
    /// defaults, list payload attached for `/list` subtypes. Constructor
    /// procs are the interpreter's business, not the tree's.
    pub fn create_instance(&self, path: &TypePath) -> RunResult<ObjectRef> {
        let definition = self
            .tree
            .get(path)
            .ok_or_else(|| unknown_type(path.to_string()))?;
        let mut fields = FxHashMap::default();
        for variable in definition.all_variables() {
            if !variable.is_global() {
                fields.insert(variable.name.clone(), Value::from_constant(&variable.default));
            }
        }
        let list = definition
            .is_subtype_of(&builtin::list())
            .then(ListInstance::new);
        Ok(Mutable::new(ObjectInstance::new(definition, fields, list)))
    }

    /// Wrap an existing list payload in a fresh `/list` object value.
    pub fn list_value(&self, list: ListInstance) -> RunResult<Value> {
        let definition = self
            .tree
            .get(&builtin::list())
            .ok_or_else(|| unknown_type(builtin::list().to_string()))?;
        Ok(Value::Object(Mutable::new(ObjectInstance::new(
            definition,
            FxHashMap::default(),
            Some(list),
        ))))
    }

    /// Stable reference id for an instance; allocated monotonically on
    /// first request.
    pub fn ref_id(&self, object: &ObjectRef) -> u32 {
        let mut refs = self.refs.borrow_mut();
        let address = object.address();
        if let Some(id) = refs.ids.get(&address) {
            return *id;
        }
        refs.next += 1;
        let id = refs.next;
        refs.ids.insert(address, id);
        id
    }
}
