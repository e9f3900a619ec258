//! # Object Store
//!
//! The arena every graph's objects live in, plus the base (non-intercepted)
//! operations over native records. Records are addressed by stable
//! [`ObjectId`] handles; the store owns them until the membrane is dropped,
//! and revocation — not reclamation timing — is the lifecycle event callers
//! may rely on.
//!
//! Base operations are the membrane's equivalent of reflective primitives:
//! handlers unwrap a wrapper to its original and come here to perform the
//! real operation in the original's home graph.

use std::collections::HashSet;
use std::sync::Arc;

use hashbrown::HashMap;

use crate::handler::ProxyHandler;
use crate::membrane::Membrane;
use crate::model::{ObjectId, PropertyDescriptor, PropertyMap, Value, ValueKey};
use crate::{Error, Result};

/// Hop limit for prototype-chain walks (cycle guard).
pub(crate) const PROTO_CHAIN_LIMIT: usize = 64;

/// Host behavior attached to a function object.
///
/// Natives receive the membrane (for re-entrant operations), the `this`
/// value, and the argument slice — all already converted into the function's
/// home graph by the time a native runs.
pub type NativeFn = Arc<dyn Fn(&Membrane, Value, &[Value]) -> Result<Value> + Send + Sync>;

// ============================================================================
// Records
// ============================================================================

/// What kind of thing a record is, beyond its property bag.
pub enum ObjectBody {
    /// Ordinary object.
    Plain,
    /// Callable, backed by a native closure. `arity` is the declared
    /// parameter count, used by `truncateArgList = true`.
    Function { arity: usize, native: NativeFn },
    /// Map-like container keyed by value identity.
    Map(HashMap<ValueKey, Value>),
    /// A membrane wrapper standing in for an original from another graph.
    Wrapper(WrapperState),
}

impl std::fmt::Debug for ObjectBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectBody::Plain => f.write_str("Plain"),
            ObjectBody::Function { arity, .. } => {
                f.debug_struct("Function").field("arity", arity).finish_non_exhaustive()
            }
            ObjectBody::Map(m) => f.debug_tuple("Map").field(&m.len()).finish(),
            ObjectBody::Wrapper(w) => f.debug_tuple("Wrapper").field(w).finish(),
        }
    }
}

/// Wrapper bookkeeping: the back-pointer to the original (O(1) reverse
/// lookup, no table scan), the intercepting handler, local distortion state,
/// and the revoked flag every dispatch checks first.
pub struct WrapperState {
    pub original: ObjectId,
    pub home_graph: String,
    pub handler: Arc<dyn ProxyHandler>,
    pub revoked: bool,
    /// Properties recorded only on the wrapper (`storeUnknownAsLocal`).
    pub local: PropertyMap,
    /// Keys deleted only on the wrapper (`requireLocalDelete`).
    pub tombstones: HashSet<String>,
    /// Placeholder disguise (`useShadowTarget`).
    pub shadow: Option<ObjectId>,
}

impl std::fmt::Debug for WrapperState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WrapperState")
            .field("original", &self.original)
            .field("home_graph", &self.home_graph)
            .field("revoked", &self.revoked)
            .field("shadow", &self.shadow)
            .finish_non_exhaustive()
    }
}

/// One object in the arena.
#[derive(Debug)]
pub struct ObjectRecord {
    pub id: ObjectId,
    /// The graph this record belongs to (destination graph for wrappers).
    pub graph: String,
    pub prototype: Option<ObjectId>,
    pub extensible: bool,
    pub properties: PropertyMap,
    pub body: ObjectBody,
}

impl ObjectRecord {
    pub fn is_wrapper(&self) -> bool {
        matches!(self.body, ObjectBody::Wrapper(_))
    }

    pub fn wrapper(&self) -> Option<&WrapperState> {
        match &self.body {
            ObjectBody::Wrapper(w) => Some(w),
            _ => None,
        }
    }

    pub fn wrapper_mut(&mut self) -> Option<&mut WrapperState> {
        match &mut self.body {
            ObjectBody::Wrapper(w) => Some(w),
            _ => None,
        }
    }
}

// ============================================================================
// ObjectStore
// ============================================================================

/// Arena of object records addressed by stable handles.
pub struct ObjectStore {
    records: HashMap<ObjectId, ObjectRecord>,
    next_id: u64,
}

impl ObjectStore {
    pub fn new() -> Self {
        Self { records: HashMap::new(), next_id: 1 }
    }

    pub fn alloc(
        &mut self,
        graph: &str,
        prototype: Option<ObjectId>,
        extensible: bool,
        body: ObjectBody,
    ) -> ObjectId {
        let id = ObjectId(self.next_id);
        self.next_id += 1;
        self.records.insert(id, ObjectRecord {
            id,
            graph: graph.to_string(),
            prototype,
            extensible,
            properties: PropertyMap::new(),
            body,
        });
        id
    }

    pub fn get(&self, id: ObjectId) -> Result<&ObjectRecord> {
        self.records.get(&id).ok_or_else(|| Error::NotFound(format!("Object {id}")))
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Result<&mut ObjectRecord> {
        self.records.get_mut(&id).ok_or_else(|| Error::NotFound(format!("Object {id}")))
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.records.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    // ========================================================================
    // Base operations (single record, no prototype walk)
    // ========================================================================

    pub fn base_get_prototype(&self, id: ObjectId) -> Result<Option<ObjectId>> {
        Ok(self.get(id)?.prototype)
    }

    /// Returns false when the record is not extensible (matching the host
    /// convention that a sealed object keeps its prototype).
    pub fn base_set_prototype(&mut self, id: ObjectId, proto: Option<ObjectId>) -> Result<bool> {
        let rec = self.get_mut(id)?;
        if !rec.extensible && rec.prototype != proto {
            return Ok(false);
        }
        rec.prototype = proto;
        Ok(true)
    }

    pub fn base_is_extensible(&self, id: ObjectId) -> Result<bool> {
        Ok(self.get(id)?.extensible)
    }

    pub fn base_prevent_extensions(&mut self, id: ObjectId) -> Result<bool> {
        self.get_mut(id)?.extensible = false;
        Ok(true)
    }

    pub fn base_get_own(&self, id: ObjectId, key: &str) -> Result<Option<PropertyDescriptor>> {
        Ok(self.get(id)?.properties.get(key).cloned())
    }

    pub fn base_has_own(&self, id: ObjectId, key: &str) -> Result<bool> {
        Ok(self.get(id)?.properties.contains_key(key))
    }

    /// Define or redefine an own property. Returns false when blocked by a
    /// non-configurable existing property or a non-extensible record.
    pub fn base_define(&mut self, id: ObjectId, key: &str, desc: PropertyDescriptor) -> Result<bool> {
        let rec = self.get_mut(id)?;
        match rec.properties.get(key) {
            Some(existing) if !existing.configurable => {
                // a non-configurable, writable property may still change value
                if existing.writable
                    && existing.enumerable == desc.enumerable
                    && existing.configurable == desc.configurable
                    && existing.writable == desc.writable
                {
                    rec.properties.insert(key.to_string(), desc);
                    return Ok(true);
                }
                Ok(false)
            }
            Some(_) => {
                rec.properties.insert(key.to_string(), desc);
                Ok(true)
            }
            None => {
                if !rec.extensible {
                    return Ok(false);
                }
                rec.properties.insert(key.to_string(), desc);
                Ok(true)
            }
        }
    }

    /// Plain assignment against own state: honors `writable` and
    /// extensibility, creates a permissive descriptor for new keys.
    pub fn base_set(&mut self, id: ObjectId, key: &str, value: Value) -> Result<bool> {
        let rec = self.get_mut(id)?;
        match rec.properties.get_mut(key) {
            Some(existing) => {
                if !existing.writable {
                    return Ok(false);
                }
                existing.value = value;
                Ok(true)
            }
            None => {
                if !rec.extensible {
                    return Ok(false);
                }
                rec.properties.insert(key.to_string(), PropertyDescriptor::data(value));
                Ok(true)
            }
        }
    }

    /// Deleting an absent key is a successful no-op; a non-configurable key
    /// refuses deletion.
    pub fn base_delete(&mut self, id: ObjectId, key: &str) -> Result<bool> {
        let rec = self.get_mut(id)?;
        match rec.properties.get(key) {
            Some(desc) if !desc.configurable => Ok(false),
            Some(_) => {
                rec.properties.remove(key);
                Ok(true)
            }
            None => Ok(true),
        }
    }

    /// Own keys, sorted. Hash maps carry no insertion order, so sorted order
    /// is the deterministic enumeration this store promises.
    pub fn base_own_keys(&self, id: ObjectId) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self.get(id)?.properties.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    // ========================================================================
    // Map container data
    // ========================================================================

    fn map_data(&self, id: ObjectId) -> Result<&HashMap<ValueKey, Value>> {
        match &self.get(id)?.body {
            ObjectBody::Map(data) => Ok(data),
            other => Err(Error::TypeError {
                expected: "MAP".into(),
                got: format!("{other:?}"),
            }),
        }
    }

    fn map_data_mut(&mut self, id: ObjectId) -> Result<&mut HashMap<ValueKey, Value>> {
        match &mut self.get_mut(id)?.body {
            ObjectBody::Map(data) => Ok(data),
            other => Err(Error::TypeError {
                expected: "MAP".into(),
                got: format!("{other:?}"),
            }),
        }
    }

    pub fn map_get(&self, id: ObjectId, key: &Value) -> Result<Value> {
        Ok(self.map_data(id)?.get(&ValueKey::from(key)).cloned().unwrap_or(Value::Null))
    }

    pub fn map_has(&self, id: ObjectId, key: &Value) -> Result<bool> {
        Ok(self.map_data(id)?.contains_key(&ValueKey::from(key)))
    }

    pub fn map_set(&mut self, id: ObjectId, key: &Value, value: Value) -> Result<()> {
        self.map_data_mut(id)?.insert(ValueKey::from(key), value);
        Ok(())
    }

    /// Removing an absent key is a no-op; returns whether a key was removed.
    pub fn map_delete(&mut self, id: ObjectId, key: &Value) -> Result<bool> {
        Ok(self.map_data_mut(id)?.remove(&ValueKey::from(key)).is_some())
    }
}

impl Default for ObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(store: &mut ObjectStore, graph: &str) -> ObjectId {
        store.alloc(graph, None, true, ObjectBody::Plain)
    }

    #[test]
    fn test_alloc_and_get() {
        let mut store = ObjectStore::new();
        let id = plain(&mut store, "wet");
        let rec = store.get(id).unwrap();
        assert_eq!(rec.graph, "wet");
        assert!(rec.extensible);
        assert!(store.get(ObjectId(999)).is_err());
    }

    #[test]
    fn test_set_and_own_keys_sorted() {
        let mut store = ObjectStore::new();
        let id = plain(&mut store, "wet");
        assert!(store.base_set(id, "zeta", Value::from(1)).unwrap());
        assert!(store.base_set(id, "alpha", Value::from(2)).unwrap());
        assert_eq!(store.base_own_keys(id).unwrap(), vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_non_writable_rejects_set() {
        let mut store = ObjectStore::new();
        let id = plain(&mut store, "wet");
        store.base_define(id, "k", PropertyDescriptor::frozen("v")).unwrap();
        assert!(!store.base_set(id, "k", Value::from("w")).unwrap());
        assert_eq!(store.base_get_own(id, "k").unwrap().unwrap().value, Value::from("v"));
    }

    #[test]
    fn test_non_extensible_rejects_new_keys() {
        let mut store = ObjectStore::new();
        let id = plain(&mut store, "wet");
        store.base_set(id, "old", Value::from(1)).unwrap();
        store.base_prevent_extensions(id).unwrap();
        assert!(!store.base_set(id, "new", Value::from(2)).unwrap());
        assert!(store.base_set(id, "old", Value::from(3)).unwrap());
    }

    #[test]
    fn test_delete_semantics() {
        let mut store = ObjectStore::new();
        let id = plain(&mut store, "wet");
        store.base_set(id, "k", Value::from(1)).unwrap();
        assert!(store.base_delete(id, "k").unwrap());
        assert!(store.base_delete(id, "absent").unwrap());

        store.base_define(id, "pinned", PropertyDescriptor::frozen(1i64)).unwrap();
        assert!(!store.base_delete(id, "pinned").unwrap());
    }

    #[test]
    fn test_prototype_link() {
        let mut store = ObjectStore::new();
        let proto = plain(&mut store, "wet");
        let id = plain(&mut store, "wet");
        assert!(store.base_set_prototype(id, Some(proto)).unwrap());
        assert_eq!(store.base_get_prototype(id).unwrap(), Some(proto));

        store.base_prevent_extensions(id).unwrap();
        assert!(!store.base_set_prototype(id, None).unwrap());
    }

    #[test]
    fn test_map_operations() {
        let mut store = ObjectStore::new();
        let map = store.alloc("wet", None, true, ObjectBody::Map(HashMap::new()));
        let key = Value::Object(plain(&mut store, "wet"));

        assert!(!store.map_has(map, &key).unwrap());
        store.map_set(map, &key, Value::from("v")).unwrap();
        assert!(store.map_has(map, &key).unwrap());
        assert_eq!(store.map_get(map, &key).unwrap(), Value::from("v"));

        // deleting an absent key is a no-op
        assert!(!store.map_delete(map, &Value::from(9)).unwrap());
        assert!(store.map_delete(map, &key).unwrap());
        assert!(!store.map_has(map, &key).unwrap());
    }

    #[test]
    fn test_map_ops_reject_non_map() {
        let mut store = ObjectStore::new();
        let id = plain(&mut store, "wet");
        assert!(store.map_get(id, &Value::Null).is_err());
    }
}
