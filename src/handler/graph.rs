//! Per-graph handler: the interception layer with distortions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use crate::distortions::DistortionsConfig;
use crate::listeners::{ListenerEntry, ListenerFn, ListenerId, ProxyMeta};
use crate::membrane::{Membrane, MembraneCore};
use crate::model::{PropertyDescriptor, Value};
use crate::{Error, Result};

use super::{ProxyHandler, TrapContext};

/// One graph's interception layer.
///
/// Owns the graph's distortion configuration and proxy-listener list, and
/// implements the 13 traps with membrane semantics: unwrap, apply
/// distortions, forward to the home graph, re-wrap whatever crosses back.
pub struct ObjectGraphHandler {
    name: String,
    core: Weak<MembraneCore>,
    config: RwLock<DistortionsConfig>,
    listeners: RwLock<Vec<ListenerEntry>>,
    next_listener_id: AtomicU64,
    listener_errors: Mutex<Vec<String>>,
}

impl std::fmt::Debug for ObjectGraphHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectGraphHandler")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl ObjectGraphHandler {
    pub(crate) fn new(name: &str, core: Weak<MembraneCore>) -> Self {
        Self {
            name: name.to_string(),
            core,
            config: RwLock::new(DistortionsConfig::default()),
            listeners: RwLock::new(Vec::new()),
            next_listener_id: AtomicU64::new(1),
            listener_errors: Mutex::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn membrane(&self) -> Result<Membrane> {
        self.core
            .upgrade()
            .map(Membrane::from_core)
            .ok_or_else(|| Error::NotFound("membrane was dropped".into()))
    }

    // ========================================================================
    // Distortions
    // ========================================================================

    /// Install a distortion configuration. Validation happens first, so a
    /// bad schema is rejected before any graph state changes.
    pub fn set_distortions(&self, config: DistortionsConfig) -> Result<()> {
        config.validate()?;
        *self.config.write() = config;
        Ok(())
    }

    pub fn distortions(&self) -> DistortionsConfig {
        self.config.read().clone()
    }

    // ========================================================================
    // Listeners
    // ========================================================================

    /// Register a proxy listener; it fires for conversions whose destination
    /// is this graph, in registration order.
    pub fn add_proxy_listener<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&mut ProxyMeta<'_>) -> Result<()> + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_listener_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push(ListenerEntry {
            id,
            callback: Arc::new(callback) as Arc<ListenerFn>,
        });
        id
    }

    /// Remove a listener. Returns true if it was registered. A removal made
    /// while a pipeline is running affects the next conversion, not the
    /// current one (the pipeline iterates a snapshot).
    pub fn remove_proxy_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|entry| entry.id != id);
        listeners.len() != before
    }

    pub(crate) fn snapshot_listeners(&self) -> Vec<ListenerEntry> {
        self.listeners.read().clone()
    }

    pub(crate) fn record_listener_error(&self, message: String) {
        self.listener_errors.lock().push(message);
    }

    /// Errors raised by listener bugs (an `Err` return without
    /// `throw_exception`), in occurrence order. Draining clears the record.
    pub fn drain_listener_errors(&self) -> Vec<String> {
        std::mem::take(&mut self.listener_errors.lock())
    }

    // ========================================================================
    // Object creation (values native to this graph)
    // ========================================================================

    /// Create a plain object in this graph.
    pub fn create_object(&self) -> Result<Value> {
        self.membrane()?.create_object_in(&self.name, None)
    }

    /// Create a plain object with the given prototype (an object native to
    /// this graph, or `Null`).
    pub fn create_object_with_proto(&self, proto: Value) -> Result<Value> {
        let proto = match proto {
            Value::Null => None,
            Value::Object(id) => Some(id),
            other => {
                return Err(Error::TypeError {
                    expected: "OBJECT or NULL".into(),
                    got: other.type_name().into(),
                });
            }
        };
        self.membrane()?.create_object_in(&self.name, proto)
    }

    /// Create a function object backed by a native closure. A fresh
    /// `prototype` object is attached, so the function is constructible.
    pub fn create_function<F>(&self, arity: usize, native: F) -> Result<Value>
    where
        F: Fn(&Membrane, Value, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.membrane()?.create_function_in(&self.name, arity, Arc::new(native))
    }

    /// Create a map-like container with `get`/`set`/`has`/`delete` methods
    /// keyed by value identity.
    pub fn create_map(&self) -> Result<Value> {
        self.membrane()?.create_map_in(&self.name)
    }

    // ========================================================================
    // Revocation
    // ========================================================================

    /// Revoke every mapping touching this graph. Wrappers into this graph
    /// and foreign views of this graph's originals all fail afterwards.
    pub fn revoke_everything(&self) -> Result<()> {
        self.membrane()?.revoke_everything(&self.name)
    }

    // ========================================================================
    // Internals shared by the traps
    // ========================================================================

    /// Look `key` up along the original's prototype chain, excluding the own
    /// level (the caller resolved that through the descriptor trap). Returns
    /// the raw home-graph value. `filterOwnKeys` applies at inherited levels
    /// only when `inheritFilter` is set; a wrapper in the chain is consulted
    /// through its own traps.
    fn inherited_lookup(
        &self,
        cx: &TrapContext<'_>,
        cfg: &DistortionsConfig,
        key: &str,
    ) -> Result<Option<Value>> {
        let mut cursor = cx.membrane.store().read().base_get_prototype(cx.original)?;
        let mut hops = 0;
        while let Some(id) = cursor {
            if hops >= crate::store::PROTO_CHAIN_LIMIT {
                return Ok(None);
            }
            hops += 1;

            let (is_wrapper, own, proto) = {
                let store = cx.membrane.store().read();
                let rec = store.get(id)?;
                (rec.is_wrapper(), rec.properties.get(key).cloned(), rec.prototype)
            };
            if is_wrapper {
                let target = Value::Object(id);
                if cx.membrane.has(target.clone(), key)? {
                    return Ok(Some(cx.membrane.get(target, key)?));
                }
                return Ok(None);
            }
            if let Some(desc) = own {
                if cfg.inherit_filter && cfg.is_key_filtered(key) {
                    // hidden at this level; keep walking
                } else {
                    return Ok(Some(desc.value));
                }
            }
            cursor = proto;
        }
        Ok(None)
    }

    /// Should a write to `key` stay on the wrapper instead of the original?
    fn write_stays_local(
        &self,
        cx: &TrapContext<'_>,
        cfg: &DistortionsConfig,
        key: &str,
    ) -> Result<bool> {
        if cfg.is_key_filtered(key) {
            return Ok(true);
        }
        if cx.membrane.wrapper_tombstoned(cx.wrapper, key)? {
            return Ok(true);
        }
        if cfg.store_unknown_as_local
            && !cx.membrane.store().read().base_has_own(cx.original, key)?
        {
            return Ok(true);
        }
        Ok(false)
    }
}

// ============================================================================
// The 13 traps
// ============================================================================

impl ProxyHandler for ObjectGraphHandler {
    fn get_prototype_of(&self, cx: &TrapContext<'_>) -> Result<Value> {
        let proto = cx.membrane.store().read().base_get_prototype(cx.original)?;
        cx.wrap_out(proto.map(Value::Object).unwrap_or(Value::Null))
    }

    fn set_prototype_of(&self, cx: &TrapContext<'_>, proto: Value) -> Result<bool> {
        cx.membrane.set_wrapper_prototype(cx, proto)
    }

    fn is_extensible(&self, cx: &TrapContext<'_>) -> Result<bool> {
        cx.membrane.store().read().base_is_extensible(cx.original)
    }

    fn prevent_extensions(&self, cx: &TrapContext<'_>) -> Result<bool> {
        cx.membrane.prevent_wrapper_extensions(cx)
    }

    fn get_own_property_descriptor(
        &self,
        cx: &TrapContext<'_>,
        key: &str,
    ) -> Result<Option<PropertyDescriptor>> {
        if cx.membrane.wrapper_tombstoned(cx.wrapper, key)? {
            return Ok(None);
        }
        if let Some(local) = cx.membrane.wrapper_local_get(cx.wrapper, key)? {
            return Ok(Some(local));
        }
        let cfg = self.config.read().clone();
        if cfg.is_key_filtered(key) {
            return Ok(None);
        }
        match cx.membrane.store().read().base_get_own(cx.original, key)? {
            Some(mut desc) => {
                desc.value = cx.wrap_out(desc.value)?;
                Ok(Some(desc))
            }
            None => Ok(None),
        }
    }

    fn define_property(
        &self,
        cx: &TrapContext<'_>,
        key: &str,
        desc: PropertyDescriptor,
    ) -> Result<bool> {
        let cfg = self.config.read().clone();
        if self.write_stays_local(cx, &cfg, key)? {
            cx.membrane.wrapper_local_set(cx.wrapper, key, desc)?;
            return Ok(true);
        }
        let mut desc = desc;
        desc.value = cx.unwrap_in(desc.value)?;
        cx.membrane.store().write().base_define(cx.original, key, desc)
    }

    fn has(&self, cx: &TrapContext<'_>, key: &str) -> Result<bool> {
        // own level through the descriptor trap so chain overrides compose
        if cx.handler.get_own_property_descriptor(cx, key)?.is_some() {
            return Ok(true);
        }
        if cx.membrane.wrapper_tombstoned(cx.wrapper, key)? {
            return Ok(false);
        }
        let cfg = self.config.read().clone();
        Ok(self.inherited_lookup(cx, &cfg, key)?.is_some())
    }

    fn get(&self, cx: &TrapContext<'_>, key: &str) -> Result<Value> {
        if let Some(desc) = cx.handler.get_own_property_descriptor(cx, key)? {
            return Ok(desc.value);
        }
        if cx.membrane.wrapper_tombstoned(cx.wrapper, key)? {
            return Ok(Value::Null);
        }
        let cfg = self.config.read().clone();
        match self.inherited_lookup(cx, &cfg, key)? {
            Some(raw) => cx.wrap_out(raw),
            None => Ok(Value::Null),
        }
    }

    fn set(&self, cx: &TrapContext<'_>, key: &str, value: Value) -> Result<bool> {
        let cfg = self.config.read().clone();
        if self.write_stays_local(cx, &cfg, key)? {
            cx.membrane
                .wrapper_local_set(cx.wrapper, key, PropertyDescriptor::data(value))?;
            return Ok(true);
        }
        let value = cx.unwrap_in(value)?;
        cx.membrane.store().write().base_set(cx.original, key, value)
    }

    fn delete_property(&self, cx: &TrapContext<'_>, key: &str) -> Result<bool> {
        let cfg = self.config.read().clone();
        if cfg.require_local_delete {
            cx.membrane.wrapper_local_delete(cx.wrapper, key)?;
            return Ok(true);
        }
        if cx.membrane.wrapper_local_remove(cx.wrapper, key)? {
            return Ok(true);
        }
        if cfg.is_key_filtered(key) {
            // the key appears non-existent; deleting it is a successful no-op
            return Ok(true);
        }
        cx.membrane.store().write().base_delete(cx.original, key)
    }

    fn own_keys(&self, cx: &TrapContext<'_>) -> Result<Vec<String>> {
        let cfg = self.config.read().clone();
        let mut keys = cx.membrane.store().read().base_own_keys(cx.original)?;
        keys.retain(|k| !cfg.is_key_filtered(k));

        let (local_keys, tombstones) = cx.membrane.wrapper_local_keys(cx.wrapper)?;
        keys.retain(|k| !tombstones.contains(k));
        keys.extend(local_keys);
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    fn call(&self, cx: &TrapContext<'_>, this: Value, args: &[Value]) -> Result<Value> {
        let cfg = self.config.read().clone();
        let args = match cfg.arg_limit(cx.membrane.function_arity(cx.original)?) {
            Some(limit) => &args[..args.len().min(limit)],
            None => args,
        };
        let this = cx.unwrap_in(this)?;
        let args = cx.membrane.convert_all(&cx.dest_graph, &cx.home_graph, args)?;
        let rv = cx.membrane.call(Value::Object(cx.original), this, &args)?;
        cx.wrap_out(rv)
    }

    fn construct(&self, cx: &TrapContext<'_>, args: &[Value]) -> Result<Value> {
        let cfg = self.config.read().clone();
        let args = match cfg.arg_limit(cx.membrane.function_arity(cx.original)?) {
            Some(limit) => &args[..args.len().min(limit)],
            None => args,
        };
        let args = cx.membrane.convert_all(&cx.dest_graph, &cx.home_graph, args)?;
        let rv = cx.membrane.construct(Value::Object(cx.original), &args)?;
        cx.wrap_out(rv)
    }
}
