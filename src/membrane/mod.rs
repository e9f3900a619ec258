//! # Membrane Coordinator
//!
//! The top-level object: owns the graph registry, the object store, and the
//! identity table; drives conversion and the listener pipeline; exposes
//! revocation and the caller-facing accessor API.
//!
//! ## Conversion pipeline
//!
//! `convert_argument_to_proxy` runs these phases:
//!
//! 1. Primitives pass through unwrapped and untracked.
//! 2. A wrapper unwraps to its original; a value already native to the
//!    destination graph returns unchanged (round trip).
//! 3. Identity-table hit returns the cached view — identical
//!    (original, destination) pairs always yield the identical reference.
//! 4. Otherwise the destination handler builds a wrapper (and shadow, when
//!    configured), the view is provisionally registered, and the destination
//!    graph's proxy listeners run. The registration is refreshed with the
//!    final (possibly overridden) value, or removed entirely on a listener
//!    abort.
//!
//! Every interception runs on the caller's stack; a call crossing N
//! boundaries is N nested frames, never scheduled work.

use std::collections::HashSet;
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::RwLock;
use smallvec::SmallVec;

use crate::distortions::DistortionsConfig;
use crate::handler::{ChainHandler, ObjectGraphHandler, PASS_THROUGH, ProxyHandler, TrapContext};
use crate::listeners::ProxyMeta;
use crate::logging::{LogLevel, MembraneLogger};
use crate::mappings::{IdentityTable, ProxyView};
use crate::model::{ObjectId, Operation, PropertyDescriptor, PropertyMap, Value};
use crate::store::{NativeFn, ObjectBody, ObjectStore, PROTO_CHAIN_LIMIT, WrapperState};
use crate::{Error, Result};

// ============================================================================
// Core state
// ============================================================================

pub(crate) struct MembraneCore {
    pub(crate) store: RwLock<ObjectStore>,
    pub(crate) mappings: RwLock<IdentityTable>,
    pub(crate) graphs: RwLock<HashMap<String, Arc<ObjectGraphHandler>>>,
    pub(crate) logger: Option<Arc<dyn MembraneLogger>>,
}

/// The membrane. Cheap to clone; clones share all state.
pub struct Membrane {
    core: Arc<MembraneCore>,
}

impl Clone for Membrane {
    fn clone(&self) -> Self {
        Membrane { core: self.core.clone() }
    }
}

impl Default for Membrane {
    fn default() -> Self {
        Self::new()
    }
}

impl Membrane {
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Attach a logging collaborator. It receives leveled messages at the
    /// documented stable points and never affects control flow.
    pub fn with_logger(logger: Arc<dyn MembraneLogger>) -> Self {
        Self::build(Some(logger))
    }

    fn build(logger: Option<Arc<dyn MembraneLogger>>) -> Self {
        Membrane {
            core: Arc::new(MembraneCore {
                store: RwLock::new(ObjectStore::new()),
                mappings: RwLock::new(IdentityTable::new()),
                graphs: RwLock::new(HashMap::new()),
                logger,
            }),
        }
    }

    pub(crate) fn from_core(core: Arc<MembraneCore>) -> Self {
        Membrane { core }
    }

    pub(crate) fn store(&self) -> &RwLock<ObjectStore> {
        &self.core.store
    }

    pub(crate) fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Trace => tracing::trace!("{message}"),
            LogLevel::Debug => tracing::debug!("{message}"),
            LogLevel::Info => tracing::info!("{message}"),
            LogLevel::Warn => tracing::warn!("{message}"),
            LogLevel::Error => tracing::error!("{message}"),
        }
        if let Some(logger) = &self.core.logger {
            logger.log(level, message);
        }
    }

    // ========================================================================
    // Graph registry
    // ========================================================================

    /// Return the named graph's handler, creating it when `must_create` is
    /// set. Referencing a graph that was never created fails with
    /// [`Error::UnknownGraph`].
    pub fn get_graph_handler(
        &self,
        name: &str,
        must_create: bool,
    ) -> Result<Arc<ObjectGraphHandler>> {
        if let Some(handler) = self.core.graphs.read().get(name) {
            return Ok(handler.clone());
        }
        if !must_create {
            return Err(Error::UnknownGraph(name.to_string()));
        }
        let mut graphs = self.core.graphs.write();
        if let Some(handler) = graphs.get(name) {
            return Ok(handler.clone());
        }
        let handler = Arc::new(ObjectGraphHandler::new(name, Arc::downgrade(&self.core)));
        graphs.insert(name.to_string(), handler.clone());
        drop(graphs);
        self.log(LogLevel::Debug, &format!("graph '{name}' created"));
        Ok(handler)
    }

    /// The rules-modification facility: chain handlers and configuration
    /// replacement.
    pub fn modify_rules(&self) -> ModifyRules<'_> {
        ModifyRules { membrane: self }
    }

    // ========================================================================
    // Conversion
    // ========================================================================

    /// Expose `value` (native to `source`'s graph) inside `dest`'s graph.
    pub fn convert_argument_to_proxy(
        &self,
        source: &ObjectGraphHandler,
        dest: &ObjectGraphHandler,
        value: Value,
    ) -> Result<Value> {
        self.convert_value(source.name(), dest.name(), value)
    }

    pub(crate) fn convert_value(&self, source: &str, dest: &str, value: Value) -> Result<Value> {
        let Some(id) = value.as_object() else {
            return Ok(value);
        };
        tracing::trace!(source, dest, id = %id, "converting value");

        // unwrap to the true original; the record is authoritative about the
        // home graph even when the caller's source disagrees
        let (original, home) = {
            let store = self.core.store.read();
            let rec = store.get(id)?;
            match rec.wrapper() {
                Some(w) => {
                    if w.revoked {
                        return Err(Error::RevokedWrapper { graph: rec.graph.clone() });
                    }
                    (w.original, w.home_graph.clone())
                }
                None => (id, rec.graph.clone()),
            }
        };
        if home == dest {
            return Ok(Value::Object(original));
        }

        if let Some(cached) = self.core.mappings.read().view(original, dest) {
            return Ok(cached);
        }

        let dest_handler = self.get_graph_handler(dest, false)?;
        let (wrapper, shadow) = self.build_wrapper(original, &home, dest, &dest_handler)?;
        self.log(
            LogLevel::Debug,
            &format!("wrapper created: {home} -> {dest} (original {original})"),
        );

        // provisional registration: re-entrant conversions triggered from the
        // listener pipeline must observe this view, never a half-updated table
        self.core.mappings.write().insert_view(
            original,
            &home,
            dest,
            ProxyView { value: Value::Object(wrapper), shadow },
        );

        match self.run_listeners(
            &dest_handler,
            Value::Object(original),
            Value::Object(wrapper),
            &home,
            dest,
        ) {
            Ok(final_value) => {
                self.core.mappings.write().refresh_view(original, dest, final_value.clone());
                Ok(final_value)
            }
            Err(e) => {
                self.core.mappings.write().remove_view(original, dest);
                Err(e)
            }
        }
    }

    pub(crate) fn convert_all(
        &self,
        source: &str,
        dest: &str,
        values: &[Value],
    ) -> Result<SmallVec<[Value; 8]>> {
        values
            .iter()
            .map(|v| self.convert_value(source, dest, v.clone()))
            .collect()
    }

    fn build_wrapper(
        &self,
        original: ObjectId,
        home: &str,
        dest: &str,
        dest_handler: &Arc<ObjectGraphHandler>,
    ) -> Result<(ObjectId, Option<ObjectId>)> {
        let cfg = dest_handler.distortions();
        let (proto, extensible) = {
            let store = self.core.store.read();
            let rec = store.get(original)?;
            (rec.prototype, rec.extensible)
        };

        // the shadow shares only prototype and extensibility with the
        // original; its prototype is the destination-side view
        let shadow = if cfg.use_shadow_target {
            let proto_dest = match proto {
                Some(p) => self.convert_value(home, dest, Value::Object(p))?.as_object(),
                None => None,
            };
            Some(self.core.store.write().alloc(dest, proto_dest, extensible, ObjectBody::Plain))
        } else {
            None
        };

        let handler: Arc<dyn ProxyHandler> = dest_handler.clone();
        let wrapper = self.core.store.write().alloc(
            dest,
            None,
            true,
            ObjectBody::Wrapper(WrapperState {
                original,
                home_graph: home.to_string(),
                handler,
                revoked: false,
                local: PropertyMap::new(),
                tombstones: HashSet::new(),
                shadow,
            }),
        );
        Ok((wrapper, shadow))
    }

    fn run_listeners(
        &self,
        handler: &Arc<ObjectGraphHandler>,
        target: Value,
        proxy: Value,
        source: &str,
        dest: &str,
    ) -> Result<Value> {
        let snapshot = handler.snapshot_listeners();
        if snapshot.is_empty() {
            return Ok(proxy);
        }

        let mut meta = ProxyMeta::new(
            self,
            target,
            proxy,
            handler.clone(),
            source.to_string(),
            dest.to_string(),
        );
        for entry in snapshot {
            if meta.stopped() {
                break;
            }
            let result = (entry.callback)(&mut meta);
            if let Some(value) = meta.take_abort() {
                return Err(Error::ListenerAbort(value));
            }
            if let Err(e) = result {
                // an Err without throw_exception is a listener bug, not an
                // abort: record it and keep the remaining listeners running
                self.log(LogLevel::Error, &format!("proxy listener error: {e}"));
                handler.record_listener_error(e.to_string());
            }
        }
        Ok(meta.proxy())
    }

    pub(crate) fn rebind_wrapper_handler(
        &self,
        id: ObjectId,
        handler: Arc<dyn ProxyHandler>,
    ) -> Result<()> {
        let mut store = self.core.store.write();
        let rec = store.get_mut(id)?;
        match rec.wrapper_mut() {
            Some(w) => {
                w.handler = handler;
                Ok(())
            }
            None => Err(Error::TypeError {
                expected: "WRAPPER".into(),
                got: "OBJECT".into(),
            }),
        }
    }

    // ========================================================================
    // Revocation
    // ========================================================================

    /// Revoke every mapping touching `graph`: wrappers whose destination it
    /// is, and every foreign view of its native originals. Revoked wrappers
    /// fail all further operations with [`Error::RevokedWrapper`].
    pub fn revoke_everything(&self, graph: &str) -> Result<()> {
        if !self.core.graphs.read().contains_key(graph) {
            return Err(Error::UnknownGraph(graph.to_string()));
        }
        let doomed = self.core.mappings.write().take_touching(graph);
        let count = doomed.len();
        {
            let mut store = self.core.store.write();
            for view in doomed {
                if let Some(id) = view.value.as_object() {
                    if let Ok(rec) = store.get_mut(id) {
                        if let Some(w) = rec.wrapper_mut() {
                            w.revoked = true;
                        }
                    }
                }
            }
        }
        self.log(
            LogLevel::Debug,
            &format!("revoked {count} mappings touching graph '{graph}'"),
        );
        Ok(())
    }

    // ========================================================================
    // Object creation
    // ========================================================================

    pub(crate) fn create_object_in(&self, graph: &str, proto: Option<ObjectId>) -> Result<Value> {
        let id = self.core.store.write().alloc(graph, proto, true, ObjectBody::Plain);
        self.log(LogLevel::Debug, &format!("object created: {id} in graph '{graph}'"));
        Ok(Value::Object(id))
    }

    pub(crate) fn create_function_in(
        &self,
        graph: &str,
        arity: usize,
        native: NativeFn,
    ) -> Result<Value> {
        let id = {
            let mut store = self.core.store.write();
            let proto = store.alloc(graph, None, true, ObjectBody::Plain);
            let id = store.alloc(graph, None, true, ObjectBody::Function { arity, native });
            store.base_define(
                id,
                "prototype",
                PropertyDescriptor::data(Value::Object(proto)).non_enumerable(),
            )?;
            id
        };
        self.log(LogLevel::Debug, &format!("object created: {id} in graph '{graph}' (function)"));
        Ok(Value::Object(id))
    }

    pub(crate) fn create_map_in(&self, graph: &str) -> Result<Value> {
        fn receiver(this: &Value) -> Result<ObjectId> {
            this.as_object().ok_or_else(|| Error::TypeError {
                expected: "MAP".into(),
                got: this.type_name().into(),
            })
        }

        let map_id = self
            .core
            .store
            .write()
            .alloc(graph, None, true, ObjectBody::Map(hashbrown::HashMap::new()));

        let get_native: NativeFn = Arc::new(|m, this, args| {
            m.store().read().map_get(receiver(&this)?, args.first().unwrap_or(&Value::Null))
        });
        let has_native: NativeFn = Arc::new(|m, this, args| {
            let present =
                m.store().read().map_has(receiver(&this)?, args.first().unwrap_or(&Value::Null))?;
            Ok(Value::Bool(present))
        });
        let set_native: NativeFn = Arc::new(|m, this, args| {
            m.store().write().map_set(
                receiver(&this)?,
                args.first().unwrap_or(&Value::Null),
                args.get(1).cloned().unwrap_or(Value::Null),
            )?;
            Ok(this)
        });
        let delete_native: NativeFn = Arc::new(|m, this, args| {
            let removed = m
                .store()
                .write()
                .map_delete(receiver(&this)?, args.first().unwrap_or(&Value::Null))?;
            Ok(Value::Bool(removed))
        });

        for (name, arity, native) in [
            ("get", 1, get_native),
            ("has", 1, has_native),
            ("set", 2, set_native),
            ("delete", 1, delete_native),
        ] {
            let method = self.create_function_in(graph, arity, native)?;
            self.core
                .store
                .write()
                .base_define(map_id, name, PropertyDescriptor::data(method).non_enumerable())?;
        }

        self.log(LogLevel::Debug, &format!("object created: {map_id} in graph '{graph}' (map)"));
        Ok(Value::Object(map_id))
    }

    // ========================================================================
    // Dispatch plumbing
    // ========================================================================

    fn expect_object(&self, value: &Value, operation: &str) -> Result<ObjectId> {
        value.as_object().ok_or_else(|| Error::TypeError {
            expected: format!("OBJECT (for {operation})"),
            got: value.type_name().into(),
        })
    }

    /// Wrapper bookkeeping for dispatch, or None for a native record.
    /// A revoked wrapper fails here, before any trap runs.
    fn wrapper_parts(&self, id: ObjectId) -> Result<Option<WrapperParts>> {
        let store = self.core.store.read();
        let rec = store.get(id)?;
        match rec.wrapper() {
            Some(w) => {
                if w.revoked {
                    return Err(Error::RevokedWrapper { graph: rec.graph.clone() });
                }
                Ok(Some(WrapperParts {
                    original: w.original,
                    home: w.home_graph.clone(),
                    dest: rec.graph.clone(),
                    handler: w.handler.clone(),
                }))
            }
            None => Ok(None),
        }
    }

    fn trap_context<'m>(&'m self, wrapper: ObjectId, parts: &WrapperParts) -> TrapContext<'m> {
        TrapContext {
            membrane: self,
            wrapper,
            original: parts.original,
            home_graph: parts.home.clone(),
            dest_graph: parts.dest.clone(),
            handler: parts.handler.clone(),
        }
    }

    /// Does the destination graph's configuration intercept `op`? Operations
    /// outside the configured subset fall back to pass-through behavior.
    fn trap_enabled(&self, dest: &str, op: Operation) -> bool {
        self.core
            .graphs
            .read()
            .get(dest)
            .map(|h| h.distortions().trap_set().contains(op))
            .unwrap_or(true)
    }

    fn dispatch_handler<'a>(
        &self,
        parts: &'a WrapperParts,
        op: Operation,
    ) -> &'a dyn ProxyHandler {
        if self.trap_enabled(&parts.dest, op) {
            parts.handler.as_ref()
        } else {
            &PASS_THROUGH
        }
    }

    // ========================================================================
    // Accessor API: the 13 operations
    // ========================================================================

    /// Prototype of `target`, as a value (`Null` when there is none).
    pub fn get_prototype_of(&self, target: Value) -> Result<Value> {
        let id = self.expect_object(&target, "getPrototypeOf")?;
        match self.wrapper_parts(id)? {
            Some(parts) => {
                let cx = self.trap_context(id, &parts);
                self.dispatch_handler(&parts, Operation::GetPrototypeOf).get_prototype_of(&cx)
            }
            None => {
                let proto = self.core.store.read().base_get_prototype(id)?;
                Ok(proto.map(Value::Object).unwrap_or(Value::Null))
            }
        }
    }

    pub fn set_prototype_of(&self, target: Value, proto: Value) -> Result<bool> {
        let id = self.expect_object(&target, "setPrototypeOf")?;
        match self.wrapper_parts(id)? {
            Some(parts) => {
                let cx = self.trap_context(id, &parts);
                self.dispatch_handler(&parts, Operation::SetPrototypeOf)
                    .set_prototype_of(&cx, proto)
            }
            None => {
                let proto = match proto {
                    Value::Null => None,
                    Value::Object(p) => Some(p),
                    other => {
                        return Err(Error::TypeError {
                            expected: "OBJECT or NULL".into(),
                            got: other.type_name().into(),
                        });
                    }
                };
                self.core.store.write().base_set_prototype(id, proto)
            }
        }
    }

    pub fn is_extensible(&self, target: Value) -> Result<bool> {
        let id = self.expect_object(&target, "isExtensible")?;
        match self.wrapper_parts(id)? {
            Some(parts) => {
                let cx = self.trap_context(id, &parts);
                self.dispatch_handler(&parts, Operation::IsExtensible).is_extensible(&cx)
            }
            None => self.core.store.read().base_is_extensible(id),
        }
    }

    pub fn prevent_extensions(&self, target: Value) -> Result<bool> {
        let id = self.expect_object(&target, "preventExtensions")?;
        match self.wrapper_parts(id)? {
            Some(parts) => {
                let cx = self.trap_context(id, &parts);
                self.dispatch_handler(&parts, Operation::PreventExtensions)
                    .prevent_extensions(&cx)
            }
            None => self.core.store.write().base_prevent_extensions(id),
        }
    }

    pub fn get_own_property_descriptor(
        &self,
        target: Value,
        key: &str,
    ) -> Result<Option<PropertyDescriptor>> {
        let id = self.expect_object(&target, "getOwnPropertyDescriptor")?;
        match self.wrapper_parts(id)? {
            Some(parts) => {
                let cx = self.trap_context(id, &parts);
                self.dispatch_handler(&parts, Operation::GetOwnPropertyDescriptor)
                    .get_own_property_descriptor(&cx, key)
            }
            None => self.core.store.read().base_get_own(id, key),
        }
    }

    pub fn define_property(
        &self,
        target: Value,
        key: &str,
        desc: PropertyDescriptor,
    ) -> Result<bool> {
        let id = self.expect_object(&target, "defineProperty")?;
        match self.wrapper_parts(id)? {
            Some(parts) => {
                let cx = self.trap_context(id, &parts);
                self.dispatch_handler(&parts, Operation::DefineProperty)
                    .define_property(&cx, key, desc)
            }
            None => self.core.store.write().base_define(id, key, desc),
        }
    }

    pub fn has(&self, target: Value, key: &str) -> Result<bool> {
        let id = self.expect_object(&target, "has")?;
        match self.wrapper_parts(id)? {
            Some(parts) => {
                let cx = self.trap_context(id, &parts);
                self.dispatch_handler(&parts, Operation::Has).has(&cx, key)
            }
            None => self.chain_has(id, key),
        }
    }

    /// Read a property. Absent keys read as `Null`.
    pub fn get(&self, target: Value, key: &str) -> Result<Value> {
        let id = self.expect_object(&target, "get")?;
        match self.wrapper_parts(id)? {
            Some(parts) => {
                let cx = self.trap_context(id, &parts);
                self.dispatch_handler(&parts, Operation::Get).get(&cx, key)
            }
            None => Ok(self.chain_lookup(id, key)?.unwrap_or(Value::Null)),
        }
    }

    pub fn set(&self, target: Value, key: &str, value: Value) -> Result<bool> {
        let id = self.expect_object(&target, "set")?;
        match self.wrapper_parts(id)? {
            Some(parts) => {
                let cx = self.trap_context(id, &parts);
                self.dispatch_handler(&parts, Operation::Set).set(&cx, key, value)
            }
            None => self.core.store.write().base_set(id, key, value),
        }
    }

    pub fn delete_property(&self, target: Value, key: &str) -> Result<bool> {
        let id = self.expect_object(&target, "deleteProperty")?;
        match self.wrapper_parts(id)? {
            Some(parts) => {
                let cx = self.trap_context(id, &parts);
                self.dispatch_handler(&parts, Operation::DeleteProperty)
                    .delete_property(&cx, key)
            }
            None => self.core.store.write().base_delete(id, key),
        }
    }

    /// Own property keys, deterministically sorted.
    pub fn own_keys(&self, target: Value) -> Result<Vec<String>> {
        let id = self.expect_object(&target, "ownKeys")?;
        match self.wrapper_parts(id)? {
            Some(parts) => {
                let cx = self.trap_context(id, &parts);
                self.dispatch_handler(&parts, Operation::OwnKeys).own_keys(&cx)
            }
            None => self.core.store.read().base_own_keys(id),
        }
    }

    /// Invoke a callable. For a wrapper, arguments marshal into the callee's
    /// home graph and the result marshals back — one logical call however
    /// many boundaries it crosses.
    pub fn call(&self, target: Value, this: Value, args: &[Value]) -> Result<Value> {
        let id = self.expect_object(&target, "apply")?;
        match self.wrapper_parts(id)? {
            Some(parts) => {
                self.log(
                    LogLevel::Debug,
                    &format!("call enter: wrapper {id} ({} -> {})", parts.dest, parts.home),
                );
                let cx = self.trap_context(id, &parts);
                let rv = self.dispatch_handler(&parts, Operation::Apply).call(&cx, this, args);
                self.log(LogLevel::Debug, &format!("call exit: wrapper {id}"));
                rv
            }
            None => {
                let (native, graph) = {
                    let store = self.core.store.read();
                    let rec = store.get(id)?;
                    match &rec.body {
                        ObjectBody::Function { native, .. } => (native.clone(), rec.graph.clone()),
                        _ => {
                            return Err(Error::TypeError {
                                expected: "FUNCTION".into(),
                                got: "OBJECT".into(),
                            });
                        }
                    }
                };
                self.log(LogLevel::Debug, &format!("call enter: function {id} in '{graph}'"));
                let rv = native(self, this, args);
                self.log(LogLevel::Debug, &format!("call exit: function {id} in '{graph}'"));
                rv
            }
        }
    }

    /// Construct an instance. The new object is allocated in the callee's
    /// home graph with the callee's `prototype` property as its prototype;
    /// an object return value from the native takes precedence.
    pub fn construct(&self, target: Value, args: &[Value]) -> Result<Value> {
        let id = self.expect_object(&target, "construct")?;
        match self.wrapper_parts(id)? {
            Some(parts) => {
                let cx = self.trap_context(id, &parts);
                self.dispatch_handler(&parts, Operation::Construct).construct(&cx, args)
            }
            None => {
                let (native, graph, proto) = {
                    let store = self.core.store.read();
                    let rec = store.get(id)?;
                    match &rec.body {
                        ObjectBody::Function { native, .. } => {
                            let proto = rec
                                .properties
                                .get("prototype")
                                .and_then(|d| d.value.as_object());
                            (native.clone(), rec.graph.clone(), proto)
                        }
                        _ => {
                            return Err(Error::TypeError {
                                expected: "FUNCTION".into(),
                                got: "OBJECT".into(),
                            });
                        }
                    }
                };
                let instance = self.create_object_in(&graph, proto)?;
                let rv = self.call(target, instance.clone(), args)?;
                Ok(if rv.is_object() { rv } else { instance })
            }
        }
    }

    /// Convenience: `get` the named property of `target` and `call` it with
    /// `target` as the receiver.
    pub fn invoke(&self, target: Value, key: &str, args: &[Value]) -> Result<Value> {
        let method = self.get(target.clone(), key)?;
        self.call(method, target, args)
    }

    // ========================================================================
    // Prototype-chain walks (native side; wrapper links re-enter dispatch)
    // ========================================================================

    pub(crate) fn chain_lookup(&self, start: ObjectId, key: &str) -> Result<Option<Value>> {
        let mut cursor = Some(start);
        let mut hops = 0;
        while let Some(id) = cursor {
            if hops > PROTO_CHAIN_LIMIT {
                return Ok(None);
            }
            hops += 1;
            let (is_wrapper, own, proto) = {
                let store = self.core.store.read();
                let rec = store.get(id)?;
                (rec.is_wrapper(), rec.properties.get(key).cloned(), rec.prototype)
            };
            if is_wrapper {
                let target = Value::Object(id);
                if self.has(target.clone(), key)? {
                    return Ok(Some(self.get(target, key)?));
                }
                return Ok(None);
            }
            if let Some(desc) = own {
                return Ok(Some(desc.value));
            }
            cursor = proto;
        }
        Ok(None)
    }

    pub(crate) fn chain_has(&self, start: ObjectId, key: &str) -> Result<bool> {
        let mut cursor = Some(start);
        let mut hops = 0;
        while let Some(id) = cursor {
            if hops > PROTO_CHAIN_LIMIT {
                return Ok(false);
            }
            hops += 1;
            let (is_wrapper, own, proto) = {
                let store = self.core.store.read();
                let rec = store.get(id)?;
                (rec.is_wrapper(), rec.properties.contains_key(key), rec.prototype)
            };
            if is_wrapper {
                return self.has(Value::Object(id), key);
            }
            if own {
                return Ok(true);
            }
            cursor = proto;
        }
        Ok(false)
    }

    // ========================================================================
    // Wrapper-local state (storeUnknownAsLocal / requireLocalDelete / shadow)
    // ========================================================================

    fn with_wrapper<R>(
        &self,
        id: ObjectId,
        f: impl FnOnce(&WrapperState) -> R,
    ) -> Result<Option<R>> {
        let store = self.core.store.read();
        Ok(store.get(id)?.wrapper().map(f))
    }

    fn with_wrapper_mut<R>(
        &self,
        id: ObjectId,
        f: impl FnOnce(&mut WrapperState) -> R,
    ) -> Result<R> {
        let mut store = self.core.store.write();
        let rec = store.get_mut(id)?;
        rec.wrapper_mut().map(f).ok_or_else(|| Error::TypeError {
            expected: "WRAPPER".into(),
            got: "OBJECT".into(),
        })
    }

    pub(crate) fn wrapper_tombstoned(&self, id: ObjectId, key: &str) -> Result<bool> {
        Ok(self.with_wrapper(id, |w| w.tombstones.contains(key))?.unwrap_or(false))
    }

    pub(crate) fn wrapper_local_get(
        &self,
        id: ObjectId,
        key: &str,
    ) -> Result<Option<PropertyDescriptor>> {
        Ok(self.with_wrapper(id, |w| w.local.get(key).cloned())?.flatten())
    }

    pub(crate) fn wrapper_local_set(
        &self,
        id: ObjectId,
        key: &str,
        desc: PropertyDescriptor,
    ) -> Result<()> {
        self.with_wrapper_mut(id, |w| {
            w.tombstones.remove(key);
            w.local.insert(key.to_string(), desc);
        })
    }

    pub(crate) fn wrapper_local_remove(&self, id: ObjectId, key: &str) -> Result<bool> {
        self.with_wrapper_mut(id, |w| w.local.remove(key).is_some())
    }

    pub(crate) fn wrapper_local_delete(&self, id: ObjectId, key: &str) -> Result<()> {
        self.with_wrapper_mut(id, |w| {
            w.local.remove(key);
            w.tombstones.insert(key.to_string());
        })
    }

    pub(crate) fn wrapper_local_keys(
        &self,
        id: ObjectId,
    ) -> Result<(Vec<String>, HashSet<String>)> {
        Ok(self
            .with_wrapper(id, |w| (w.local.keys().cloned().collect(), w.tombstones.clone()))?
            .unwrap_or_default())
    }

    pub(crate) fn wrapper_shadow(&self, id: ObjectId) -> Result<Option<ObjectId>> {
        Ok(self.with_wrapper(id, |w| w.shadow)?.flatten())
    }

    /// Shared by the trap implementations: set the original's prototype and
    /// keep the shadow's in sync.
    pub(crate) fn set_wrapper_prototype(&self, cx: &TrapContext<'_>, proto: Value) -> Result<bool> {
        let proto_home = match cx.unwrap_in(proto.clone())? {
            Value::Null => None,
            Value::Object(p) => Some(p),
            other => {
                return Err(Error::TypeError {
                    expected: "OBJECT or NULL".into(),
                    got: other.type_name().into(),
                });
            }
        };
        let ok = self.core.store.write().base_set_prototype(cx.original, proto_home)?;
        if ok {
            if let Some(shadow) = self.wrapper_shadow(cx.wrapper)? {
                self.core.store.write().base_set_prototype(shadow, proto.as_object())?;
            }
        }
        Ok(ok)
    }

    /// Shared by the trap implementations: seal the original and the shadow.
    pub(crate) fn prevent_wrapper_extensions(&self, cx: &TrapContext<'_>) -> Result<bool> {
        let mut store = self.core.store.write();
        store.base_prevent_extensions(cx.original)?;
        if let Some(shadow) = store.get(cx.wrapper)?.wrapper().and_then(|w| w.shadow) {
            store.base_prevent_extensions(shadow)?;
        }
        Ok(true)
    }

    pub(crate) fn function_arity(&self, id: ObjectId) -> Result<usize> {
        let store = self.core.store.read();
        match &store.get(id)?.body {
            ObjectBody::Function { arity, .. } => Ok(*arity),
            _ => Ok(0),
        }
    }
}

struct WrapperParts {
    original: ObjectId,
    home: String,
    dest: String,
    handler: Arc<dyn ProxyHandler>,
}

// ============================================================================
// ModifyRules
// ============================================================================

/// Rules-modification facility reached through [`Membrane::modify_rules`].
pub struct ModifyRules<'m> {
    membrane: &'m Membrane,
}

impl ModifyRules<'_> {
    /// Derive a chain handler from a graph's base handler. Operations
    /// without an override delegate to the base; combine with
    /// `ProxyMeta::rebuild_proxy` to apply it to one conversion.
    pub fn create_chain_handler(&self, base: &Arc<ObjectGraphHandler>) -> ChainHandler {
        ChainHandler::new(base.clone())
    }

    /// Validate and install a distortion configuration on a named graph.
    pub fn replace_distortions(&self, graph: &str, config: DistortionsConfig) -> Result<()> {
        self.membrane.get_graph_handler(graph, false)?.set_distortions(config)
    }
}
