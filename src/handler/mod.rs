//! # Interception Surface
//!
//! [`ProxyHandler`] is THE contract of the membrane: one method per
//! fundamental object operation, thirteen in all. Anything that stands
//! between a caller and an original implements it — the per-graph
//! [`ObjectGraphHandler`], derived [`ChainHandler`]s, and the
//! [`PassThroughHandler`] used for operations a configuration chose not to
//! intercept.
//!
//! Every trap receives a [`TrapContext`] naming the wrapper, the unwrapped
//! original, and the two graphs involved. The contract for implementors:
//! perform the operation against the original in its home graph, and convert
//! every value that crosses — results outward (home → destination),
//! call/construct arguments inward (destination → home).

pub mod chain;
pub mod graph;

use std::sync::Arc;

use crate::membrane::Membrane;
use crate::model::{ObjectId, PropertyDescriptor, Value};
use crate::Result;

pub use chain::ChainHandler;
pub use graph::ObjectGraphHandler;

// ============================================================================
// Trap context
// ============================================================================

/// Everything a trap needs to know about the operation it is mediating.
pub struct TrapContext<'m> {
    pub membrane: &'m Membrane,
    /// The wrapper the caller is operating on.
    pub wrapper: ObjectId,
    /// The unwrapped original in its home graph.
    pub original: ObjectId,
    /// Graph the original belongs to.
    pub home_graph: String,
    /// Graph the wrapper belongs to — the caller's side.
    pub dest_graph: String,
    /// The wrapper's current top handler (a chain handler after a rebuild).
    /// Traps route through this so derived overrides compose.
    pub handler: Arc<dyn ProxyHandler>,
}

impl TrapContext<'_> {
    /// Convert a result outward: home graph → destination graph.
    pub fn wrap_out(&self, value: Value) -> Result<Value> {
        self.membrane.convert_value(&self.home_graph, &self.dest_graph, value)
    }

    /// Convert an argument inward: destination graph → home graph.
    pub fn unwrap_in(&self, value: Value) -> Result<Value> {
        self.membrane.convert_value(&self.dest_graph, &self.home_graph, value)
    }
}

// ============================================================================
// ProxyHandler trait
// ============================================================================

/// The 13-operation interception surface.
///
/// The trait is a fixed virtual table: implementors either mediate an
/// operation or delegate it. There is deliberately no way to add a
/// fourteenth operation.
pub trait ProxyHandler: Send + Sync {
    fn get_prototype_of(&self, cx: &TrapContext<'_>) -> Result<Value>;
    fn set_prototype_of(&self, cx: &TrapContext<'_>, proto: Value) -> Result<bool>;
    fn is_extensible(&self, cx: &TrapContext<'_>) -> Result<bool>;
    fn prevent_extensions(&self, cx: &TrapContext<'_>) -> Result<bool>;
    fn get_own_property_descriptor(
        &self,
        cx: &TrapContext<'_>,
        key: &str,
    ) -> Result<Option<PropertyDescriptor>>;
    fn define_property(
        &self,
        cx: &TrapContext<'_>,
        key: &str,
        desc: PropertyDescriptor,
    ) -> Result<bool>;
    fn has(&self, cx: &TrapContext<'_>, key: &str) -> Result<bool>;
    fn get(&self, cx: &TrapContext<'_>, key: &str) -> Result<Value>;
    fn set(&self, cx: &TrapContext<'_>, key: &str, value: Value) -> Result<bool>;
    fn delete_property(&self, cx: &TrapContext<'_>, key: &str) -> Result<bool>;
    fn own_keys(&self, cx: &TrapContext<'_>) -> Result<Vec<String>>;
    fn call(&self, cx: &TrapContext<'_>, this: Value, args: &[Value]) -> Result<Value>;
    fn construct(&self, cx: &TrapContext<'_>, args: &[Value]) -> Result<Value>;
}

// ============================================================================
// Pass-through (default) behavior
// ============================================================================

/// The default implementation, used when a graph's `proxyTraps` excludes an
/// operation: no distortions, but crossed values are still converted so no
/// raw foreign reference ever escapes.
///
/// Structural inspection (prototype, extensibility, descriptors, key
/// enumeration) consults the shadow target when the wrapper carries one, so
/// a disguised wrapper never exposes the real original's structure through a
/// non-intercepted path.
pub struct PassThroughHandler;

pub(crate) static PASS_THROUGH: PassThroughHandler = PassThroughHandler;

impl ProxyHandler for PassThroughHandler {
    fn get_prototype_of(&self, cx: &TrapContext<'_>) -> Result<Value> {
        if let Some(shadow) = cx.membrane.wrapper_shadow(cx.wrapper)? {
            let proto = cx.membrane.store().read().base_get_prototype(shadow)?;
            return Ok(proto.map(Value::Object).unwrap_or(Value::Null));
        }
        let proto = cx.membrane.store().read().base_get_prototype(cx.original)?;
        cx.wrap_out(proto.map(Value::Object).unwrap_or(Value::Null))
    }

    fn set_prototype_of(&self, cx: &TrapContext<'_>, proto: Value) -> Result<bool> {
        cx.membrane.set_wrapper_prototype(cx, proto)
    }

    fn is_extensible(&self, cx: &TrapContext<'_>) -> Result<bool> {
        let target = cx.membrane.wrapper_shadow(cx.wrapper)?.unwrap_or(cx.original);
        cx.membrane.store().read().base_is_extensible(target)
    }

    fn prevent_extensions(&self, cx: &TrapContext<'_>) -> Result<bool> {
        cx.membrane.prevent_wrapper_extensions(cx)
    }

    fn get_own_property_descriptor(
        &self,
        cx: &TrapContext<'_>,
        key: &str,
    ) -> Result<Option<PropertyDescriptor>> {
        if let Some(shadow) = cx.membrane.wrapper_shadow(cx.wrapper)? {
            return cx.membrane.store().read().base_get_own(shadow, key);
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
        mut desc: PropertyDescriptor,
    ) -> Result<bool> {
        desc.value = cx.unwrap_in(desc.value)?;
        cx.membrane.store().write().base_define(cx.original, key, desc)
    }

    fn has(&self, cx: &TrapContext<'_>, key: &str) -> Result<bool> {
        cx.membrane.chain_has(cx.original, key)
    }

    fn get(&self, cx: &TrapContext<'_>, key: &str) -> Result<Value> {
        match cx.membrane.chain_lookup(cx.original, key)? {
            Some(raw) => cx.wrap_out(raw),
            None => Ok(Value::Null),
        }
    }

    fn set(&self, cx: &TrapContext<'_>, key: &str, value: Value) -> Result<bool> {
        let value = cx.unwrap_in(value)?;
        cx.membrane.store().write().base_set(cx.original, key, value)
    }

    fn delete_property(&self, cx: &TrapContext<'_>, key: &str) -> Result<bool> {
        cx.membrane.store().write().base_delete(cx.original, key)
    }

    fn own_keys(&self, cx: &TrapContext<'_>) -> Result<Vec<String>> {
        let target = cx.membrane.wrapper_shadow(cx.wrapper)?.unwrap_or(cx.original);
        cx.membrane.store().read().base_own_keys(target)
    }

    fn call(&self, cx: &TrapContext<'_>, this: Value, args: &[Value]) -> Result<Value> {
        let this = cx.unwrap_in(this)?;
        let args = cx.membrane.convert_all(&cx.dest_graph, &cx.home_graph, args)?;
        let rv = cx.membrane.call(Value::Object(cx.original), this, &args)?;
        cx.wrap_out(rv)
    }

    fn construct(&self, cx: &TrapContext<'_>, args: &[Value]) -> Result<Value> {
        let args = cx.membrane.convert_all(&cx.dest_graph, &cx.home_graph, args)?;
        let rv = cx.membrane.construct(Value::Object(cx.original), &args)?;
        cx.wrap_out(rv)
    }
}
