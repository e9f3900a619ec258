//! # Proxy Listener Pipeline
//!
//! Listeners observe or override wrapper construction. Each conversion that
//! builds a wrapper creates one [`ProxyMeta`], shares it with every listener
//! registered on the destination handler (snapshotted, registration order),
//! and returns whatever `meta.proxy()` holds afterwards.
//!
//! Pipeline policy: the listener list is snapshotted when dispatch starts —
//! registrations or removals made by a running listener apply from the next
//! conversion, never mid-dispatch.

use std::sync::Arc;

use crate::handler::ProxyHandler;
use crate::membrane::Membrane;
use crate::model::Value;
use crate::{Error, Result};

/// Callback signature. Returning `Err` without calling
/// [`ProxyMeta::throw_exception`] counts as a listener bug: it is recorded
/// and the pipeline continues.
pub type ListenerFn = dyn Fn(&mut ProxyMeta<'_>) -> Result<()> + Send + Sync;

/// Handle returned by `add_proxy_listener`, used to remove the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u64);

pub(crate) struct ListenerEntry {
    pub id: ListenerId,
    pub callback: Arc<ListenerFn>,
}

impl Clone for ListenerEntry {
    fn clone(&self) -> Self {
        Self { id: self.id, callback: self.callback.clone() }
    }
}

// ============================================================================
// ProxyMeta
// ============================================================================

/// Scratch record shared by the listeners of one conversion. Discarded once
/// the proxy is returned; nothing here persists.
pub struct ProxyMeta<'m> {
    membrane: &'m Membrane,
    target: Value,
    proxy: Value,
    handler: Arc<dyn ProxyHandler>,
    source_graph: String,
    dest_graph: String,
    stopped: bool,
    abort: Option<Value>,
}

impl<'m> ProxyMeta<'m> {
    pub(crate) fn new(
        membrane: &'m Membrane,
        target: Value,
        proxy: Value,
        handler: Arc<dyn ProxyHandler>,
        source_graph: String,
        dest_graph: String,
    ) -> Self {
        Self {
            membrane,
            target,
            proxy,
            handler,
            source_graph,
            dest_graph,
            stopped: false,
            abort: None,
        }
    }

    /// The unwrapped original being converted.
    pub fn target(&self) -> Value {
        self.target.clone()
    }

    /// What the conversion will return — initially the built wrapper.
    pub fn proxy(&self) -> Value {
        self.proxy.clone()
    }

    /// Override the conversion result: a primitive, an unrelated object, or
    /// the raw unwrapped original. The identity table is refreshed with the
    /// final value when the pipeline ends.
    pub fn set_proxy(&mut self, value: Value) {
        self.proxy = value;
    }

    /// The handler the wrapper dispatches through.
    pub fn handler(&self) -> Arc<dyn ProxyHandler> {
        self.handler.clone()
    }

    /// Swap in a derived handler (usually a chain handler); takes effect on
    /// the wrapper after [`rebuild_proxy`](Self::rebuild_proxy).
    pub fn set_handler(&mut self, handler: Arc<dyn ProxyHandler>) {
        self.handler = handler;
    }

    pub fn source_graph(&self) -> &str {
        &self.source_graph
    }

    pub fn dest_graph(&self) -> &str {
        &self.dest_graph
    }

    pub fn stopped(&self) -> bool {
        self.stopped
    }

    /// Skip the listeners registered after this one for this event. The
    /// wrapper is still returned.
    pub fn stop_iteration(&mut self) {
        self.stopped = true;
    }

    /// Abort the conversion: the driving call returns
    /// [`Error::ListenerAbort`] carrying exactly `value`, and no mapping
    /// survives for this (original, destination) pair.
    pub fn throw_exception(&mut self, value: Value) {
        self.stopped = true;
        self.abort = Some(value);
    }

    /// Rebind the current wrapper to [`handler`](Self::handler), preserving
    /// the identity mapping. Fails if a listener already replaced the proxy
    /// with something that is not a wrapper.
    pub fn rebuild_proxy(&mut self) -> Result<()> {
        let id = self.proxy.as_object().ok_or_else(|| Error::TypeError {
            expected: "WRAPPER".into(),
            got: self.proxy.type_name().into(),
        })?;
        self.membrane.rebind_wrapper_handler(id, self.handler.clone())
    }

    pub(crate) fn take_abort(&mut self) -> Option<Value> {
        self.abort.take()
    }
}
