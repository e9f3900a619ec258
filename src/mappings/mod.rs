//! # Identity Table
//!
//! The registry that makes wrappers identity-stable: one [`ProxyMapping`] per
//! original, one [`ProxyView`] per destination graph. Repeated conversions of
//! the same (original, destination) pair hit the same view until it is
//! revoked.
//!
//! The table stores handles, never owning references — the arena owns the
//! records, so an entry cannot keep an otherwise-unreachable original alive.
//! Reverse lookup (wrapper → original) goes through the wrapper's own
//! back-pointer, not a scan of this table.

use hashbrown::HashMap;

use crate::model::{ObjectId, Value};

/// One destination graph's view of an original.
#[derive(Debug, Clone)]
pub struct ProxyView {
    /// The wrapper — or whatever a proxy listener substituted for it.
    pub value: Value,
    /// Shadow-target handle, when the destination graph disguises one.
    pub shadow: Option<ObjectId>,
}

/// All views of one original, keyed by destination graph name.
#[derive(Debug)]
pub struct ProxyMapping {
    pub original: ObjectId,
    pub home_graph: String,
    views: HashMap<String, ProxyView>,
}

impl ProxyMapping {
    pub fn view(&self, graph: &str) -> Option<&ProxyView> {
        self.views.get(graph)
    }

    pub fn graphs(&self) -> impl Iterator<Item = &str> {
        self.views.keys().map(String::as_str)
    }
}

// ============================================================================
// IdentityTable
// ============================================================================

/// Membrane-wide view registry.
#[derive(Debug, Default)]
pub struct IdentityTable {
    by_original: HashMap<ObjectId, ProxyMapping>,
}

impl IdentityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached view value for (original, destination), if any.
    pub fn view(&self, original: ObjectId, dest: &str) -> Option<Value> {
        self.by_original
            .get(&original)
            .and_then(|m| m.views.get(dest))
            .map(|v| v.value.clone())
    }

    pub fn has_view(&self, original: ObjectId, dest: &str) -> bool {
        self.by_original
            .get(&original)
            .is_some_and(|m| m.views.contains_key(dest))
    }

    /// Register a view, creating the mapping on first contact. At most one
    /// live view per (original, destination): inserting over an existing view
    /// replaces it.
    pub fn insert_view(
        &mut self,
        original: ObjectId,
        home_graph: &str,
        dest: &str,
        view: ProxyView,
    ) {
        self.by_original
            .entry(original)
            .or_insert_with(|| ProxyMapping {
                original,
                home_graph: home_graph.to_string(),
                views: HashMap::new(),
            })
            .views
            .insert(dest.to_string(), view);
    }

    /// Update a view in place (listener overrides). No-op if absent.
    pub fn refresh_view(&mut self, original: ObjectId, dest: &str, value: Value) {
        if let Some(view) = self
            .by_original
            .get_mut(&original)
            .and_then(|m| m.views.get_mut(dest))
        {
            view.value = value;
        }
    }

    /// Remove one view; drops the whole mapping when no views remain.
    pub fn remove_view(&mut self, original: ObjectId, dest: &str) -> Option<ProxyView> {
        let mapping = self.by_original.get_mut(&original)?;
        let removed = mapping.views.remove(dest);
        if mapping.views.is_empty() {
            self.by_original.remove(&original);
        }
        removed
    }

    /// Tear out every view touching `graph` — views *into* it, and every
    /// view of an original whose home it is. Returns the removed views so the
    /// caller can run their revoke actions.
    pub fn take_touching(&mut self, graph: &str) -> Vec<ProxyView> {
        let mut doomed = Vec::new();
        self.by_original.retain(|_, mapping| {
            if mapping.home_graph == graph {
                doomed.extend(mapping.views.drain().map(|(_, v)| v));
                return false;
            }
            if let Some(view) = mapping.views.remove(graph) {
                doomed.push(view);
            }
            !mapping.views.is_empty()
        });
        doomed
    }

    pub fn len(&self) -> usize {
        self.by_original.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_original.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================
