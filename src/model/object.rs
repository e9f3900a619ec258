//! Object handles and property descriptors.

use serde::{Deserialize, Serialize};

use super::Value;

/// Opaque object identifier — a stable handle into the object store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectId(pub u64);

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A map of property names to descriptors — the property bag carried by every
/// object record and by wrapper-local storage.
pub type PropertyMap = hashbrown::HashMap<String, PropertyDescriptor>;

/// Data property descriptor.
///
/// This reimplementation models data descriptors only; there are no accessor
/// pairs. `writable` gates `set`, `enumerable` gates nothing yet but is kept
/// for schema fidelity, `configurable` gates redefinition and deletion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    pub value: Value,
    pub writable: bool,
    pub enumerable: bool,
    pub configurable: bool,
}

impl PropertyDescriptor {
    /// A fully permissive data descriptor, the default for plain assignment.
    pub fn data(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            writable: true,
            enumerable: true,
            configurable: true,
        }
    }

    /// A frozen descriptor: not writable, not configurable.
    pub fn frozen(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            writable: false,
            enumerable: true,
            configurable: false,
        }
    }

    pub fn non_enumerable(mut self) -> Self {
        self.enumerable = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_builders() {
        let d = PropertyDescriptor::data(3i64);
        assert!(d.writable && d.enumerable && d.configurable);

        let f = PropertyDescriptor::frozen("x");
        assert!(!f.writable && !f.configurable);

        let n = PropertyDescriptor::data(1i64).non_enumerable();
        assert!(!n.enumerable);
    }
}
