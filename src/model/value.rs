//! Universal value type for everything that crosses a graph boundary.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::ObjectId;

/// A membrane-visible value.
///
/// Five primitive kinds plus `Object`. Primitives are plain data: they cross
/// graph boundaries unwrapped and untracked. `Object` is an opaque handle into
/// the membrane's object store — the only kind the membrane ever wraps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Object(ObjectId),
}

// ============================================================================
// Type checking
// ============================================================================

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Bool(_) => "BOOLEAN",
            Value::Int(_) => "INTEGER",
            Value::Float(_) => "FLOAT",
            Value::String(_) => "STRING",
            Value::Object(_) => "OBJECT",
        }
    }

    pub fn is_null(&self) -> bool { matches!(self, Value::Null) }
    pub fn is_object(&self) -> bool { matches!(self, Value::Object(_)) }

    /// Everything except `Object` passes through a membrane untouched.
    pub fn is_primitive(&self) -> bool { !self.is_object() }

    /// Attempt to extract the object handle.
    pub fn as_object(&self) -> Option<ObjectId> {
        match self {
            Value::Object(id) => Some(*id),
            _ => None,
        }
    }

    /// Attempt to extract as i64
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    /// Attempt to extract as f64
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Attempt to extract as &str
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

// ============================================================================
// Conversions (From impls)
// ============================================================================

impl From<bool> for Value { fn from(v: bool) -> Self { Value::Bool(v) } }
impl From<i32> for Value { fn from(v: i32) -> Self { Value::Int(v as i64) } }
impl From<i64> for Value { fn from(v: i64) -> Self { Value::Int(v) } }
impl From<f64> for Value { fn from(v: f64) -> Self { Value::Float(v) } }
impl From<String> for Value { fn from(v: String) -> Self { Value::String(v) } }
impl From<&str> for Value { fn from(v: &str) -> Self { Value::String(v.to_owned()) } }
impl From<ObjectId> for Value { fn from(v: ObjectId) -> Self { Value::Object(v) } }
impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self { v.map(Into::into).unwrap_or(Value::Null) }
}

// ============================================================================
// Display
// ============================================================================

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::String(s) => write!(f, "\"{}\"", s.replace('"', "\\\"")),
            Value::Object(id) => write!(f, "<object {id}>"),
        }
    }
}

// ============================================================================
// Identity keys (for map-like containers)
// ============================================================================

/// Hashable identity projection of a [`Value`].
///
/// Objects compare by handle, floats by bit pattern. Used as the key type of
/// map-like containers so has/get/set/delete follow value identity the way a
/// host container would.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueKey {
    Null,
    Bool(bool),
    Int(i64),
    Float(u64),
    String(String),
    Object(ObjectId),
}

impl From<&Value> for ValueKey {
    fn from(v: &Value) -> Self {
        match v {
            Value::Null => ValueKey::Null,
            Value::Bool(b) => ValueKey::Bool(*b),
            Value::Int(i) => ValueKey::Int(*i),
            Value::Float(f) => ValueKey::Float(f.to_bits()),
            Value::String(s) => ValueKey::String(s.clone()),
            Value::Object(id) => ValueKey::Object(*id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_from() {
        assert_eq!(Value::from("hello"), Value::String("hello".into()));
        assert_eq!(Value::from(42), Value::Int(42));
        assert_eq!(Value::from(true), Value::Bool(true));
        assert_eq!(Value::from(ObjectId(7)), Value::Object(ObjectId(7)));
    }

    #[test]
    fn test_primitive_classification() {
        assert!(Value::Null.is_primitive());
        assert!(Value::from(1.5).is_primitive());
        assert!(!Value::Object(ObjectId(1)).is_primitive());
    }

    #[test]
    fn test_value_key_identity() {
        let a = Value::Object(ObjectId(3));
        let b = Value::Object(ObjectId(3));
        assert_eq!(ValueKey::from(&a), ValueKey::from(&b));
        assert_ne!(ValueKey::from(&a), ValueKey::from(&Value::Object(ObjectId(4))));
        assert_eq!(ValueKey::from(&Value::from(2.5)), ValueKey::from(&Value::from(2.5)));
    }
}
