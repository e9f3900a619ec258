//! # Distortion Configuration
//!
//! The plain-data schema that tells a graph handler how to distort the
//! wrappers it builds: which keys to hide, which of the 13 operations to
//! intercept, whether writes and deletes stay local to the wrapper, whether
//! to disguise a shadow target, and how many call arguments to forward.
//!
//! The schema is authored externally (a configuration editor emits it as
//! JSON) and consumed verbatim by the handlers, so this module owns eager
//! validation: [`DistortionsConfig::validate`] fails fast on the first
//! violated constraint, naming the offending field.

use serde::{Deserialize, Serialize};

use crate::model::{Operation, TrapSet};
use crate::{Error, Result};

// ============================================================================
// Schema
// ============================================================================

/// Per-graph distortion settings. JSON-serializable; the only persisted or
/// exchanged artifact of the membrane core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistortionsConfig {
    /// Schema version, `major.minor[.patch]`.
    pub format_version: String,
    /// Payload version, `major.minor[.patch]`.
    pub data_version: String,
    /// Keys to hide on wrappers, or None for no filtering.
    pub filter_own_keys: Option<Vec<String>>,
    /// Which of the 13 operations are intercepted. Names outside the
    /// vocabulary are rejected by `validate`.
    pub proxy_traps: Vec<String>,
    /// Apply `filter_own_keys` along the prototype chain as well.
    pub inherit_filter: bool,
    /// Record sets of unknown keys on the wrapper instead of the original.
    pub store_unknown_as_local: bool,
    /// Record deletes on the wrapper instead of the original.
    pub require_local_delete: bool,
    /// Disguise a placeholder sharing only prototype and extensibility.
    pub use_shadow_target: bool,
    /// Cap forwarded argument count for callable wrappers.
    pub truncate_arg_list: TruncateArgList,
}

/// `truncateArgList`: `false` forwards everything, `true` truncates to the
/// callee's declared arity, an integer caps at that many positions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TruncateArgList {
    Flag(bool),
    Limit(i64),
}

impl Default for TruncateArgList {
    fn default() -> Self {
        TruncateArgList::Flag(false)
    }
}

impl Default for DistortionsConfig {
    /// The identity configuration: every trap enabled, nothing distorted.
    fn default() -> Self {
        Self {
            format_version: "1.0".into(),
            data_version: "1.0".into(),
            filter_own_keys: None,
            proxy_traps: crate::model::ALL_OPERATIONS
                .iter()
                .map(|op| op.as_str().to_string())
                .collect(),
            inherit_filter: false,
            store_unknown_as_local: false,
            require_local_delete: false,
            use_shadow_target: false,
            truncate_arg_list: TruncateArgList::Flag(false),
        }
    }
}

// ============================================================================
// Validation
// ============================================================================

/// `^\d+\.\d+(?:\.\d)?$` — two dotted integers with an optional one-digit
/// patch component.
fn is_version_string(s: &str) -> bool {
    let parts: Vec<&str> = s.split('.').collect();
    match parts.as_slice() {
        [major, minor] => is_integer(major) && is_integer(minor),
        [major, minor, patch] => {
            is_integer(major)
                && is_integer(minor)
                && patch.len() == 1
                && patch.chars().all(|c| c.is_ascii_digit())
        }
        _ => false,
    }
}

fn is_integer(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

impl DistortionsConfig {
    /// Check every constraint, failing on the first violation.
    ///
    /// Handlers call this before accepting a configuration, so an invalid
    /// schema is rejected before any graph state is touched.
    pub fn validate(&self) -> Result<()> {
        if !is_version_string(&self.format_version) {
            return Err(Error::Configuration {
                field: "formatVersion",
                message: "must be a normal semantic versioning number".into(),
            });
        }
        if !is_version_string(&self.data_version) {
            return Err(Error::Configuration {
                field: "dataVersion",
                message: "must be a normal semantic versioning number".into(),
            });
        }

        if let Some(keys) = &self.filter_own_keys {
            let mut sorted = keys.clone();
            sorted.sort();
            for pair in sorted.windows(2) {
                if pair[0] == pair[1] {
                    return Err(Error::Configuration {
                        field: "filterOwnKeys",
                        message: format!("duplicate key \"{}\"", pair[0]),
                    });
                }
            }
        }

        let mut seen = TrapSet::EMPTY;
        for name in &self.proxy_traps {
            let Some(op) = Operation::parse(name) else {
                return Err(Error::Configuration {
                    field: "proxyTraps",
                    message: format!("unexpected value: {name}"),
                });
            };
            if seen.contains(op) {
                return Err(Error::Configuration {
                    field: "proxyTraps",
                    message: format!("duplicate string: {name}"),
                });
            }
            seen.insert(op);
        }

        if let TruncateArgList::Limit(n) = self.truncate_arg_list {
            if n < 0 {
                return Err(Error::Configuration {
                    field: "truncateArgList",
                    message: "must be a boolean or a non-negative integer".into(),
                });
            }
        }

        Ok(())
    }

    /// Parse a configuration from its JSON form — the editor's output is the
    /// only artifact exchanged with the outside — and validate it.
    pub fn from_json(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json).map_err(|e| Error::Configuration {
            field: "<document>",
            message: e.to_string(),
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Serialize back to the exchanged JSON form.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Configuration {
            field: "<document>",
            message: e.to_string(),
        })
    }

    /// The enabled-operation set. Assumes `validate` passed; unknown names
    /// are skipped.
    pub fn trap_set(&self) -> TrapSet {
        TrapSet::from_ops(self.proxy_traps.iter().filter_map(|s| Operation::parse(s)))
    }

    /// Is `key` hidden by `filterOwnKeys`?
    pub fn is_key_filtered(&self, key: &str) -> bool {
        self.filter_own_keys
            .as_ref()
            .is_some_and(|keys| keys.iter().any(|k| k == key))
    }

    /// Argument cap for a callable of the given declared arity, if any.
    pub fn arg_limit(&self, arity: usize) -> Option<usize> {
        match self.truncate_arg_list {
            TruncateArgList::Flag(false) => None,
            TruncateArgList::Flag(true) => Some(arity),
            TruncateArgList::Limit(n) => Some(n as usize),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
