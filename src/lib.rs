//! # membrane-rs — Object-Graph Membranes in Clean Rust
//!
//! Isolation boundaries between sets of objects: a value belonging to one
//! named graph can be exposed to another graph as a transparent,
//! identity-stable wrapper, without either side ever holding the other's
//! real references. Built for sandboxing, privilege separation, and test
//! mocking.
//!
//! ## Design Principles
//!
//! 1. **Trait-first**: [`ProxyHandler`] is the contract — one method per
//!    fundamental operation, thirteen in all
//! 2. **Opaque handles**: originals are [`ObjectId`]s in an arena; callers
//!    reach them only through the membrane's accessor API
//! 3. **Identity is sacred**: one wrapper per (original, destination graph)
//!    until revoked, O(1) in both directions
//! 4. **Distortions are data**: a JSON-serializable [`DistortionsConfig`]
//!    is the only exchanged artifact
//!
//! ## Quick Start
//!
//! ```rust
//! use membrane_rs::{Membrane, Value};
//!
//! # fn example() -> membrane_rs::Result<()> {
//! let membrane = Membrane::new();
//! let wet = membrane.get_graph_handler("wet", true)?;
//! let dry = membrane.get_graph_handler("dry", true)?;
//!
//! // a "wet" object with one property
//! let doc = wet.create_object()?;
//! membrane.set(doc.clone(), "title", Value::from("damp"))?;
//!
//! // expose it to the "dry" graph
//! let wrapper = membrane.convert_argument_to_proxy(&wet, &dry, doc.clone())?;
//! assert_ne!(wrapper, doc);
//! assert_eq!(membrane.get(wrapper, "title")?, Value::from("damp"));
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```
//!
//! ## Graphs and distortions
//!
//! | Concern | Type | Description |
//! |---------|------|-------------|
//! | Coordination | [`Membrane`] | registry, conversion, revocation |
//! | Interception | [`ObjectGraphHandler`] | per-graph 13-trap surface |
//! | Configuration | [`DistortionsConfig`] | filtering, trap subset, truncation |
//! | Observation | [`MembraneLogger`] | stable emission points |

// ============================================================================
// Modules
// ============================================================================

pub mod distortions;
pub mod handler;
pub mod listeners;
pub mod logging;
pub mod mappings;
pub mod membrane;
pub mod model;
pub mod store;

// ============================================================================
// Re-exports: Model (the DTOs)
// ============================================================================

pub use model::{
    ALL_OPERATIONS, ObjectId, Operation, PropertyDescriptor, PropertyMap, TrapSet, Value,
    ValueKey,
};

// ============================================================================
// Re-exports: Coordinator
// ============================================================================

pub use membrane::{Membrane, ModifyRules};

// ============================================================================
// Re-exports: Interception
// ============================================================================

pub use handler::{ChainHandler, ObjectGraphHandler, PassThroughHandler, ProxyHandler, TrapContext};
pub use listeners::{ListenerId, ProxyMeta};

// ============================================================================
// Re-exports: Configuration & identity
// ============================================================================

pub use distortions::{DistortionsConfig, TruncateArgList};
pub use mappings::{IdentityTable, ProxyMapping, ProxyView};

// ============================================================================
// Re-exports: Logging
// ============================================================================

pub use logging::{LogLevel, MembraneLogger, MemoryLogger};

// ============================================================================
// Re-exports: Store
// ============================================================================

pub use store::{NativeFn, ObjectStore};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Distortion schema violation; raised before any graph state changes.
    #[error("configuration error in `{field}`: {message}")]
    Configuration { field: &'static str, message: String },

    /// Graph never created and creation not requested.
    #[error("unknown object graph '{0}'")]
    UnknownGraph(String),

    /// Operation on a wrapper whose mapping was revoked.
    #[error("operation on a revoked wrapper in graph '{graph}'")]
    RevokedWrapper { graph: String },

    /// A proxy listener invoked `throw_exception`; carries the exact value.
    #[error("proxy listener aborted conversion: {0}")]
    ListenerAbort(Value),

    #[error("type error: expected {expected}, got {got}")]
    TypeError { expected: String, got: String },

    #[error("not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, Error>;
