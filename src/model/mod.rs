//! # Membrane Value Model
//!
//! Pure DTOs shared by every layer: values, object handles, property
//! descriptors, and the 13-operation vocabulary.
//!
//! Design rule: no store state, no handler logic, no I/O here. These types
//! cross every boundary: store ↔ handlers ↔ membrane ↔ caller.

pub mod object;
pub mod operation;
pub mod value;

pub use object::{ObjectId, PropertyDescriptor, PropertyMap};
pub use operation::{ALL_OPERATIONS, Operation, TrapSet};
pub use value::{Value, ValueKey};
