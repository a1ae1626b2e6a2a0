//! CRDT (Conflict-free Replicated Data Type) implementation module.
//!
//! This module contains the RGA (Replicated Growable Array) CRDT implementation
//! and all its supporting types and structures.

pub mod node;
pub mod pending;
pub mod rga;
pub mod snapshot;
pub mod types;

// Re-export the main public API
pub use node::Node;
pub use pending::{PendingBuffer, PendingOp};
pub use rga::RgaStore;
pub use snapshot::{NodeRecord, Snapshot};
pub use types::{ClientId, HEAD, LamportClock, OpId};
