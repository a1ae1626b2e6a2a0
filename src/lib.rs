//! # rga-sync
//!
//! A Conflict-free Replicated Data Type (CRDT) replication engine for a
//! peer-to-peer collaborative plain-text editor: a tree-structured RGA, a
//! Lamport clock, a causal pending buffer, a sticky cursor anchor, a
//! gzip/chunked UDP transport, a broadcast discovery protocol, and an
//! anti-entropy loop that repairs divergence between replicas.
//!
//! The text-editor GUI widget, file I/O, and process entry point are
//! deliberately out of scope; this crate drives whatever implements
//! [`view::DocumentView`] and treats the network as a datagram pipe.
//!
//! ## Example
//!
//! ```rust
//! use rga_sync::crdt::{RgaStore, HEAD};
//! use rga_sync::crdt::types::{ClientId, OpId};
//!
//! let store = RgaStore::new();
//! let id = OpId::new(1, ClientId::from_raw("AAAA"));
//! store.apply_insert(HEAD.clone(), id, 'x');
//! assert_eq!(store.render(), "x");
//! ```

pub mod config;
pub mod crdt;
pub mod cursor;
pub mod error;
pub mod net;
pub mod view;

pub use crdt::{ClientId, HEAD, LamportClock, Node, OpId, RgaStore};
pub use cursor::CursorAnchor;
pub use error::{SessionError, TransportError};
pub use net::{Message, PendingInvite, Session, Transport, TransportSender};
pub use view::{BufferView, DocumentView, UnsavedWorkDecision};
