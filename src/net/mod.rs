//! Transport, discovery, and session-dispatch layer.

pub mod discovery;
pub mod message;
pub mod session;
pub mod transport;

pub use discovery::{Membership, PeerRecord, local_broadcast_addresses};
pub use message::Message;
pub use session::{PendingInvite, Session};
pub use transport::{Transport, TransportSender};

/// Listen buffer floor and per-datagram fragmentation cap.
pub const MAX_DATAGRAM: usize = 32_000;
pub const LISTEN_BUFFER_MIN: usize = 65_535;
