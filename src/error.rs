//! Typed error taxonomy.
//!
//! Almost nothing here is fatal: transport and decode failures are logged
//! and dropped, never propagated into a panic or a corrupted store. These
//! types exist so call sites can log with context rather than reaching
//! for `&str`.

use thiserror::Error;

/// Failures from the datagram transport: encoding, compression, and
/// fragmentation/reassembly.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to serialize message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to decode datagram as JSON or gzip+JSON")]
    Decode,

    #[error("chunk payload was not valid base64")]
    InvalidChunkEncoding,

    #[error("socket operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoded message exceeds the datagram cap even after fragmentation")]
    MessageTooLarge,
}

/// Failures surfaced by the session controller while dispatching a message.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("no local IPv4 broadcast interface is available; discovery is disabled")]
    NoBroadcastInterface,

    #[error("the document has unsaved local work; join was cancelled")]
    JoinCancelled,
}
