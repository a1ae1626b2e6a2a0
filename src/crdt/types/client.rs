//! Client identifier type and related functionality.
//!
//! This module contains the definition of `ClientId`, which uniquely identifies
//! each participant (replica) in the distributed CRDT system.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An 8-hex-character identifier assigned to a replica at startup.
///
/// Uniqueness is probabilistic, not negotiated with peers: it is derived
/// from the low 32 bits of a random UUIDv4.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClientId(String);

impl ClientId {
    /// Generates a fresh, probabilistically-unique client id.
    pub fn generate() -> Self {
        let uuid = Uuid::new_v4();
        ClientId(uuid.simple().to_string()[..8].to_string())
    }

    /// Wraps an existing string as a client id without validation.
    ///
    /// Used for the `HEAD` sentinel and for deserializing wire messages.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        ClientId(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
