//! Operation identifier implementation for RGA nodes.
//!
//! This module contains the `OpId` struct which serves as a globally unique
//! identifier for each node in the RGA, providing both identity and the
//! deterministic tie-break order used to sort concurrent siblings.

use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

use serde::de::{self, SeqAccess, Visitor};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::crdt::types::client::ClientId;

/// A unique identifier for each character/node in the RGA: a Lamport counter
/// paired with the id of the replica that generated it.
///
/// `OpId` is totally ordered first by `counter`, then by `client`. The RGA
/// tree keeps children of the same parent in **descending** `OpId` order,
/// so `Ord` here gives ascending order and call sites that need the tree's
/// tie-break sort descending explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OpId {
    pub counter: u64,
    pub client: ClientId,
}

// The wire protocol encodes an OpId as the two-element array
// `[counter, client_id]`, not as a `{counter, client}` object, so Serialize
// and Deserialize are hand-rolled rather than derived.
impl Serialize for OpId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(2))?;
        seq.serialize_element(&self.counter)?;
        seq.serialize_element(self.client.as_str())?;
        seq.end()
    }
}

impl<'de> Deserialize<'de> for OpId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OpIdVisitor;

        impl<'de> Visitor<'de> for OpIdVisitor {
            type Value = OpId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a two-element array [counter, client_id]")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<OpId, A::Error> {
                let counter: u64 = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(0, &self))?;
                let client: String = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(1, &self))?;
                Ok(OpId::new(counter, ClientId::from_raw(client)))
            }
        }

        deserializer.deserialize_seq(OpIdVisitor)
    }
}

impl OpId {
    pub fn new(counter: u64, client: ClientId) -> Self {
        OpId { counter, client }
    }

    /// True for the sentinel root of the insertion tree.
    pub fn is_head(&self) -> bool {
        *self == *HEAD
    }
}

impl PartialOrd for OpId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.counter
            .cmp(&other.counter)
            .then_with(|| self.client.cmp(&other.client))
    }
}

/// The sentinel root of the insertion tree. Distinguishable from any
/// generated id because `ClientId::generate` never produces the literal
/// string `"HEAD"`.
pub static HEAD: LazyLock<OpId> = LazyLock::new(|| OpId {
    counter: 0,
    client: ClientId::from_raw("HEAD"),
});
