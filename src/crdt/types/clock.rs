//! Lamport clock implementation for generating operation identifiers.
//!
//! This module contains the `LamportClock` struct, which produces the
//! monotone logical counter underlying every `OpId`.

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use crate::crdt::types::client::ClientId;
use crate::crdt::types::op_id::OpId;

/// Generates `OpId`s for one replica and tracks causal knowledge of the rest.
///
/// `tick`/`observe` are kept atomic (rather than a bare `u64`) so the type
/// stays `Sync`, even though in practice both calls run on the single
/// writer (the session task).
pub struct LamportClock {
    counter: AtomicU64,
    client: ClientId,
}

impl LamportClock {
    pub fn new(client: ClientId) -> Self {
        LamportClock {
            counter: AtomicU64::new(0),
            client,
        }
    }

    /// Pre-increments the counter and returns a fresh `OpId` for a local op.
    pub fn next_op_id(&self) -> OpId {
        let counter = self.counter.fetch_add(1, AtomicOrdering::SeqCst) + 1;
        OpId::new(counter, self.client.clone())
    }

    /// Advances the local counter to at least `remote_counter`, called
    /// before applying every inbound insert/delete so the clock never falls
    /// behind what a peer has already observed.
    pub fn observe(&self, remote_counter: u64) {
        let mut current = self.counter.load(AtomicOrdering::SeqCst);
        while current < remote_counter {
            match self.counter.compare_exchange_weak(
                current,
                remote_counter,
                AtomicOrdering::SeqCst,
                AtomicOrdering::SeqCst,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
    }

    pub fn current_counter(&self) -> u64 {
        self.counter.load(AtomicOrdering::SeqCst)
    }

    pub fn client(&self) -> &ClientId {
        &self.client
    }
}
