//! Pending buffer for causally-premature remote operations.

use crate::crdt::rga::RgaStore;
use crate::crdt::types::OpId;

/// A remote operation whose causal predecessor has not yet been applied.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingOp {
    Insert { after: OpId, id: OpId, ch: char },
    Delete { id: OpId },
}

/// Holds operations buffered by [`RgaStore::apply_insert`] /
/// [`RgaStore::apply_delete`] returning `false` because a dependency is
/// missing. `flush` absorbs arbitrary fan-in of reordered deliveries.
#[derive(Debug, Default)]
pub struct PendingBuffer {
    ops: Vec<PendingOp>,
}

impl PendingBuffer {
    pub fn new() -> Self {
        PendingBuffer { ops: Vec::new() }
    }

    pub fn push(&mut self, op: PendingOp) {
        self.ops.push(op);
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// A snapshot load replaces the whole state, so whatever this buffer
    /// held is presumed lost or already merged.
    pub fn clear(&mut self) {
        self.ops.clear();
    }

    /// Retries every buffered op against `store` until a full pass makes no
    /// progress. Termination is guaranteed: each pass either shrinks the
    /// buffer or leaves it unchanged, in which case the loop stops.
    pub fn flush(&mut self, store: &RgaStore) {
        loop {
            let before = self.ops.len();
            let mut remaining = Vec::with_capacity(self.ops.len());

            for op in self.ops.drain(..) {
                let applied = match &op {
                    PendingOp::Insert { after, id, ch } => {
                        store.apply_insert(after.clone(), id.clone(), *ch)
                    }
                    PendingOp::Delete { id } => store.apply_delete(id.clone()),
                };
                if !applied {
                    remaining.push(op);
                }
            }

            self.ops = remaining;
            if self.ops.len() == before {
                break;
            }
        }
    }
}
