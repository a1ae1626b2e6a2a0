//! Cursor anchor: tracks the caret as a stable node identity rather than an
//! integer offset, so the caret survives remote inserts/deletes elsewhere in
//! the document.

use crate::crdt::rga::RgaStore;
use crate::crdt::types::{HEAD, OpId};

/// The node immediately to the caret's left, or [`HEAD`] when the caret sits
/// at the very start of the document.
#[derive(Debug, Clone, PartialEq)]
pub struct CursorAnchor {
    anchor: OpId,
}

impl Default for CursorAnchor {
    fn default() -> Self {
        Self::new()
    }
}

impl CursorAnchor {
    pub fn new() -> Self {
        CursorAnchor { anchor: HEAD.clone() }
    }

    pub fn anchor(&self) -> &OpId {
        &self.anchor
    }

    pub fn set_anchor(&mut self, anchor: OpId) {
        self.anchor = anchor;
    }

    /// Re-derives the anchor from an integer caret position reported by the
    /// view, e.g. after the user clicks or uses the arrow keys.
    pub fn update_from_caret(&mut self, pos: usize, store: &RgaStore) {
        if pos == 0 {
            self.anchor = HEAD.clone();
            return;
        }
        let map = store.visible_id_map();
        self.anchor = if pos <= map.len() {
            map[pos - 1].clone()
        } else {
            map.last().cloned().unwrap_or_else(|| HEAD.clone())
        };
    }

    /// Recomputes the integer caret position from the anchor. If the anchor
    /// is no longer visible (tombstoned, or evicted by a snapshot load),
    /// walks the `after` chain upward until it finds a visible ancestor or
    /// `HEAD` — "sticky-after-right-neighbor" semantics.
    pub fn caret_from_anchor(&self, store: &RgaStore) -> usize {
        if self.anchor.is_head() {
            return 0;
        }

        let map = store.visible_id_map();
        if let Some(i) = map.iter().position(|id| *id == self.anchor) {
            return i + 1;
        }

        let mut current = self.anchor.clone();
        loop {
            if current.is_head() {
                return 0;
            }
            let Some(node) = store.node(&current) else {
                return 0;
            };
            if !node.deleted {
                if let Some(i) = map.iter().position(|id| *id == current) {
                    return i + 1;
                }
            }
            current = node.after;
        }
    }

    /// Applies a local multi-character insertion chained off the current
    /// anchor and advances the anchor to the chain's last node.
    pub fn advance_after_insert(&mut self, last_inserted: OpId) {
        self.anchor = last_inserted;
    }

    /// After a local backspace that deleted the node at caret `k` (1-based),
    /// the anchor steps back to the node now at `k - 1`, or `HEAD` at `k == 1`.
    pub fn retreat_after_backspace(&mut self, store: &RgaStore, k: usize) {
        if k <= 1 {
            self.anchor = HEAD.clone();
            return;
        }
        let map = store.visible_id_map();
        self.anchor = map.get(k - 2).cloned().unwrap_or_else(|| HEAD.clone());
    }
}
