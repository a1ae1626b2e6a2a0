//! Core RGA CRDT implementation.
//!
//! Nodes form a tree: every node but the root points at the node it was
//! inserted after (`Node::after`). Siblings — nodes inserted after the same
//! parent — are kept in **descending** `OpId` order, so concurrent inserts
//! at the same position converge without coordination. Deletion never
//! removes a node, only tombstones it, so later inserts anchored to a
//! deleted node stay valid.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crossbeam_skiplist::SkipMap;
use parking_lot::RwLock;

use crate::crdt::node::Node;
use crate::crdt::snapshot::{NodeRecord, Snapshot};
use crate::crdt::types::{HEAD, OpId};

/// The Replicated Growable Array (RGA) CRDT store.
///
/// `nodes` is the arena, keyed by each node's own id. `children` maps a
/// parent id (including the implicit [`HEAD`] root, which has no entry in
/// `nodes`) to the descending-sorted ids of everything inserted after it.
pub struct RgaStore {
    nodes: SkipMap<OpId, Arc<RwLock<Node>>>,
    children: SkipMap<OpId, RwLock<Vec<OpId>>>,
}

impl Default for RgaStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RgaStore {
    pub fn new() -> Self {
        RgaStore {
            nodes: SkipMap::new(),
            children: SkipMap::new(),
        }
    }

    /// True if `id` can currently be used as an `after` anchor: either the
    /// implicit root, or a node already present in the store.
    fn contains(&self, id: &OpId) -> bool {
        id.is_head() || self.nodes.contains_key(id)
    }

    /// Integrates a local or remote insert. Returns `false` when `after`
    /// hasn't been seen yet, in which case the caller must buffer the op
    /// and retry once its dependency lands. Idempotent: an id already
    /// present is treated as success, so replayed or duplicated deliveries
    /// are harmless.
    pub fn apply_insert(&self, after: OpId, id: OpId, text: char) -> bool {
        if !self.contains(&after) {
            return false;
        }
        if self.nodes.contains_key(&id) {
            return true;
        }

        self.nodes
            .insert(id.clone(), Arc::new(RwLock::new(Node::new(id.clone(), after.clone(), text))));

        match self.children.get(&after) {
            Some(entry) => {
                let mut siblings = entry.value().write();
                siblings.push(id);
                siblings.sort_unstable_by(|a, b| b.cmp(a));
            }
            None => {
                self.children.insert(after, RwLock::new(vec![id]));
            }
        }

        true
    }

    /// Integrates a local or remote delete. Returns `false` when `id` is
    /// unknown, in which case the caller must buffer it. Deleting the
    /// implicit root or an already-tombstoned node is a harmless no-op.
    pub fn apply_delete(&self, id: OpId) -> bool {
        if id.is_head() {
            return true;
        }
        match self.nodes.get(&id) {
            Some(entry) => {
                entry.value().write().mark_deleted();
                true
            }
            None => false,
        }
    }

    /// Depth-first walk from the root in descending sibling order, visiting
    /// every node (visible or tombstoned).
    fn walk(&self, at: &OpId, out: &mut Vec<OpId>) {
        if let Some(entry) = self.children.get(at) {
            for child in entry.value().read().iter() {
                out.push(child.clone());
                self.walk(child, out);
            }
        }
    }

    /// The full insertion-order sequence of every node ever applied,
    /// including tombstones. Used by the cursor anchor to walk forward past
    /// deleted neighbors.
    pub fn full_sequence(&self) -> Vec<OpId> {
        let mut out = Vec::new();
        self.walk(&HEAD, &mut out);
        out
    }

    /// For each visible character in reading order, the id of its node.
    /// Since every node carries exactly one character, this has the same
    /// length as `render()`.
    pub fn visible_id_map(&self) -> Vec<OpId> {
        self.full_sequence()
            .into_iter()
            .filter(|id| {
                self.nodes
                    .get(id)
                    .map(|e| !e.value().read().deleted)
                    .unwrap_or(false)
            })
            .collect()
    }

    /// The document's current visible text.
    pub fn render(&self) -> String {
        self.visible_id_map()
            .into_iter()
            .filter_map(|id| self.nodes.get(&id).map(|e| e.value().read().text))
            .collect()
    }

    /// True if `id` is present and not tombstoned.
    pub fn is_visible(&self, id: &OpId) -> bool {
        self.nodes
            .get(id)
            .map(|e| !e.value().read().deleted)
            .unwrap_or(false)
    }

    /// A copy of the node `id`, if known. Used by the cursor anchor to walk
    /// the `after` chain when its anchor has been tombstoned or evicted.
    pub fn node(&self, id: &OpId) -> Option<Node> {
        self.nodes.get(id).map(|e| e.value().read().clone())
    }

    pub fn contains_node(&self, id: &OpId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Total node count including tombstones, the other half of the
    /// anti-entropy tie-break alongside [`RgaStore::state_hash`].
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// A deterministic hash of the rendered text, compared between peers
    /// during anti-entropy to detect divergence without shipping the whole
    /// state. Two replicas with the same visible text but different
    /// tombstones hash equal, since only `render()` is a divergence signal;
    /// `node_count()` carries the tombstone-aware half of the comparison.
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.render().hash(&mut hasher);
        hasher.finish()
    }

    /// Exports the whole tree for a joining peer.
    pub fn to_snapshot(&self) -> Snapshot {
        let nodes = self
            .nodes
            .iter()
            .map(|entry| NodeRecord::from(&*entry.value().read()))
            .collect();
        Snapshot { nodes }
    }

    /// Replaces the store's contents with `snapshot`, rebuilding the
    /// children lists from each record's `after` pointer and re-sorting
    /// every sibling list descending.
    pub fn load_snapshot(&self, snapshot: Snapshot) {
        let stale_nodes: Vec<OpId> = self.nodes.iter().map(|e| e.key().clone()).collect();
        for id in stale_nodes {
            self.nodes.remove(&id);
        }
        let stale_parents: Vec<OpId> = self.children.iter().map(|e| e.key().clone()).collect();
        for parent in stale_parents {
            self.children.remove(&parent);
        }

        for record in snapshot.nodes {
            let node: Node = record.into();
            let after = node.after.clone();
            let id = node.id.clone();
            self.nodes.insert(id.clone(), Arc::new(RwLock::new(node)));
            match self.children.get(&after) {
                Some(entry) => entry.value().write().push(id),
                None => {
                    self.children.insert(after, RwLock::new(vec![id]));
                }
            }
        }

        for entry in self.children.iter() {
            entry.value().write().sort_unstable_by(|a, b| b.cmp(a));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crdt::types::ClientId;

    fn id(counter: u64, client: &str) -> OpId {
        OpId::new(counter, ClientId::from_raw(client))
    }

    #[test]
    fn empty_store_renders_empty_string() {
        let store = RgaStore::new();
        assert_eq!(store.render(), "");
        assert_eq!(store.node_count(), 0);
    }

    #[test]
    fn sequential_inserts_after_head_render_in_order() {
        let store = RgaStore::new();
        let a = id(1, "AAAA");
        let b = id(2, "AAAA");
        assert!(store.apply_insert(HEAD.clone(), a.clone(), 'a'));
        assert!(store.apply_insert(a.clone(), b, 'b'));
        assert_eq!(store.render(), "ab");
    }

    #[test]
    fn insert_with_unknown_parent_is_rejected_and_buffer_candidate() {
        let store = RgaStore::new();
        let orphan_parent = id(5, "ZZZZ");
        let orphan = id(6, "ZZZZ");
        assert!(!store.apply_insert(orphan_parent, orphan, 'z'));
        assert_eq!(store.node_count(), 0);
    }

    #[test]
    fn concurrent_siblings_tie_break_descending_by_op_id() {
        let store = RgaStore::new();
        let a = id(1, "AAAA");
        let b = id(1, "BBBB");
        // Both inserted directly after HEAD, concurrently.
        assert!(store.apply_insert(HEAD.clone(), a.clone(), 'a'));
        assert!(store.apply_insert(HEAD.clone(), b.clone(), 'b'));
        // b > a by OpId, and siblings sort descending, so b renders first.
        assert_eq!(store.render(), "ba");
    }

    #[test]
    fn delete_tombstones_without_removing_the_node() {
        let store = RgaStore::new();
        let a = id(1, "AAAA");
        store.apply_insert(HEAD.clone(), a.clone(), 'a');
        assert!(store.apply_delete(a.clone()));
        assert_eq!(store.render(), "");
        assert_eq!(store.node_count(), 1);
        assert!(!store.is_visible(&a));
    }

    #[test]
    fn insert_after_a_tombstone_still_succeeds() {
        let store = RgaStore::new();
        let a = id(1, "AAAA");
        let b = id(2, "AAAA");
        store.apply_insert(HEAD.clone(), a.clone(), 'a');
        store.apply_delete(a.clone());
        assert!(store.apply_insert(a, b, 'b'));
        assert_eq!(store.render(), "b");
    }

    #[test]
    fn apply_insert_is_idempotent_for_a_duplicate_id() {
        let store = RgaStore::new();
        let a = id(1, "AAAA");
        assert!(store.apply_insert(HEAD.clone(), a.clone(), 'a'));
        assert!(store.apply_insert(HEAD.clone(), a, 'a'));
        assert_eq!(store.node_count(), 1);
    }

    #[test]
    fn snapshot_round_trips_full_state() {
        let store = RgaStore::new();
        let a = id(1, "AAAA");
        let b = id(2, "AAAA");
        store.apply_insert(HEAD.clone(), a.clone(), 'a');
        store.apply_insert(a.clone(), b.clone(), 'b');
        store.apply_delete(b.clone());

        let snapshot = store.to_snapshot();
        let fresh = RgaStore::new();
        fresh.load_snapshot(snapshot);

        assert_eq!(fresh.render(), store.render());
        assert_eq!(fresh.node_count(), store.node_count());
        assert_eq!(fresh.state_hash(), store.state_hash());
    }

    #[test]
    fn two_replicas_converge_after_cross_applying_concurrent_inserts() {
        let left = RgaStore::new();
        let right = RgaStore::new();

        let a = id(1, "AAAA");
        let b = id(1, "BBBB");
        left.apply_insert(HEAD.clone(), a.clone(), 'a');
        right.apply_insert(HEAD.clone(), b.clone(), 'b');

        right.apply_insert(HEAD.clone(), a, 'a');
        left.apply_insert(HEAD.clone(), b, 'b');

        assert_eq!(left.render(), right.render());
        assert_eq!(left.state_hash(), right.state_hash());
    }

    #[test]
    fn state_hash_changes_when_a_node_is_deleted() {
        let store = RgaStore::new();
        let a = id(1, "AAAA");
        store.apply_insert(HEAD.clone(), a.clone(), 'a');
        let before = store.state_hash();
        store.apply_delete(a);
        assert_ne!(before, store.state_hash());
    }
}
