//! Realistic collaborative editing example using the tree RGA store.
//!
//! Simulates two users, Alice and Bob, editing the same document. First a
//! turn-based scenario where each user's edits are fully exchanged before
//! the other types, then a concurrent scenario where both type at once and
//! the stores only converge once every op has been exchanged.

use rga_sync::crdt::types::{ClientId, OpId};
use rga_sync::crdt::{HEAD, RgaStore};

/// One participant's local view of the document: their own store plus the
/// tail `OpId` their next local insert should chain off of.
struct CollaborativeSession {
    name: &'static str,
    client: ClientId,
    store: RgaStore,
    tail: OpId,
}

impl CollaborativeSession {
    fn new(name: &'static str, client_tag: &str) -> Self {
        CollaborativeSession {
            name,
            client: ClientId::from_raw(client_tag),
            store: RgaStore::new(),
            tail: HEAD.clone(),
        }
    }

    /// Types `text` at the current tail, advancing it one character at a
    /// time so each insert chains off the previous one.
    fn simulate_typing(&mut self, text: &str) {
        for ch in text.chars() {
            let id = OpId::new(self.tail.counter + 1, self.client.clone());
            self.store.apply_insert(self.tail.clone(), id.clone(), ch);
            self.tail = id;
        }
        println!("{} types {text:?} -> '{}'", self.name, self.store.render());
    }

    /// Pulls every node from `other`'s store into this one.
    fn sync_changes(&mut self, other: &CollaborativeSession) {
        for record in other.store.to_snapshot().nodes {
            self.store.apply_insert(record.after.clone(), record.id.clone(), record.text);
            if record.deleted {
                self.store.apply_delete(record.id.clone());
            }
        }
    }

    fn show_status(&self) {
        println!("{}'s document: '{}'", self.name, self.store.render());
    }
}

fn main() {
    turn_based_scenario();
    println!();
    concurrent_scenario();
}

/// Alice and Bob take turns, fully syncing after every turn, so there is
/// never any concurrent insertion to reconcile.
fn turn_based_scenario() {
    println!("--- Turn-based editing ---");
    let mut alice = CollaborativeSession::new("Alice", "AAAA");
    let mut bob = CollaborativeSession::new("Bob", "BBBB");

    alice.simulate_typing("Hello");
    bob.sync_changes(&alice);
    bob.tail = alice.tail.clone();

    bob.simulate_typing(", Bob here");
    alice.sync_changes(&bob);
    alice.tail = bob.tail.clone();

    alice.show_status();
    bob.show_status();
    assert_eq!(alice.store.render(), bob.store.render());
    println!("Converged: '{}'", alice.store.render());
}

/// Alice and Bob both type into the same spot (after HEAD) without syncing
/// first. Their inserts are concurrent siblings; the store's descending
/// tie-break on `OpId` decides the order once both sides exchange.
fn concurrent_scenario() {
    println!("--- Concurrent editing ---");
    let mut alice = CollaborativeSession::new("Alice", "AAAA");
    let mut bob = CollaborativeSession::new("Bob", "BBBB");

    alice.simulate_typing("left");
    bob.simulate_typing("right");

    alice.sync_changes(&bob);
    bob.sync_changes(&alice);

    alice.show_status();
    bob.show_status();
    assert_eq!(alice.store.render(), bob.store.render());
    println!("Converged: '{}'", alice.store.render());
}
