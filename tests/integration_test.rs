//! End-to-end scenario tests for the replication engine: concurrent
//! insert tie-breaks, out-of-order delivery, deletion of a concurrently
//! inserted character, joining via a snapshot, and anti-entropy repair.

use std::net::SocketAddr;

use rga_sync::crdt::pending::{PendingBuffer, PendingOp};
use rga_sync::{BufferView, ClientId, HEAD, Message, OpId, PendingInvite, RgaStore, Session, Transport, UnsavedWorkDecision};

fn id(counter: u64, client: &str) -> OpId {
    OpId::new(counter, ClientId::from_raw(client))
}

/// Binds a real loopback `Transport` and the `Session` built on top of its
/// `TransportSender`, returning both so the test can both drive the session
/// and receive whatever it sends.
async fn session_on_loopback(own: &str) -> (Session<BufferView>, Transport, SocketAddr) {
    let transport = Transport::bind(0, ClientId::from_raw(own)).await.unwrap();
    let local = transport.local_addr().unwrap();
    let session = Session::new(ClientId::from_raw(own), own.to_string(), transport.sender(), BufferView::new());
    (session, transport, local)
}

// S1 — concurrent insert tie-break.
#[test]
fn concurrent_inserts_at_head_tie_break_descending_by_op_id() {
    let store_a = RgaStore::new();
    let store_b = RgaStore::new();

    let x = id(1, "AAAA");
    let y = id(1, "BBBB");

    store_a.apply_insert(HEAD.clone(), x.clone(), 'X');
    store_b.apply_insert(HEAD.clone(), y.clone(), 'Y');

    // Deliver both ops to both replicas.
    store_a.apply_insert(HEAD.clone(), y, 'Y');
    store_b.apply_insert(HEAD.clone(), x, 'X');

    assert_eq!(store_a.render(), "YX");
    assert_eq!(store_b.render(), "YX");
}

// S2 — out-of-order insert.
#[test]
fn out_of_order_delivery_is_buffered_then_flushed_once_the_parent_lands() {
    let a = id(1, "A");
    let b = id(2, "A");

    let store = RgaStore::new();
    let mut pending = PendingBuffer::new();

    // 'b' (after 'a') arrives before 'a' does.
    assert!(!store.apply_insert(a.clone(), b.clone(), 'b'));
    pending.push(PendingOp::Insert { after: a.clone(), id: b, ch: 'b' });

    // 'a' arrives; flushing drains the dependent insert.
    store.apply_insert(HEAD.clone(), a, 'a');
    pending.flush(&store);

    assert!(pending.is_empty());
    assert_eq!(store.render(), "ab");
}

// S3 — delete of a concurrently-inserted character.
#[test]
fn deleting_a_node_the_other_replica_never_saw_converges_once_delivered() {
    let store_a = RgaStore::new();
    let store_b = RgaStore::new();

    let z = id(1, "A");
    let q = id(1, "B");

    store_a.apply_insert(HEAD.clone(), z.clone(), 'z');
    store_b.apply_insert(HEAD.clone(), q.clone(), 'q');
    store_a.apply_delete(z.clone());

    // Now exchange: B learns of A's insert+delete, A learns of B's insert.
    store_b.apply_insert(HEAD.clone(), z.clone(), 'z');
    store_b.apply_delete(z);
    store_a.apply_insert(HEAD.clone(), q, 'q');

    assert_eq!(store_a.render(), "q");
    assert_eq!(store_b.render(), "q");
}

// S5 — snapshot on join.
#[tokio::test]
async fn joining_replica_receives_a_full_snapshot_and_its_clock_catches_up() {
    let (mut alice, mut alice_transport, alice_addr) = session_on_loopback("AAAA").await;
    let (mut carol, mut carol_transport, carol_addr) = session_on_loopback("CCCC").await;

    alice.local_insert("abc").await;
    assert_eq!(alice.document_text(), "abc");

    // Alice is the existing member sharing the file; Carol received her
    // broadcast INVITE and now accepts it.
    let invite = PendingInvite {
        invite_id: uuid::Uuid::new_v4(),
        from_id: ClientId::from_raw("AAAA"),
        from_name: "alice".to_string(),
        addr: alice_addr,
        listen_port: alice_addr.port(),
    };
    carol.accept_invite(invite, UnsavedWorkDecision::Discard, carol_addr.port()).await.unwrap();

    // Alice receives Carol's INVITE_ACCEPT and ships back a SNAPSHOT.
    let (msg, from) = alice_transport.recv().await.unwrap().unwrap();
    assert!(matches!(msg, Message::InviteAccept { .. }));
    alice.handle_network_message(msg, from).await.unwrap();

    let (msg, from) = carol_transport.recv().await.unwrap().unwrap();
    assert!(matches!(msg, Message::Snapshot { .. }));
    let max_counter_on_wire = if let Message::Snapshot { ref crdt_state, .. } = msg {
        crdt_state.nodes.iter().map(|n| n.id.counter).max().unwrap_or(0)
    } else {
        unreachable!()
    };
    carol.handle_network_message(msg, from).await.unwrap();

    assert_eq!(carol.document_text(), "abc");
    assert!(max_counter_on_wire >= 1);
}

// S6 — anti-entropy tie-break.
#[tokio::test]
async fn anti_entropy_tie_break_favors_the_lexicographically_greater_client_id() {
    let (mut a, mut a_transport, a_addr) = session_on_loopback("BBBB").await; // greater client_id
    let (mut b, mut b_transport, b_addr) = session_on_loopback("AAAA").await;

    a.local_insert("xxx").await;
    b.local_insert("yyy").await;

    // Introduce the two to each other's membership without a real invite
    // handshake, since only the STATE_CHECK dispatch path is under test.
    let announce_b = Message::PeerAnnounce {
        peer_id: ClientId::from_raw("AAAA"),
        peer_name: "b".to_string(),
        peer_ip: b_addr.ip().to_string(),
        peer_port: b_addr.port(),
    };
    a.handle_network_message(announce_b, a_addr).await.unwrap();
    let announce_a = Message::PeerAnnounce {
        peer_id: ClientId::from_raw("BBBB"),
        peer_name: "a".to_string(),
        peer_ip: a_addr.ip().to_string(),
        peer_port: a_addr.port(),
    };
    b.handle_network_message(announce_a, b_addr).await.unwrap();

    a.tick_anti_entropy().await;
    b.tick_anti_entropy().await;

    // B's STATE_CHECK, received by A: node counts tie and A's client_id
    // ("BBBB") beats B's ("AAAA"), so A immediately answers with a SNAPSHOT
    // to B — queued behind A's own outbound STATE_CHECK on b_transport.
    let (msg, from) = a_transport.recv().await.unwrap().unwrap();
    a.handle_network_message(msg, from).await.unwrap();

    // A's STATE_CHECK, received by B: same tie, but B loses it, so B's
    // handler sends nothing back.
    let (msg, from) = b_transport.recv().await.unwrap().unwrap();
    b.handle_network_message(msg, from).await.unwrap();

    // The SNAPSHOT A queued a moment ago arrives second.
    let (msg, from) = b_transport.recv().await.unwrap().unwrap();
    assert!(matches!(msg, Message::Snapshot { .. }));
    b.handle_network_message(msg, from).await.unwrap();

    assert_eq!(a.document_text(), b.document_text());
    assert_eq!(b.document_text(), "xxx");
}
