//! Session controller: message dispatch, anti-entropy, and the tokio task
//! wiring that replaces the original single-threaded GUI scheduler +
//! dedicated I/O thread.
//!
//! All mutable CRDT state — the store, the pending buffer, the Lamport
//! clock, the cursor anchor, and the peer map — lives on [`Session`] and is
//! only ever touched by the task that owns it. The I/O task only decodes
//! and reassembles datagrams and hands the result across an MPSC channel;
//! it never looks inside the CRDT.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::crdt::rga::RgaStore;
use crate::crdt::types::{ClientId, LamportClock};
use crate::cursor::CursorAnchor;
use crate::error::SessionError;
use crate::net::discovery::Membership;
use crate::net::message::Message;
use crate::net::transport::{Transport, TransportSender};
use crate::view::{DocumentView, UnsavedWorkDecision};

/// An `INVITE` awaiting a local accept/reject decision. Deliberately
/// inert: it carries no behavior,
/// only what the caller needs to ask the user and, on acceptance, to call
/// back into [`Session::accept_invite`].
#[derive(Debug, Clone, PartialEq)]
pub struct PendingInvite {
    pub invite_id: Uuid,
    pub from_id: ClientId,
    pub from_name: String,
    pub addr: SocketAddr,
    pub listen_port: u16,
}

/// Events fed to the session task. Everything that mutates CRDT state
/// flows through here or through a direct `&mut self` call from the task
/// that owns the `Session` — never from the I/O task.
#[derive(Debug)]
enum SessionEvent {
    Network(Message, SocketAddr),
    AntiEntropyTick,
}

pub struct Session<V: DocumentView> {
    own_id: ClientId,
    display_name: String,
    clock: LamportClock,
    store: RgaStore,
    pending: crate::crdt::pending::PendingBuffer,
    cursor: CursorAnchor,
    membership: Membership,
    sender: TransportSender,
    view: V,
}

impl<V: DocumentView> Session<V> {
    pub fn new(own_id: ClientId, display_name: String, sender: TransportSender, view: V) -> Self {
        Session {
            clock: LamportClock::new(own_id.clone()),
            own_id,
            display_name,
            store: RgaStore::new(),
            pending: crate::crdt::pending::PendingBuffer::new(),
            cursor: CursorAnchor::new(),
            membership: Membership::new(),
            sender,
            view,
        }
    }

    pub fn client_id(&self) -> &ClientId {
        &self.own_id
    }

    pub fn document_text(&self) -> String {
        self.store.render()
    }

    fn rerender(&mut self) {
        self.view.set_text(&self.store.render());
        let caret = self.cursor.caret_from_anchor(&self.store);
        self.view.set_caret(caret);
    }

    // ---- Local edits --------------------------------------------------

    /// Inserts `text` at the caret, chaining one node per character, then
    /// broadcasts one `CRDT_INSERT` per node and advances the anchor to the
    /// chain's last node.
    pub async fn local_insert(&mut self, text: &str) {
        let mut after = self.cursor.anchor().clone();
        for ch in text.chars() {
            let id = self.clock.next_op_id();
            self.store.apply_insert(after.clone(), id.clone(), ch);
            self.broadcast(&Message::CrdtInsert {
                after: after.clone(),
                node_id: id.clone(),
                char: ch,
            })
            .await;
            after = id;
        }
        self.cursor.advance_after_insert(after);
        self.rerender();
    }

    /// Deletes the node immediately left of the caret (backspace) and
    /// retreats the anchor.
    pub async fn local_backspace(&mut self) {
        let k = self.cursor.caret_from_anchor(&self.store);
        if k == 0 {
            return;
        }
        let map = self.store.visible_id_map();
        let Some(target) = map.get(k - 1).cloned() else {
            return;
        };
        self.store.apply_delete(target.clone());
        self.broadcast(&Message::CrdtDelete { node_id: target }).await;
        self.cursor.retreat_after_backspace(&self.store, k);
        self.rerender();
    }

    /// Deletes the node immediately right of the caret (delete-forward);
    /// the anchor itself does not move.
    pub async fn local_delete_forward(&mut self) {
        let k = self.cursor.caret_from_anchor(&self.store);
        let map = self.store.visible_id_map();
        let Some(target) = map.get(k).cloned() else {
            return;
        };
        self.store.apply_delete(target.clone());
        self.broadcast(&Message::CrdtDelete { node_id: target }).await;
        self.rerender();
    }

    /// Re-derives the anchor from a caret position reported by the view
    /// (e.g. a mouse click or arrow-key move).
    pub fn move_caret(&mut self, pos: usize) {
        self.cursor.update_from_caret(pos, &self.store);
    }

    async fn broadcast(&self, message: &Message) {
        for peer in self.membership.peers().values() {
            if let Err(err) = self.sender.send(message, peer.addr).await {
                warn!("send to {} failed: {err}", peer.addr);
            }
        }
    }

    // ---- Discovery & membership --------------------------------------

    /// `share_file()`: broadcasts an INVITE on every discovered IPv4
    /// broadcast address. Fails with [`SessionError::NoBroadcastInterface`]
    /// when no such address exists; local editing otherwise stays fully
    /// functional with no peers to invite.
    pub async fn share_file(&self, listen_port: u16) -> Result<(), SessionError> {
        let addrs = crate::net::discovery::local_broadcast_addresses(listen_port);
        if addrs.is_empty() {
            return Err(SessionError::NoBroadcastInterface);
        }

        let invite = Message::Invite {
            invite_id: Uuid::new_v4().to_string(),
            from_id: self.own_id.clone(),
            from_name: self.display_name.clone(),
            listen_port,
        };
        for addr in addrs {
            if let Err(err) = self.sender.send(&invite, addr).await {
                warn!("broadcasting INVITE to {addr} failed: {err}");
            }
        }
        Ok(())
    }

    /// `leave_session()`: notifies current peers, then clears membership.
    pub async fn leave_session(&mut self) {
        let leave = Message::PeerLeave { from_id: self.own_id.clone() };
        self.broadcast(&leave).await;
        self.membership.leave();
    }

    /// Evaluates an inbound INVITE against the self/known-peer/seen-invite
    /// filters and, if it warrants one, returns a prompt for
    /// the caller to put in front of the user.
    pub fn consider_invite(&mut self, msg: &Message, from: SocketAddr) -> Option<PendingInvite> {
        let Message::Invite { invite_id, from_id, from_name, listen_port } = msg else {
            return None;
        };
        if *from_id == self.own_id || self.membership.contains(from_id) {
            return None;
        }
        let Ok(invite_id) = invite_id.parse::<Uuid>() else {
            warn!("dropping INVITE with malformed invite_id from {from}");
            return None;
        };
        if !self.membership.record_invite(invite_id) {
            return None;
        }
        Some(PendingInvite {
            invite_id,
            from_id: from_id.clone(),
            from_name: from_name.clone(),
            addr: from,
            listen_port: *listen_port,
        })
    }

    /// Completes (or cancels) a join following the user's unsaved-work
    /// decision. `Cancel`
    /// leaves the peer set untouched; `Save`/`Discard` add the peer and
    /// unicast `INVITE_ACCEPT` back to the inviter.
    pub async fn accept_invite(
        &mut self,
        invite: PendingInvite,
        decision: UnsavedWorkDecision,
        own_listen_port: u16,
    ) -> Result<(), SessionError> {
        if decision == UnsavedWorkDecision::Cancel {
            return Err(SessionError::JoinCancelled);
        }

        self.membership
            .add_peer(invite.from_id.clone(), invite.addr, invite.from_name.clone());

        let accept = Message::InviteAccept {
            from_id: self.own_id.clone(),
            from_name: self.display_name.clone(),
            listen_port: own_listen_port,
        };
        self.sender.send(&accept, invite.addr).await?;
        Ok(())
    }

    // ---- Inbound message dispatch ---------------------------------------

    /// Routes one decoded, already-reassembled message. Returns a
    /// [`PendingInvite`] when the message was an INVITE that needs a user
    /// decision; every other inbound type is fully handled here.
    pub async fn handle_network_message(
        &mut self,
        msg: Message,
        from: SocketAddr,
    ) -> Result<Option<PendingInvite>, SessionError> {
        if let Some(id) = msg.from_id() {
            if *id == self.own_id {
                return Ok(None);
            }
        }

        match msg {
            Message::Invite { .. } => Ok(self.consider_invite(&msg, from)),

            Message::InviteAccept { from_id, from_name, listen_port } => {
                self.handle_invite_accept(from_id, from_name, SocketAddr::new(from.ip(), listen_port))
                    .await?;
                Ok(None)
            }

            Message::PeerAnnounce { peer_id, peer_name, peer_ip, peer_port } => {
                if !self.membership.contains(&peer_id) {
                    if let Ok(ip) = peer_ip.parse() {
                        self.membership.add_peer(peer_id, SocketAddr::new(ip, peer_port), peer_name);
                    }
                }
                Ok(None)
            }

            Message::PeerLeave { from_id } => {
                self.membership.remove_peer(&from_id);
                Ok(None)
            }

            Message::CrdtInsert { after, node_id, char } => {
                self.clock.observe(node_id.counter);
                if !self.store.apply_insert(after.clone(), node_id.clone(), char) {
                    self.pending.push(crate::crdt::pending::PendingOp::Insert {
                        after,
                        id: node_id,
                        ch: char,
                    });
                }
                self.pending.flush(&self.store);
                self.rerender();
                Ok(None)
            }

            Message::CrdtDelete { node_id } => {
                self.clock.observe(node_id.counter);
                if !self.store.apply_delete(node_id.clone()) {
                    self.pending
                        .push(crate::crdt::pending::PendingOp::Delete { id: node_id });
                }
                self.pending.flush(&self.store);
                self.rerender();
                Ok(None)
            }

            Message::Snapshot { crdt_state, .. } => {
                let max_counter = crdt_state.nodes.iter().map(|n| n.id.counter).max().unwrap_or(0);
                self.store.load_snapshot(crdt_state);
                self.pending.clear();
                self.clock.observe(max_counter);
                self.rerender();
                Ok(None)
            }

            Message::StateCheck { from_id, state_hash, node_count } => {
                self.handle_state_check(from_id, state_hash, node_count).await;
                Ok(None)
            }

            Message::RequestSnapshot { from_id } => {
                self.send_snapshot_to(from_id, from).await;
                Ok(None)
            }

            Message::Chunk { .. } => {
                // Fully reassembled by the transport layer before dispatch
                // ever sees it; arriving here would be a transport bug.
                warn!("unexpected raw CHUNK reached session dispatch");
                Ok(None)
            }
        }
    }

    /// Fanout on join: introduce the newcomer to every
    /// existing peer and vice versa, then add the newcomer and ship them a
    /// SNAPSHOT.
    async fn handle_invite_accept(
        &mut self,
        new_peer_id: ClientId,
        new_peer_name: String,
        new_peer_addr: SocketAddr,
    ) -> Result<(), SessionError> {
        for (existing_id, existing) in self.membership.peers().clone() {
            let tell_existing_about_new = Message::PeerAnnounce {
                peer_id: new_peer_id.clone(),
                peer_name: new_peer_name.clone(),
                peer_ip: new_peer_addr.ip().to_string(),
                peer_port: new_peer_addr.port(),
            };
            self.sender.send(&tell_existing_about_new, existing.addr).await?;

            let tell_new_about_existing = Message::PeerAnnounce {
                peer_id: existing_id,
                peer_name: existing.name,
                peer_ip: existing.addr.ip().to_string(),
                peer_port: existing.addr.port(),
            };
            self.sender.send(&tell_new_about_existing, new_peer_addr).await?;
        }

        self.membership
            .add_peer(new_peer_id.clone(), new_peer_addr, new_peer_name);
        self.send_snapshot_to(new_peer_id, new_peer_addr).await;
        Ok(())
    }

    async fn send_snapshot_to(&self, peer_id: ClientId, addr: SocketAddr) {
        let snapshot = Message::Snapshot {
            from_id: self.own_id.clone(),
            from_name: self.display_name.clone(),
            crdt_state: self.store.to_snapshot(),
        };
        info!("SNAPSHOT send to {peer_id} ({addr}): {} nodes", self.store.node_count());
        if let Err(err) = self.sender.send(&snapshot, addr).await {
            warn!("sending SNAPSHOT to {addr} failed: {err}");
        }
    }

    // ---- Anti-entropy ------------------------------------------------

    /// Broadcasts this replica's `(state_hash, node_count)` to every peer.
    pub async fn tick_anti_entropy(&self) {
        let check = Message::StateCheck {
            from_id: self.own_id.clone(),
            state_hash: self.store.state_hash(),
            node_count: self.store.node_count(),
        };
        self.broadcast(&check).await;
    }

    async fn handle_state_check(&mut self, from_id: ClientId, remote_hash: u64, remote_count: usize) {
        let my_hash = self.store.state_hash();
        if my_hash == remote_hash {
            return;
        }

        let Some(peer) = self.membership.peers().get(&from_id).cloned() else {
            return;
        };
        let my_count = self.store.node_count();

        if my_count > remote_count {
            self.send_snapshot_to(from_id, peer.addr).await;
        } else if my_count < remote_count {
            let request = Message::RequestSnapshot { from_id: self.own_id.clone() };
            if let Err(err) = self.sender.send(&request, peer.addr).await {
                warn!("sending REQUEST_SNAPSHOT to {} failed: {err}", peer.addr);
            }
        } else if self.own_id > from_id {
            self.send_snapshot_to(from_id, peer.addr).await;
        }
        // else: counts tie and our client_id loses the tie-break — wait for
        // the other side to send.
    }
}

/// Runs the I/O task (decode/reassemble only) and the anti-entropy ticker,
/// feeding both into a single session loop that owns all CRDT state.
/// `invites` receives every INVITE that needs a user
/// decision; the caller is expected to drive it back via
/// [`Session::accept_invite`].
pub async fn run<V: DocumentView + 'static>(
    mut session: Session<V>,
    mut transport: Transport,
    anti_entropy_interval: Duration,
    invites: mpsc::UnboundedSender<PendingInvite>,
) {
    let (tx, mut rx) = mpsc::channel::<SessionEvent>(256);

    let io_tx = tx.clone();
    let io_task = tokio::spawn(async move {
        loop {
            match transport.recv().await {
                Ok(Some((msg, from))) => {
                    if io_tx.send(SessionEvent::Network(msg, from)).await.is_err() {
                        break;
                    }
                }
                Ok(None) => continue,
                Err(err) => warn!("transport recv error: {err}"),
            }
        }
    });

    let tick_tx = tx.clone();
    let tick_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(anti_entropy_interval);
        loop {
            interval.tick().await;
            if tick_tx.send(SessionEvent::AntiEntropyTick).await.is_err() {
                break;
            }
        }
    });
    drop(tx);

    while let Some(event) = rx.recv().await {
        match event {
            SessionEvent::Network(msg, from) => match session.handle_network_message(msg, from).await {
                Ok(Some(pending)) => {
                    let _ = invites.send(pending);
                }
                Ok(None) => {}
                Err(err) => warn!("dropping network message: {err}"),
            },
            SessionEvent::AntiEntropyTick => session.tick_anti_entropy().await,
        }
    }

    io_task.abort();
    tick_task.abort();
    info!("session loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crdt::types::OpId;
    use crate::view::BufferView;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::new("127.0.0.1".parse().unwrap(), port)
    }

    async fn session_with_loopback(own: &str, send_port: u16) -> Session<BufferView> {
        let transport = Transport::bind(send_port, ClientId::from_raw(own)).await.unwrap();
        Session::new(
            ClientId::from_raw(own),
            own.to_string(),
            transport.sender(),
            BufferView::new(),
        )
    }

    #[tokio::test]
    async fn local_insert_updates_the_document_and_advances_the_anchor() {
        let mut session = session_with_loopback("AAAA", 0).await;
        session.local_insert("ab").await;
        assert_eq!(session.document_text(), "ab");
    }

    #[tokio::test]
    async fn invite_from_self_is_never_a_pending_invite() {
        let mut session = session_with_loopback("AAAA", 0).await;
        let msg = Message::Invite {
            invite_id: Uuid::new_v4().to_string(),
            from_id: ClientId::from_raw("AAAA"),
            from_name: "me".to_string(),
            listen_port: 5005,
        };
        assert!(session.consider_invite(&msg, addr(5005)).is_none());
    }

    #[tokio::test]
    async fn a_repeated_invite_id_is_only_surfaced_once() {
        let mut session = session_with_loopback("AAAA", 0).await;
        let invite_id = Uuid::new_v4().to_string();
        let msg = Message::Invite {
            invite_id: invite_id.clone(),
            from_id: ClientId::from_raw("BBBB"),
            from_name: "bob".to_string(),
            listen_port: 5005,
        };
        assert!(session.consider_invite(&msg, addr(5005)).is_some());
        assert!(session.consider_invite(&msg, addr(5005)).is_none());
    }

    #[tokio::test]
    async fn cancelling_a_join_leaves_the_peer_set_untouched() {
        let mut session = session_with_loopback("AAAA", 0).await;
        let invite = PendingInvite {
            invite_id: Uuid::new_v4(),
            from_id: ClientId::from_raw("BBBB"),
            from_name: "bob".to_string(),
            addr: addr(5006),
            listen_port: 5006,
        };
        let result = session
            .accept_invite(invite, UnsavedWorkDecision::Cancel, 5005)
            .await;
        assert!(matches!(result, Err(SessionError::JoinCancelled)));
        assert!(!session.membership.contains(&ClientId::from_raw("BBBB")));
    }

    #[tokio::test]
    async fn remote_insert_with_a_missing_parent_is_buffered_not_applied() {
        let mut session = session_with_loopback("AAAA", 0).await;
        let orphan = Message::CrdtInsert {
            after: OpId::new(99, ClientId::from_raw("ZZZZ")),
            node_id: OpId::new(100, ClientId::from_raw("ZZZZ")),
            char: 'z',
        };
        session.handle_network_message(orphan, addr(5006)).await.unwrap();
        assert_eq!(session.document_text(), "");
        assert_eq!(session.pending.len(), 1);
    }

    #[tokio::test]
    async fn a_message_reflecting_our_own_broadcast_is_dropped() {
        let mut session = session_with_loopback("AAAA", 0).await;
        let echo = Message::PeerLeave { from_id: ClientId::from_raw("AAAA") };
        let outcome = session.handle_network_message(echo, addr(5006)).await.unwrap();
        assert!(outcome.is_none());
    }
}
