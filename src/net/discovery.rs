//! Peer discovery and membership.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::crdt::types::ClientId;

/// How long a seen `invite_id` is remembered before it can be reused,
/// bounded with a time window so a long-running peer does not
/// accumulate memory from every invite it has ever observed.
const SEEN_INVITE_TTL: Duration = Duration::from_secs(300);

/// What the core knows about one remote replica. The local peer is never
/// present in its own map.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerRecord {
    pub addr: SocketAddr,
    pub name: String,
    pub last_seen: Instant,
}

/// The peer map plus the seen-invite set, both exclusively owned by the
/// session task.
#[derive(Debug, Default)]
pub struct Membership {
    peers: HashMap<ClientId, PeerRecord>,
    seen_invites: HashMap<Uuid, Instant>,
}

impl Membership {
    pub fn new() -> Self {
        Membership::default()
    }

    pub fn peers(&self) -> &HashMap<ClientId, PeerRecord> {
        &self.peers
    }

    pub fn contains(&self, id: &ClientId) -> bool {
        self.peers.contains_key(id)
    }

    pub fn add_peer(&mut self, id: ClientId, addr: SocketAddr, name: String) {
        self.peers.insert(
            id,
            PeerRecord {
                addr,
                name,
                last_seen: Instant::now(),
            },
        );
    }

    pub fn remove_peer(&mut self, id: &ClientId) {
        self.peers.remove(id);
    }

    /// Records an invite as handled. Returns `false` (caller should drop
    /// the INVITE) if it has already been seen within the TTL window.
    pub fn record_invite(&mut self, invite_id: Uuid) -> bool {
        self.evict_expired_invites();
        if self.seen_invites.contains_key(&invite_id) {
            return false;
        }
        self.seen_invites.insert(invite_id, Instant::now());
        true
    }

    fn evict_expired_invites(&mut self) {
        self.seen_invites
            .retain(|_, seen_at| seen_at.elapsed() < SEEN_INVITE_TTL);
    }

    /// `leave_session()`: clears the peer map and the seen-invite set so a
    /// later rejoin starts clean.
    pub fn leave(&mut self) {
        self.peers.clear();
        self.seen_invites.clear();
    }
}

/// Every local IPv4 broadcast address, one per non-loopback interface.
/// An empty result means no network interface is available, which the
/// caller treats as a reason to disable membership and sharing without
/// affecting local editing.
pub fn local_broadcast_addresses(port: u16) -> Vec<SocketAddr> {
    let interfaces = match if_addrs::get_if_addrs() {
        Ok(interfaces) => interfaces,
        Err(_) => return Vec::new(),
    };

    interfaces
        .into_iter()
        .filter(|iface| !iface.is_loopback())
        .filter_map(|iface| match iface.addr {
            if_addrs::IfAddr::V4(v4) => v4.broadcast.map(|bcast| {
                SocketAddr::new(IpAddr::V4(Ipv4Addr::from(bcast.octets())), port)
            }),
            if_addrs::IfAddr::V6(_) => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        "10.0.0.5:5005".parse().unwrap()
    }

    #[test]
    fn unknown_peer_is_absent_until_added() {
        let membership = Membership::new();
        assert!(!membership.contains(&ClientId::from_raw("AAAA")));
    }

    #[test]
    fn add_then_remove_peer_round_trips() {
        let mut membership = Membership::new();
        let id = ClientId::from_raw("AAAA");
        membership.add_peer(id.clone(), addr(), "alice".to_string());
        assert!(membership.contains(&id));
        membership.remove_peer(&id);
        assert!(!membership.contains(&id));
    }

    #[test]
    fn an_invite_is_only_accepted_once() {
        let mut membership = Membership::new();
        let invite_id = Uuid::new_v4();
        assert!(membership.record_invite(invite_id));
        assert!(!membership.record_invite(invite_id));
    }

    #[test]
    fn leave_clears_both_peers_and_seen_invites() {
        let mut membership = Membership::new();
        let id = ClientId::from_raw("AAAA");
        membership.add_peer(id.clone(), addr(), "alice".to_string());
        let invite_id = Uuid::new_v4();
        membership.record_invite(invite_id);

        membership.leave();

        assert!(!membership.contains(&id));
        assert!(membership.record_invite(invite_id)); // seen-set was cleared
    }
}
