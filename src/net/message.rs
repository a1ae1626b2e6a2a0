//! Wire message shapes. Every variant round-trips through `serde_json` as
//! a tagged JSON object; the `type` discriminator drives dispatch in
//! [`crate::net::session::Session`].

use serde::{Deserialize, Serialize};

use crate::crdt::snapshot::Snapshot;
use crate::crdt::types::{ClientId, OpId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    #[serde(rename = "INVITE")]
    Invite {
        invite_id: String,
        from_id: ClientId,
        from_name: String,
        listen_port: u16,
    },

    #[serde(rename = "INVITE_ACCEPT")]
    InviteAccept {
        from_id: ClientId,
        from_name: String,
        listen_port: u16,
    },

    #[serde(rename = "PEER_ANNOUNCE")]
    PeerAnnounce {
        peer_id: ClientId,
        peer_name: String,
        peer_ip: String,
        peer_port: u16,
    },

    #[serde(rename = "PEER_LEAVE")]
    PeerLeave { from_id: ClientId },

    #[serde(rename = "CRDT_INSERT")]
    CrdtInsert {
        after: OpId,
        node_id: OpId,
        char: char,
    },

    #[serde(rename = "CRDT_DELETE")]
    CrdtDelete { node_id: OpId },

    #[serde(rename = "SNAPSHOT")]
    Snapshot {
        from_id: ClientId,
        from_name: String,
        crdt_state: Snapshot,
    },

    #[serde(rename = "STATE_CHECK")]
    StateCheck {
        from_id: ClientId,
        state_hash: u64,
        node_count: usize,
    },

    #[serde(rename = "REQUEST_SNAPSHOT")]
    RequestSnapshot { from_id: ClientId },

    #[serde(rename = "CHUNK")]
    Chunk {
        id: String,
        i: usize,
        n: usize,
        data: String,
        from_id: ClientId,
    },
}

impl Message {
    /// The originating replica, used to drop messages reflecting our own
    /// broadcast. `PEER_ANNOUNCE` is addressed directly rather than
    /// broadcast, and `CRDT_INSERT`/`CRDT_DELETE` are unicast to known
    /// peers, so neither carries a `from_id` and neither can loop back to
    /// its own sender.
    pub fn from_id(&self) -> Option<&ClientId> {
        match self {
            Message::Invite { from_id, .. } => Some(from_id),
            Message::InviteAccept { from_id, .. } => Some(from_id),
            Message::PeerAnnounce { .. } => None,
            Message::PeerLeave { from_id } => Some(from_id),
            Message::CrdtInsert { .. } => None,
            Message::CrdtDelete { .. } => None,
            Message::Snapshot { from_id, .. } => Some(from_id),
            Message::StateCheck { from_id, .. } => Some(from_id),
            Message::RequestSnapshot { from_id } => Some(from_id),
            Message::Chunk { from_id, .. } => Some(from_id),
        }
    }
}
