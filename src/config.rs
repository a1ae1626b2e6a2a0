//! Runtime configuration for a session.

use clap::Parser;

use crate::crdt::types::ClientId;

pub const DEFAULT_LISTEN_PORT: u16 = 5005;
pub const DEFAULT_SEND_PORT: u16 = 5010;

/// Command-line configuration for one replica.
///
/// The GUI, file I/O, and process entry point this feeds are out of scope
/// here; `Config` only carries what the session/transport layer needs.
#[derive(Debug, Clone, Parser)]
#[command(about = "Peer-to-peer collaborative text replication engine")]
pub struct Config {
    /// UDP port this replica listens on for discovery and CRDT traffic.
    #[arg(long, default_value_t = DEFAULT_LISTEN_PORT)]
    pub listen_port: u16,

    /// UDP port reserved for outbound sends (unused by ephemeral sockets,
    /// kept for parity with deployments that firewall a fixed send port).
    #[arg(long, default_value_t = DEFAULT_SEND_PORT)]
    pub send_port: u16,

    /// Display name announced in INVITE/INVITE_ACCEPT messages.
    #[arg(long, default_value = "anonymous")]
    pub display_name: String,

    /// Client id for this replica. Generated at random if not supplied.
    #[arg(long)]
    pub client_id: Option<String>,

    /// Anti-entropy state-check interval, in seconds.
    #[arg(long, default_value_t = 3)]
    pub anti_entropy_interval_secs: u64,
}

impl Config {
    pub fn resolve_client_id(&self) -> ClientId {
        match &self.client_id {
            Some(raw) => ClientId::from_raw(raw.clone()),
            None => ClientId::generate(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listen_port: DEFAULT_LISTEN_PORT,
            send_port: DEFAULT_SEND_PORT,
            display_name: "anonymous".to_string(),
            client_id: None,
            anti_entropy_interval_secs: 3,
        }
    }
}
