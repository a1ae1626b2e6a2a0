//! Datagram encode/decode, gzip envelope, and fragmentation/reassembly.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use tokio::net::UdpSocket;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::crdt::types::ClientId;
use crate::error::TransportError;
use crate::net::message::Message;
use crate::net::{LISTEN_BUFFER_MIN, MAX_DATAGRAM};

const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

/// How long an incomplete reassembly buffer is kept before being dropped.
const CHUNK_BUFFER_TTL: Duration = Duration::from_secs(30);

/// How long the fragmentation sender pauses between chunks, to reduce
/// kernel send-buffer drops.
const INTER_CHUNK_DELAY: Duration = Duration::from_millis(2);

/// Raw bytes per chunk before the base64 + JSON envelope; chosen so the
/// encoded `CHUNK` message stays comfortably under [`MAX_DATAGRAM`].
const CHUNK_RAW_SIZE: usize = MAX_DATAGRAM / 2;

struct PartialMessage {
    total: usize,
    slots: Vec<Option<Vec<u8>>>,
    received: usize,
    first_seen: Instant,
}

impl PartialMessage {
    fn new(total: usize) -> Self {
        PartialMessage {
            total,
            slots: vec![None; total],
            received: 0,
            first_seen: Instant::now(),
        }
    }

    fn insert(&mut self, index: usize, bytes: Vec<u8>) {
        if index < self.slots.len() && self.slots[index].is_none() {
            self.slots[index] = Some(bytes);
            self.received += 1;
        }
    }

    fn is_complete(&self) -> bool {
        self.received == self.total
    }

    fn concat(self) -> Vec<u8> {
        self.slots.into_iter().flatten().flatten().collect()
    }
}

/// A cheap, cloneable handle for sending datagrams, shared between the
/// session task and the I/O task so sends never block on the I/O task's
/// receive loop.
#[derive(Clone)]
pub struct TransportSender {
    socket: Arc<UdpSocket>,
    own_id: ClientId,
}

impl TransportSender {
    /// Encodes `message`, gzip-wraps it, and sends it whole or fragmented
    /// across `CHUNK` datagrams depending on size.
    pub async fn send(&self, message: &Message, to: SocketAddr) -> Result<(), TransportError> {
        let json = serde_json::to_vec(message)?;
        let compressed = gzip_compress(&json);

        if compressed.len() <= MAX_DATAGRAM {
            self.socket.send_to(&compressed, to).await?;
            return Ok(());
        }

        self.send_fragmented(&compressed, to).await
    }

    async fn send_fragmented(&self, payload: &[u8], to: SocketAddr) -> Result<(), TransportError> {
        let msg_id = Uuid::new_v4();
        let total = payload.len().div_ceil(CHUNK_RAW_SIZE);

        for (index, raw_chunk) in payload.chunks(CHUNK_RAW_SIZE).enumerate() {
            let chunk = Message::Chunk {
                id: msg_id.to_string(),
                i: index,
                n: total,
                data: BASE64.encode(raw_chunk),
                from_id: self.own_id.clone(),
            };
            let encoded = serde_json::to_vec(&chunk)?;
            if encoded.len() > MAX_DATAGRAM {
                return Err(TransportError::MessageTooLarge);
            }
            self.socket.send_to(&encoded, to).await?;
            if index + 1 < total {
                tokio::time::sleep(INTER_CHUNK_DELAY).await;
            }
        }
        Ok(())
    }
}

/// Owns the listen socket and the in-flight chunk reassembly buffers. Only
/// the I/O task calls [`Transport::recv`]; the session task sends through a
/// cloned [`TransportSender`] instead so the two never contend for `&mut
/// self`.
pub struct Transport {
    socket: Arc<UdpSocket>,
    pending: HashMap<Uuid, PartialMessage>,
    own_id: ClientId,
}

impl Transport {
    pub async fn bind(listen_port: u16, own_id: ClientId) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(("0.0.0.0", listen_port)).await?;
        socket.set_broadcast(true)?;
        Ok(Transport {
            socket: Arc::new(socket),
            pending: HashMap::new(),
            own_id,
        })
    }

    /// A cloneable send-only handle backed by the same socket.
    pub fn sender(&self) -> TransportSender {
        TransportSender {
            socket: self.socket.clone(),
            own_id: self.own_id.clone(),
        }
    }

    /// Blocks for the next datagram, decodes it, and reassembles it if it
    /// is part of a `CHUNK` sequence. Returns `Ok(None)` for a datagram that
    /// was consumed into (but didn't complete) a reassembly buffer, or that
    /// failed to decode — decode failures are logged and dropped, never
    /// propagated as an error.
    pub async fn recv(&mut self) -> Result<Option<(Message, SocketAddr)>, TransportError> {
        let mut buf = vec![0u8; LISTEN_BUFFER_MIN];
        let (len, from) = self.socket.recv_from(&mut buf).await?;
        buf.truncate(len);

        self.evict_expired();

        let message = match decode_envelope(&buf) {
            Ok(message) => message,
            Err(_) => {
                warn!("dropping undecodable datagram from {from}");
                return Ok(None);
            }
        };

        match message {
            Message::Chunk { id, i, n, data, .. } => {
                let Ok(msg_id) = id.parse::<Uuid>() else {
                    warn!("dropping CHUNK with malformed id from {from}");
                    return Ok(None);
                };
                let bytes = match BASE64.decode(data.as_bytes()) {
                    Ok(bytes) => bytes,
                    Err(_) => {
                        warn!("dropping chunk from {from}: {}", TransportError::InvalidChunkEncoding);
                        return Ok(None);
                    }
                };

                let entry = self
                    .pending
                    .entry(msg_id)
                    .or_insert_with(|| PartialMessage::new(n));
                entry.insert(i, bytes);

                if entry.is_complete() {
                    let partial = self.pending.remove(&msg_id).unwrap();
                    let payload = partial.concat();
                    match decode_envelope(&payload) {
                        Ok(reassembled) => Ok(Some((reassembled, from))),
                        Err(_) => {
                            warn!("dropping undecodable reassembled message from {from}");
                            Ok(None)
                        }
                    }
                } else {
                    debug!("buffered chunk {i}/{n} of {msg_id}");
                    Ok(None)
                }
            }
            other => Ok(Some((other, from))),
        }
    }

    fn evict_expired(&mut self) {
        self.pending
            .retain(|_, partial| partial.first_seen.elapsed() < CHUNK_BUFFER_TTL);
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

fn gzip_compress(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(bytes)
        .expect("writing to an in-memory encoder cannot fail");
    encoder
        .finish()
        .expect("finishing an in-memory encoder cannot fail")
}

/// Gzip-sniffs `bytes` by magic number, decompresses if needed, and parses
/// the result as a [`Message`]. Small messages sent uncompressed are
/// tolerated.
fn decode_envelope(bytes: &[u8]) -> Result<Message, TransportError> {
    let json_bytes = if bytes.starts_with(&GZIP_MAGIC) {
        let mut decoder = GzDecoder::new(bytes);
        let mut out = Vec::new();
        decoder.read_to_end(&mut out).map_err(|_| TransportError::Decode)?;
        out
    } else {
        bytes.to_vec()
    };

    serde_json::from_slice(&json_bytes).map_err(|_| TransportError::Decode)
}
