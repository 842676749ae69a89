//! Peer sessions
//!
//! The pool only needs to know that a session can be opened and that a
//! successful open yields the remote peer id. Message exchange and block
//! transfer live behind this trait, outside the client core.

use async_trait::async_trait;
use bytes::{BufMut, BytesMut};
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};
use tracing::{debug, error, info, warn};

use crate::error::{Result, TorrentError};
use crate::identity::PeerId;

/// BitTorrent protocol identifier string
pub const PROTOCOL_STRING: &[u8; 19] = b"BitTorrent protocol";

/// Length of a handshake on the wire
pub const HANDSHAKE_LEN: usize = 68;

/// Default TCP connect and handshake timeout
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// A connection to one remote peer
#[async_trait]
pub trait PeerSession: Send + Sync {
    /// Remote address this session talks to
    fn addr(&self) -> SocketAddr;

    /// Open the session and learn the remote peer id
    async fn connect(&mut self) -> Result<PeerId>;

    /// Whether the remote end is still there. Must not block.
    async fn is_alive(&self) -> bool {
        true
    }

    /// Tear the session down
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// TCP session that performs the BitTorrent handshake on connect
pub struct TcpPeerSession {
    addr: SocketAddr,
    info_hash: [u8; 20],
    our_peer_id: PeerId,
    connect_timeout: Duration,
    stream: Option<TcpStream>,
}

impl TcpPeerSession {
    pub fn new(addr: SocketAddr, info_hash: [u8; 20], our_peer_id: PeerId) -> Self {
        Self {
            addr,
            info_hash,
            our_peer_id,
            connect_timeout: CONNECT_TIMEOUT,
            stream: None,
        }
    }

    pub fn with_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Whether the handshake has completed and the socket is open
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    async fn handshake(&self, stream: &mut TcpStream) -> Result<PeerId> {
        stream
            .write_all(&encode_handshake(&self.info_hash, &self.our_peer_id))
            .await
            .map_err(|e| TorrentError::peer_error_full("Failed to send handshake", self.addr.to_string(), e.to_string()))?;

        let mut reply = [0u8; HANDSHAKE_LEN];
        stream
            .read_exact(&mut reply)
            .await
            .map_err(|e| TorrentError::peer_error_full("Failed to read handshake", self.addr.to_string(), e.to_string()))?;

        decode_handshake(&reply, &self.info_hash)
            .map_err(|e| e.with_context(format!("handshake with {}", self.addr)))
    }
}

#[async_trait]
impl PeerSession for TcpPeerSession {
    fn addr(&self) -> SocketAddr {
        self.addr
    }

    async fn connect(&mut self) -> Result<PeerId> {
        info!("Connecting to peer: {}", self.addr);

        let mut stream = timeout(self.connect_timeout, TcpStream::connect(self.addr))
            .await
            .map_err(|e| {
                warn!("Connection timeout to {}", self.addr);
                TorrentError::network_failure_full("Connection timeout", self.addr.to_string(), e.to_string())
            })?
            .map_err(|e| {
                debug!("Failed to connect to {}: {}", self.addr, e);
                TorrentError::network_failure_full("Failed to connect", self.addr.to_string(), e.to_string())
            })?;

        let peer_id = timeout(self.connect_timeout, self.handshake(&mut stream))
            .await
            .map_err(|e| TorrentError::peer_error_full("Handshake timeout", self.addr.to_string(), e.to_string()))??;

        info!("Handshake completed with {} (peer id {})", self.addr, hex::encode(peer_id));
        self.stream = Some(stream);
        Ok(peer_id)
    }

    async fn is_alive(&self) -> bool {
        let Some(stream) = &self.stream else {
            return false;
        };

        // A zero timeout turns the peek into a readiness poll.
        let mut probe = [0u8; 1];
        match timeout(Duration::ZERO, stream.peek(&mut probe)).await {
            Err(_) => true,
            Ok(Ok(0)) => {
                debug!("Peer {} closed the connection", self.addr);
                false
            }
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                debug!("Connection to {} failed: {}", self.addr, e);
                false
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            debug!("Closing connection to {}", self.addr);
            if let Err(e) = stream.shutdown().await {
                error!("Failed to shut down connection to {}: {}", self.addr, e);
                return Err(TorrentError::peer_error_full("Failed to close connection", self.addr.to_string(), e.to_string()));
            }
        }
        Ok(())
    }
}

/// Serialize a handshake: pstrlen, pstr, 8 reserved bytes, info hash, peer id
pub fn encode_handshake(info_hash: &[u8; 20], peer_id: &PeerId) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(HANDSHAKE_LEN);
    buf.put_u8(PROTOCOL_STRING.len() as u8);
    buf.put_slice(PROTOCOL_STRING);
    buf.put_slice(&[0u8; 8]);
    buf.put_slice(info_hash);
    buf.put_slice(peer_id);
    buf.to_vec()
}

/// Validate a peer's handshake and return its peer id
pub fn decode_handshake(data: &[u8; HANDSHAKE_LEN], expected_info_hash: &[u8; 20]) -> Result<PeerId> {
    if data[0] as usize != PROTOCOL_STRING.len() || &data[1..20] != PROTOCOL_STRING {
        return Err(TorrentError::PeerError {
            message: "Invalid protocol string".to_string(),
            peer: None,
            source: None,
        });
    }
    if &data[28..48] != expected_info_hash {
        return Err(TorrentError::PeerError {
            message: "Info hash mismatch".to_string(),
            peer: None,
            source: Some(hex::encode(&data[28..48])),
        });
    }

    let mut peer_id = [0u8; 20];
    peer_id.copy_from_slice(&data[48..68]);
    Ok(peer_id)
}
