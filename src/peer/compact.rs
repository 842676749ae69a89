//! Compact peer format
//!
//! 6 bytes per peer: 4 bytes IPv4 address + 2 bytes port, both big-endian.

use bytes::Buf;
use std::net::{Ipv4Addr, SocketAddr};
use tracing::trace;

use crate::error::{Result, TorrentError};

/// Size of one compact peer record
pub const COMPACT_PEER_LEN: usize = 6;

/// Decode a compact peers string into socket addresses
pub fn parse_compact_peers(data: &[u8]) -> Result<Vec<SocketAddr>> {
    if data.len() % COMPACT_PEER_LEN != 0 {
        return Err(TorrentError::malformed_peer_list(data.len()));
    }

    let mut buf = data;
    let mut peers = Vec::with_capacity(data.len() / COMPACT_PEER_LEN);
    while buf.has_remaining() {
        let ip = Ipv4Addr::from(buf.get_u32());
        let port = buf.get_u16();
        peers.push(SocketAddr::new(ip.into(), port));
    }

    trace!("Decoded {} compact peers", peers.len());
    Ok(peers)
}
