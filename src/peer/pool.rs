//! Peer pool
//!
//! Splits every peer the client knows about into *inactive* addresses
//! (discovered, not yet connected) and *active* sessions keyed by peer id.
//! Both sets sit behind one lock and an address is never tracked twice.

use serde::Serialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::sync::RwLock;
use tracing::{debug, info, trace, warn};

use crate::error::{Result, TorrentError};
use crate::identity::PeerId;
use crate::peer::compact::parse_compact_peers;
use crate::peer::session::PeerSession;

/// Point-in-time peer counts for presentation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolSnapshot {
    pub active: usize,
    pub inactive: usize,
}

impl PoolSnapshot {
    pub fn total(&self) -> usize {
        self.active + self.inactive
    }
}

struct ActivePeer {
    addr: SocketAddr,
    session: Box<dyn PeerSession>,
}

#[derive(Default)]
struct PoolInner {
    active: HashMap<PeerId, ActivePeer>,
    inactive: Vec<SocketAddr>,
}

impl PoolInner {
    fn knows(&self, addr: &SocketAddr) -> bool {
        self.inactive.contains(addr) || self.active.values().any(|p| p.addr == *addr)
    }
}

/// Concurrency-safe set of known peers
pub struct PeerPool {
    inner: RwLock<PoolInner>,
    /// Length in bytes of a peer's bitfield for this torrent
    bitfield_len: usize,
}

impl PeerPool {
    /// Create an empty pool
    pub fn new(bitfield_len: usize) -> Self {
        Self {
            inner: RwLock::new(PoolInner::default()),
            bitfield_len,
        }
    }

    /// Build a pool from a tracker's compact peers string.
    ///
    /// Every decoded address starts inactive; repeated addresses collapse.
    pub fn from_compact(raw: &[u8], bitfield_len: usize) -> Result<Self> {
        let mut inactive: Vec<SocketAddr> = Vec::new();
        for addr in parse_compact_peers(raw)? {
            if !inactive.contains(&addr) {
                inactive.push(addr);
            }
        }

        debug!("Peer pool seeded with {} addresses", inactive.len());
        Ok(Self {
            inner: RwLock::new(PoolInner {
                active: HashMap::new(),
                inactive,
            }),
            bitfield_len,
        })
    }

    pub fn bitfield_len(&self) -> usize {
        self.bitfield_len
    }

    /// Track a newly discovered address. Returns `false` if it was already known.
    pub async fn add_inactive(&self, addr: SocketAddr) -> bool {
        let mut inner = self.inner.write().await;
        if inner.knows(&addr) {
            trace!("Peer {} already tracked, skipping", addr);
            return false;
        }
        inner.inactive.push(addr);
        debug!("Added inactive peer: {} (inactive: {})", addr, inner.inactive.len());
        true
    }

    /// Bind a connected session to its peer id.
    ///
    /// `addr` must currently be inactive. The connection attempt itself has to
    /// finish before this is called; nothing here waits on the network.
    pub async fn promote_to_active(
        &self,
        addr: SocketAddr,
        peer_id: PeerId,
        session: Box<dyn PeerSession>,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;

        let position = inner
            .inactive
            .iter()
            .position(|a| *a == addr)
            .ok_or_else(|| {
                warn!("Attempted to promote unknown peer {}", addr);
                TorrentError::unknown_peer(addr.to_string())
            })?;

        if inner.active.contains_key(&peer_id) {
            warn!("Peer id {} already active, keeping {} inactive", hex::encode(peer_id), addr);
            return Err(TorrentError::duplicate_peer(&peer_id));
        }

        inner.inactive.swap_remove(position);
        inner.active.insert(peer_id, ActivePeer { addr, session });
        info!(
            "Peer {} is active as {} (active: {}, inactive: {})",
            addr,
            hex::encode(peer_id),
            inner.active.len(),
            inner.inactive.len()
        );
        Ok(())
    }

    /// Forget a peer whose session ended.
    ///
    /// The session is handed back so the caller can close it outside the
    /// lock. The address is not returned to the inactive set.
    pub async fn remove_active(&self, peer_id: &PeerId) -> Option<Box<dyn PeerSession>> {
        let mut inner = self.inner.write().await;
        let removed = inner.active.remove(peer_id);
        match &removed {
            Some(peer) => debug!("Removed active peer {} ({})", hex::encode(peer_id), peer.addr),
            None => trace!("No active peer {}", hex::encode(peer_id)),
        }
        removed.map(|peer| peer.session)
    }

    /// Drop active sessions whose remote end has gone away.
    ///
    /// Sessions are checked and closed with the lock released. Returns the
    /// addresses that were dropped; like [`PeerPool::remove_active`], they
    /// are not put back into the inactive set.
    pub async fn prune_closed(&self) -> Vec<SocketAddr> {
        let checked: Vec<(PeerId, ActivePeer)> = self.inner.write().await.active.drain().collect();

        let mut live = Vec::with_capacity(checked.len());
        let mut closed = Vec::new();
        for (peer_id, mut peer) in checked {
            if peer.session.is_alive().await {
                live.push((peer_id, peer));
                continue;
            }
            if let Err(e) = peer.session.close().await {
                debug!("Closing {} failed: {}", peer.addr, e);
            }
            closed.push(peer.addr);
        }

        let mut inner = self.inner.write().await;
        for (peer_id, peer) in live {
            // A session promoted while the check ran takes precedence.
            inner.active.entry(peer_id).or_insert(peer);
        }
        if !closed.is_empty() {
            info!("Dropped {} closed peers (active: {})", closed.len(), inner.active.len());
        }
        closed
    }

    /// Consistent active/inactive counts
    pub async fn snapshot(&self) -> PoolSnapshot {
        let inner = self.inner.read().await;
        PoolSnapshot {
            active: inner.active.len(),
            inactive: inner.inactive.len(),
        }
    }

    /// Copy of the addresses waiting for a connection attempt
    pub async fn inactive_addrs(&self) -> Vec<SocketAddr> {
        self.inner.read().await.inactive.clone()
    }

    /// Whether a peer id is bound to a live session
    pub async fn is_active(&self, peer_id: &PeerId) -> bool {
        self.inner.read().await.active.contains_key(peer_id)
    }

    pub async fn is_empty(&self) -> bool {
        self.snapshot().await.total() == 0
    }
}
