//! Client controller
//!
//! Owns the identity, the content descriptor, the tracker client, the peer
//! pool, and the piece progress, and walks the lifecycle
//! `Initializing -> PeersDiscovered -> Leeching -> Seeding`.

use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::client::progress::PieceProgress;
use crate::client::state::ClientState;
use crate::error::{Result, TorrentError};
use crate::identity::{generate_peer_id, PeerId};
use crate::peer::{parse_compact_peers, PeerPool, PoolSnapshot};
use crate::torrent::{TorrentInfo, TorrentParser};
use crate::tracker::{TrackerClient, TrackerResponse, DEFAULT_TRACKER_TIMEOUT};

/// Settings the controller needs from the outside
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// Port announced to the tracker
    pub port: u16,
    /// Upper bound on a single tracker request
    pub tracker_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            port: 6881,
            tracker_timeout: DEFAULT_TRACKER_TIMEOUT,
        }
    }
}

/// Counters from the most recent successful announce
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AnnounceSummary {
    pub interval: u64,
    pub seeders: u64,
    pub leechers: u64,
}

impl From<&TrackerResponse> for AnnounceSummary {
    fn from(response: &TrackerResponse) -> Self {
        Self {
            interval: response.interval,
            seeders: response.complete,
            leechers: response.incomplete,
        }
    }
}

/// Read-only view for presentation
#[derive(Debug, Clone, Serialize)]
pub struct ClientStatus {
    pub name: String,
    pub info_hash: String,
    pub peer_id: String,
    pub state: ClientState,
    pub peers: PoolSnapshot,
    pub pieces_have: usize,
    pub pieces_total: usize,
    pub bytes_left: u64,
    pub tracker: AnnounceSummary,
}

/// The top-level torrent client
pub struct Client {
    id: PeerId,
    torrent: Arc<TorrentInfo>,
    tracker: TrackerClient,
    peers: Arc<PeerPool>,
    progress: Arc<PieceProgress>,
    phase: ClientState,
    port: u16,
    last_announce: AnnounceSummary,
}

impl Client {
    /// Parse a .torrent file and start a client for it
    pub async fn from_path(path: &Path, options: &ClientOptions) -> Result<Self> {
        let torrent = TorrentParser::parse_file(path)?;
        Self::new(torrent, options).await
    }

    /// Start a client for a parsed torrent.
    ///
    /// Generates the peer id, sizes the bitfield, announces, and builds the
    /// peer pool. Any failure aborts construction; an announce that yields no
    /// peers is [`TorrentError::NoPeersFound`].
    pub async fn new(torrent: TorrentInfo, options: &ClientOptions) -> Result<Self> {
        Self::with_peer_id(torrent, options, generate_peer_id()).await
    }

    /// Like [`Client::new`] with a caller-chosen peer id
    pub async fn with_peer_id(torrent: TorrentInfo, options: &ClientOptions, id: PeerId) -> Result<Self> {
        info!("Client {}: {} ({} pieces)", ClientState::Initializing, torrent.name, torrent.piece_count());

        let progress = PieceProgress::new(torrent.piece_count());
        debug!("Bitfield is {} bytes", progress.bitfield().byte_len());

        let mut tracker = TrackerClient::new(
            &torrent.announce,
            &torrent.backup_announces(),
            options.tracker_timeout,
        )?;
        tracker.init_params(torrent.info_hash, id, options.port, torrent.total_size());

        let response = tracker.announce().await?;
        let peers = PeerPool::from_compact(&response.peers, progress.bitfield().byte_len())?;
        if peers.is_empty().await {
            return Err(TorrentError::NoPeersFound);
        }

        let snapshot = peers.snapshot().await;
        info!("Client {}: {} candidate peers", ClientState::PeersDiscovered, snapshot.total());

        Ok(Self {
            id,
            torrent: Arc::new(torrent),
            tracker,
            peers: Arc::new(peers),
            progress: Arc::new(progress),
            phase: ClientState::PeersDiscovered,
            port: options.port,
            last_announce: AnnounceSummary::from(&response),
        })
    }

    /// Mark session workers as attached; moves `PeersDiscovered` to `Leeching`
    pub fn attach(&mut self) -> ClientState {
        if self.phase == ClientState::PeersDiscovered {
            self.phase = ClientState::Leeching;
            info!("Client {}", self.phase);
        }
        self.state()
    }

    /// Current lifecycle state
    pub fn state(&self) -> ClientState {
        if self.progress.is_seeding() {
            ClientState::Seeding
        } else {
            self.phase
        }
    }

    /// Record a verified piece; `true` when this call started seeding
    pub async fn mark_piece_complete(&self, index: usize) -> Result<bool> {
        self.progress.mark_piece_complete(index).await
    }

    /// Re-announce and track any newly returned peers.
    ///
    /// Returns how many addresses were not already in the pool.
    pub async fn refresh_peers(&mut self) -> Result<usize> {
        let left = self.bytes_left().await;
        self.tracker.init_params(self.torrent.info_hash, self.id, self.port, left);

        let response = self.tracker.announce().await?;
        self.last_announce = AnnounceSummary::from(&response);

        let mut added = 0;
        for addr in parse_compact_peers(&response.peers)? {
            if self.peers.add_inactive(addr).await {
                added += 1;
            }
        }
        info!("Re-announce found {} new peers", added);
        Ok(added)
    }

    /// Bytes still missing, from the local bitfield
    pub async fn bytes_left(&self) -> u64 {
        let bits = self.progress.bitfield().to_bytes().await;
        (0..self.torrent.piece_count())
            .filter(|i| bits[i / 8] & (0x80 >> (i % 8)) == 0)
            .map(|i| self.torrent.piece_size(i))
            .sum()
    }

    /// Tracker's requested re-announce interval, if it gave one
    pub fn announce_interval(&self) -> Option<Duration> {
        match self.last_announce.interval {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub async fn status(&self) -> ClientStatus {
        ClientStatus {
            name: self.torrent.name.clone(),
            info_hash: self.torrent.info_hash_hex(),
            peer_id: hex::encode(self.id),
            state: self.state(),
            peers: self.peers.snapshot().await,
            pieces_have: self.progress.bitfield().count().await,
            pieces_total: self.torrent.piece_count(),
            bytes_left: self.bytes_left().await,
            tracker: self.last_announce,
        }
    }

    pub fn id(&self) -> &PeerId {
        &self.id
    }

    pub fn torrent(&self) -> &Arc<TorrentInfo> {
        &self.torrent
    }

    pub fn peers(&self) -> &Arc<PeerPool> {
        &self.peers
    }

    pub fn progress(&self) -> &Arc<PieceProgress> {
        &self.progress
    }

    pub fn tracker(&self) -> &TrackerClient {
        &self.tracker
    }
}
