//! rust-torrent-client
//!
//! BitTorrent client core: tracker announces with backup failover, a
//! concurrency-safe peer pool, and the leech-to-seed lifecycle.

pub mod client;
pub mod cli;
pub mod error;
pub mod identity;
pub mod peer;
pub mod piece;
pub mod torrent;
pub mod tracker;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Result, TorrentError};

pub use client::{Client, ClientOptions, ClientState, ClientStatus, PieceProgress, SeedSignal, SeedWait};
pub use cli::{CliArgs, Config};
pub use identity::{generate_peer_id, PeerId};
pub use peer::{PeerPool, PeerSession, PoolSnapshot, TcpPeerSession};
pub use piece::PieceBitfield;
pub use torrent::{TorrentInfo, TorrentParser};
pub use tracker::{TrackerClient, TrackerResponse};
