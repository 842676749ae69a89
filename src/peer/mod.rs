//! Peer management module
//!
//! Peer discovery results, the peer pool, and the session abstraction.

pub mod compact;
pub mod pool;
pub mod session;

// Re-export main types
pub use compact::parse_compact_peers;
pub use pool::{PeerPool, PoolSnapshot};
pub use session::{PeerSession, TcpPeerSession};
