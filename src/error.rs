//! Error types for the torrent client
//!
//! Every fallible operation in the library returns [`TorrentError`]. Startup
//! errors (descriptor, primary tracker URL, peer discovery) abort client
//! construction; session-level errors stay local to one peer.

use std::fmt;

/// Result alias used across the library
pub type Result<T> = std::result::Result<T, TorrentError>;

/// Comprehensive error type for client operations
#[derive(Debug, Clone)]
pub enum TorrentError {
    /// The content descriptor could not be read or parsed
    ParseFailure {
        message: String,
        source: Option<String>,
    },

    /// A tracker announce URL could not be parsed
    InvalidUrl {
        url: String,
        source: Option<String>,
    },

    /// The tracker (or a peer) could not be reached
    NetworkFailure {
        message: String,
        address: Option<String>,
        source: Option<String>,
    },

    /// The tracker answered, but the body is unusable
    DecodeFailure {
        message: String,
        source: Option<String>,
    },

    /// The compact peers string is not a whole number of 6-byte records
    MalformedPeerList {
        length: usize,
    },

    /// Peer discovery produced no candidate peers
    NoPeersFound,

    /// A piece index past the end of the bitfield
    IndexOutOfRange {
        index: usize,
        num_pieces: usize,
    },

    /// The peer pool was asked to promote an address it does not track
    UnknownPeer {
        peer: String,
    },

    /// The peer id is already bound to an active session
    DuplicatePeer {
        peer_id: String,
    },

    /// A single peer session failed
    PeerError {
        message: String,
        peer: Option<String>,
        source: Option<String>,
    },

    /// Configuration errors
    ConfigError {
        message: String,
        field: Option<String>,
    },
}

impl TorrentError {
    /// Create a new ParseFailure
    pub fn parse_failure(message: impl Into<String>) -> Self {
        TorrentError::ParseFailure {
            message: message.into(),
            source: None,
        }
    }

    /// Create a new ParseFailure with source
    pub fn parse_failure_with_source(message: impl Into<String>, source: impl Into<String>) -> Self {
        TorrentError::ParseFailure {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create a new InvalidUrl
    pub fn invalid_url(url: impl Into<String>, source: impl Into<String>) -> Self {
        TorrentError::InvalidUrl {
            url: url.into(),
            source: Some(source.into()),
        }
    }

    /// Create a new NetworkFailure
    pub fn network_failure(message: impl Into<String>) -> Self {
        TorrentError::NetworkFailure {
            message: message.into(),
            address: None,
            source: None,
        }
    }

    /// Create a new NetworkFailure with address and source
    pub fn network_failure_full(message: impl Into<String>, address: impl Into<String>, source: impl Into<String>) -> Self {
        TorrentError::NetworkFailure {
            message: message.into(),
            address: Some(address.into()),
            source: Some(source.into()),
        }
    }

    /// Create a new DecodeFailure
    pub fn decode_failure(message: impl Into<String>) -> Self {
        TorrentError::DecodeFailure {
            message: message.into(),
            source: None,
        }
    }

    /// Create a new DecodeFailure with source
    pub fn decode_failure_with_source(message: impl Into<String>, source: impl Into<String>) -> Self {
        TorrentError::DecodeFailure {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn malformed_peer_list(length: usize) -> Self {
        TorrentError::MalformedPeerList { length }
    }

    pub fn index_out_of_range(index: usize, num_pieces: usize) -> Self {
        TorrentError::IndexOutOfRange { index, num_pieces }
    }

    pub fn unknown_peer(peer: impl Into<String>) -> Self {
        TorrentError::UnknownPeer { peer: peer.into() }
    }

    pub fn duplicate_peer(peer_id: &[u8; 20]) -> Self {
        TorrentError::DuplicatePeer {
            peer_id: hex::encode(peer_id),
        }
    }

    /// Create a new PeerError with peer and source
    pub fn peer_error_full(message: impl Into<String>, peer: impl Into<String>, source: impl Into<String>) -> Self {
        TorrentError::PeerError {
            message: message.into(),
            peer: Some(peer.into()),
            source: Some(source.into()),
        }
    }

    /// Create a new ConfigError
    pub fn config_error(message: impl Into<String>) -> Self {
        TorrentError::ConfigError {
            message: message.into(),
            field: None,
        }
    }

    /// Create a new ConfigError with field
    pub fn config_error_with_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        TorrentError::ConfigError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Whether a tracker announce should move on to the next endpoint
    pub fn is_network_failure(&self) -> bool {
        matches!(self, TorrentError::NetworkFailure { .. })
    }

    /// Add context to the error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        let ctx = context.into();
        match &mut self {
            TorrentError::ParseFailure { source, .. }
            | TorrentError::InvalidUrl { source, .. }
            | TorrentError::NetworkFailure { source, .. }
            | TorrentError::DecodeFailure { source, .. }
            | TorrentError::PeerError { source, .. } => {
                *source = Some(source.as_ref().map_or_else(|| ctx.clone(), |s| format!("{}: {}", s, ctx)));
            }
            _ => {}
        }
        self
    }
}

impl fmt::Display for TorrentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TorrentError::ParseFailure { message, source } => match source {
                Some(src) => write!(f, "Parse failure: {} (source: {})", message, src),
                None => write!(f, "Parse failure: {}", message),
            },
            TorrentError::InvalidUrl { url, source } => match source {
                Some(src) => write!(f, "Invalid URL '{}': {}", url, src),
                None => write!(f, "Invalid URL '{}'", url),
            },
            TorrentError::NetworkFailure { message, address, source } => match (address, source) {
                (Some(a), Some(s)) => write!(f, "Network failure: {} (address: {}, source: {})", message, a, s),
                (Some(a), None) => write!(f, "Network failure: {} (address: {})", message, a),
                (None, Some(s)) => write!(f, "Network failure: {} (source: {})", message, s),
                (None, None) => write!(f, "Network failure: {}", message),
            },
            TorrentError::DecodeFailure { message, source } => match source {
                Some(src) => write!(f, "Decode failure: {} (source: {})", message, src),
                None => write!(f, "Decode failure: {}", message),
            },
            TorrentError::MalformedPeerList { length } => {
                write!(f, "Malformed peer list: {} bytes is not a multiple of 6", length)
            }
            TorrentError::NoPeersFound => write!(f, "No peers found"),
            TorrentError::IndexOutOfRange { index, num_pieces } => {
                write!(f, "Piece index {} out of range ({} pieces)", index, num_pieces)
            }
            TorrentError::UnknownPeer { peer } => write!(f, "Unknown peer: {}", peer),
            TorrentError::DuplicatePeer { peer_id } => write!(f, "Peer {} is already active", peer_id),
            TorrentError::PeerError { message, peer, source } => match (peer, source) {
                (Some(p), Some(s)) => write!(f, "Peer error: {} (peer: {}, source: {})", message, p, s),
                (Some(p), None) => write!(f, "Peer error: {} (peer: {})", message, p),
                (None, Some(s)) => write!(f, "Peer error: {} (source: {})", message, s),
                (None, None) => write!(f, "Peer error: {}", message),
            },
            TorrentError::ConfigError { message, field } => match field {
                Some(field_val) => write!(f, "Config error: {} (field: {})", message, field_val),
                None => write!(f, "Config error: {}", message),
            },
        }
    }
}

impl std::error::Error for TorrentError {}

impl From<std::io::Error> for TorrentError {
    fn from(err: std::io::Error) -> Self {
        TorrentError::NetworkFailure {
            message: err.to_string(),
            address: None,
            source: Some(err.kind().to_string()),
        }
    }
}

impl From<serde_bencode::Error> for TorrentError {
    fn from(err: serde_bencode::Error) -> Self {
        TorrentError::parse_failure_with_source("Failed to parse bencode data", err.to_string())
    }
}

impl From<reqwest::Error> for TorrentError {
    fn from(err: reqwest::Error) -> Self {
        let address = err.url().map(|u| u.to_string());
        TorrentError::NetworkFailure {
            message: if err.is_timeout() {
                "Tracker request timed out".to_string()
            } else {
                "Tracker request failed".to_string()
            },
            address,
            source: Some(err.to_string()),
        }
    }
}

impl From<tokio::time::error::Elapsed> for TorrentError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        TorrentError::network_failure("Operation timed out")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_failure() {
        let err = TorrentError::parse_failure("Invalid torrent file");
        assert_eq!(err.to_string(), "Parse failure: Invalid torrent file");
    }

    #[test]
    fn test_malformed_peer_list_message() {
        let err = TorrentError::malformed_peer_list(7);
        assert_eq!(err.to_string(), "Malformed peer list: 7 bytes is not a multiple of 6");
    }

    #[test]
    fn test_network_failure_full() {
        let err = TorrentError::network_failure_full("Connection refused", "127.0.0.1:6969", "os error 111");
        assert!(err.is_network_failure());
        assert!(err.to_string().contains("127.0.0.1:6969"));
        assert!(err.to_string().contains("os error 111"));
    }

    #[test]
    fn test_decode_failure_is_not_network_failure() {
        assert!(!TorrentError::decode_failure("bad body").is_network_failure());
        assert!(!TorrentError::malformed_peer_list(5).is_network_failure());
    }

    #[test]
    fn test_duplicate_peer_renders_hex() {
        let err = TorrentError::duplicate_peer(&[0xab; 20]);
        assert!(err.to_string().contains(&"ab".repeat(20)));
    }

    #[test]
    fn test_with_context() {
        let err = TorrentError::decode_failure("Invalid data").with_context("while announcing");
        assert!(err.to_string().contains("while announcing"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err: TorrentError = io_err.into();
        assert!(matches!(err, TorrentError::NetworkFailure { .. }));
    }

    #[test]
    fn test_config_error_with_field() {
        let err = TorrentError::config_error_with_field("Invalid value", "max_connections");
        assert!(err.to_string().contains("Config error"));
        assert!(err.to_string().contains("max_connections"));
    }
}
