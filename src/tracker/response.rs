//! Tracker announce response
//!
//! Decodes the bencoded dictionary a tracker returns for an announce.

use serde_bencode::value::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::error::{Result, TorrentError};
use crate::peer::compact::COMPACT_PEER_LEN;

/// Decoded announce response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackerResponse {
    /// Seconds the tracker wants between announces
    pub interval: u64,
    /// Number of seeders
    pub complete: u64,
    /// Number of leechers
    pub incomplete: u64,
    /// Compact peers string, a whole number of 6-byte records
    pub peers: Vec<u8>,
    /// Optional `warning message` from the tracker
    pub warning: Option<String>,
}

impl TrackerResponse {
    /// Decode a response body
    pub fn from_bencode(body: &[u8]) -> Result<Self> {
        let value: Value = serde_bencode::from_bytes(body).map_err(|e| {
            TorrentError::decode_failure_with_source("Tracker response is not valid bencode", e.to_string())
        })?;
        let dict = match value {
            Value::Dict(dict) => dict,
            _ => return Err(TorrentError::decode_failure("Tracker response is not a dictionary")),
        };

        if let Some(reason) = string_field(&dict, b"failure reason") {
            return Err(TorrentError::decode_failure_with_source("Tracker refused announce", reason));
        }

        let peers = match dict.get(b"peers".as_slice()) {
            Some(Value::Bytes(peers)) => peers.clone(),
            Some(Value::List(_)) => {
                return Err(TorrentError::decode_failure("Tracker sent a non-compact peer list"));
            }
            Some(_) => return Err(TorrentError::decode_failure("peers must be a byte string")),
            None => Vec::new(),
        };
        if peers.len() % COMPACT_PEER_LEN != 0 {
            return Err(TorrentError::malformed_peer_list(peers.len()));
        }

        let warning = string_field(&dict, b"warning message");
        if let Some(message) = &warning {
            warn!("Tracker warning: {}", message);
        }

        let response = Self {
            interval: int_field(&dict, b"interval"),
            complete: int_field(&dict, b"complete"),
            incomplete: int_field(&dict, b"incomplete"),
            peers,
            warning,
        };
        debug!(
            "Tracker response: interval={}s complete={} incomplete={} peers={}",
            response.interval,
            response.complete,
            response.incomplete,
            response.peer_count()
        );
        Ok(response)
    }

    /// Number of peer records in the compact string
    pub fn peer_count(&self) -> usize {
        self.peers.len() / COMPACT_PEER_LEN
    }
}

fn int_field(dict: &HashMap<Vec<u8>, Value>, key: &[u8]) -> u64 {
    match dict.get(key) {
        Some(Value::Int(i)) if *i > 0 => *i as u64,
        _ => 0,
    }
}

fn string_field(dict: &HashMap<Vec<u8>, Value>, key: &[u8]) -> Option<String> {
    match dict.get(key) {
        Some(Value::Bytes(bytes)) => Some(String::from_utf8_lossy(bytes).into_owned()),
        _ => None,
    }
}
