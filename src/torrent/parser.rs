//! Torrent file parser
//!
//! Turns bencoded .torrent bytes into a [`TorrentInfo`].

use serde_bencode::value::Value;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, trace};

use crate::error::{Result, TorrentError};
use crate::torrent::info::{TorrentFile, TorrentInfo};

type Dict = HashMap<Vec<u8>, Value>;

/// Parser for .torrent files
pub struct TorrentParser;

impl TorrentParser {
    /// Parse a .torrent file from bytes
    pub fn parse_bytes(data: &[u8]) -> Result<TorrentInfo> {
        info!("Parsing torrent file from {} bytes", data.len());
        trace!("Torrent data (first 100 bytes): {:?}", &data[..data.len().min(100)]);

        let root = match serde_bencode::from_bytes::<Value>(data)? {
            Value::Dict(dict) => dict,
            _ => return Err(TorrentError::parse_failure("Root must be a dictionary")),
        };

        Self::convert_to_torrent_info(&root)
    }

    /// Parse a .torrent file from a file path
    pub fn parse_file(path: &Path) -> Result<TorrentInfo> {
        info!("Loading torrent file from: {}", path.display());

        let data = std::fs::read(path).map_err(|e| {
            TorrentError::parse_failure_with_source(
                format!("Failed to read torrent file '{}'", path.display()),
                e.to_string(),
            )
        })?;

        debug!("Read {} bytes from torrent file", data.len());
        Self::parse_bytes(&data)
    }

    fn convert_to_torrent_info(root: &Dict) -> Result<TorrentInfo> {
        let mut announce_list = Vec::new();
        if let Some(Value::List(tiers)) = root.get(b"announce-list".as_slice()) {
            for tier in tiers {
                if let Value::List(urls) = tier {
                    for url in urls.iter().filter_map(as_string) {
                        if !announce_list.contains(&url) {
                            announce_list.push(url);
                        }
                    }
                }
            }
        }

        let announce = match root.get(b"announce".as_slice()).and_then(as_string) {
            Some(url) => url,
            None => announce_list
                .first()
                .cloned()
                .ok_or_else(|| TorrentError::parse_failure("Missing announce field"))?,
        };
        if !announce_list.contains(&announce) {
            announce_list.insert(0, announce.clone());
        }

        let info_value = root
            .get(b"info".as_slice())
            .ok_or_else(|| TorrentError::parse_failure("Missing info dictionary"))?;
        let info_dict = match info_value {
            Value::Dict(dict) => dict,
            _ => return Err(TorrentError::parse_failure("info must be a dictionary")),
        };

        let name = info_dict
            .get(b"name".as_slice())
            .and_then(as_string)
            .ok_or_else(|| TorrentError::parse_failure("Missing name field"))?;

        let piece_length = info_dict
            .get(b"piece length".as_slice())
            .and_then(as_u64)
            .filter(|len| *len > 0)
            .ok_or_else(|| TorrentError::parse_failure("Missing piece length"))?;

        let pieces_bytes = match info_dict.get(b"pieces".as_slice()) {
            Some(Value::Bytes(bytes)) => bytes,
            _ => return Err(TorrentError::parse_failure("Missing pieces field")),
        };
        let pieces = TorrentInfo::parse_piece_hashes(pieces_bytes)?;
        if pieces.is_empty() {
            return Err(TorrentError::parse_failure("Torrent has no pieces"));
        }

        let (length, files) = if let Some(len) = info_dict.get(b"length".as_slice()) {
            let len = as_u64(len).ok_or_else(|| TorrentError::parse_failure("Invalid length field"))?;
            (Some(len), None)
        } else if let Some(Value::List(entries)) = info_dict.get(b"files".as_slice()) {
            (None, Some(Self::parse_files(entries)?))
        } else {
            return Err(TorrentError::parse_failure("Neither length nor files found in info dict"));
        };

        if let Some(files) = &files {
            files
                .iter()
                .try_fold(0u64, |total, f| total.checked_add(f.length))
                .ok_or_else(|| TorrentError::parse_failure("Total size of files overflows"))?;
        }

        // Re-encoding sorts keys, which reproduces the canonical info dict bytes.
        let info_bytes = serde_bencode::to_bytes(info_value)?;
        let info_hash = TorrentInfo::generate_info_hash(&info_bytes);

        let torrent = TorrentInfo {
            announce,
            announce_list,
            info_hash,
            piece_length,
            pieces,
            name,
            length,
            files,
        };

        let expected = torrent.expected_piece_count();
        if expected != torrent.piece_count() as u64 {
            return Err(TorrentError::parse_failure(format!(
                "{} bytes at piece length {} needs {} pieces, found {}",
                torrent.total_size(),
                torrent.piece_length,
                expected,
                torrent.piece_count()
            )));
        }

        info!("Successfully converted torrent info: {}", torrent.name);
        Ok(torrent)
    }

    fn parse_files(entries: &[Value]) -> Result<Vec<TorrentFile>> {
        let mut files = Vec::with_capacity(entries.len());
        for entry in entries {
            let Value::Dict(file_dict) = entry else {
                return Err(TorrentError::parse_failure("File entry must be a dictionary"));
            };

            let length = file_dict
                .get(b"length".as_slice())
                .and_then(as_u64)
                .ok_or_else(|| TorrentError::parse_failure("Missing file length"))?;

            let path = match file_dict.get(b"path".as_slice()) {
                Some(Value::List(parts)) => parts.iter().filter_map(as_string).collect(),
                _ => return Err(TorrentError::parse_failure("Missing file path")),
            };

            files.push(TorrentFile { path, length });
        }
        Ok(files)
    }
}

fn as_string(value: &Value) -> Option<String> {
    match value {
        Value::Bytes(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        _ => None,
    }
}

fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Int(i) if *i >= 0 => Some(*i as u64),
        _ => None,
    }
}
