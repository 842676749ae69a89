//! Content descriptor
//!
//! The parsed, immutable view of a .torrent file that the client consumes.

use sha1::{Digest, Sha1};

use crate::error::{Result, TorrentError};

/// Length of one SHA-1 piece hash
pub const PIECE_HASH_LEN: usize = 20;

/// Represents a file in a multi-file torrent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TorrentFile {
    /// File path components (e.g., ["folder", "file.txt"])
    pub path: Vec<String>,
    /// File size in bytes
    pub length: u64,
}

/// High-level torrent information
#[derive(Debug, Clone)]
pub struct TorrentInfo {
    /// Primary tracker announce URL
    pub announce: String,
    /// Every tracker URL from `announce-list`, flattened, primary first
    pub announce_list: Vec<String>,
    /// SHA1 hash of info dictionary
    pub info_hash: [u8; 20],
    /// Size of each piece in bytes
    pub piece_length: u64,
    /// Expected piece hashes, in piece order
    pub pieces: Vec<[u8; 20]>,
    /// Torrent name
    pub name: String,
    /// Single file size (None for multi-file torrents)
    pub length: Option<u64>,
    /// Files in multi-file torrents (None for single-file torrents)
    pub files: Option<Vec<TorrentFile>>,
}

impl TorrentInfo {
    /// Calculate total size of all files in torrent
    pub fn total_size(&self) -> u64 {
        if let Some(length) = self.length {
            length
        } else if let Some(files) = &self.files {
            files.iter().fold(0u64, |total, f| total.saturating_add(f.length))
        } else {
            0
        }
    }

    /// Get number of pieces in torrent
    pub fn piece_count(&self) -> usize {
        self.pieces.len()
    }

    /// Check if this is a multi-file torrent
    pub fn is_multi_file(&self) -> bool {
        self.files.is_some()
    }

    /// Tracker URLs to fall back on when the primary announce fails
    pub fn backup_announces(&self) -> Vec<String> {
        self.announce_list
            .iter()
            .filter(|url| **url != self.announce)
            .cloned()
            .collect()
    }

    /// Get info hash as a hex string
    pub fn info_hash_hex(&self) -> String {
        hex::encode(self.info_hash)
    }

    /// Generate info hash from info dictionary bytes
    pub fn generate_info_hash(info_dict_bytes: &[u8]) -> [u8; 20] {
        let mut hasher = Sha1::new();
        hasher.update(info_dict_bytes);
        hasher.finalize().into()
    }

    /// Split the concatenated `pieces` field into individual hashes
    pub fn parse_piece_hashes(pieces_bytes: &[u8]) -> Result<Vec<[u8; 20]>> {
        if pieces_bytes.len() % PIECE_HASH_LEN != 0 {
            return Err(TorrentError::parse_failure(format!(
                "Pieces field length must be a multiple of 20, got {}",
                pieces_bytes.len()
            )));
        }

        Ok(pieces_bytes
            .chunks_exact(PIECE_HASH_LEN)
            .map(|chunk| {
                let mut hash = [0u8; 20];
                hash.copy_from_slice(chunk);
                hash
            })
            .collect())
    }

    /// Get byte range for a specific piece
    pub fn piece_range(&self, index: usize) -> Option<(u64, u64)> {
        if index >= self.pieces.len() {
            return None;
        }

        let total = self.total_size();
        let start = (index as u64)
            .checked_mul(self.piece_length)
            .map_or(total, |start| start.min(total));
        let end = start.saturating_add(self.piece_length).min(total);
        Some((start, end))
    }

    /// Number of pieces the declared sizes call for
    pub fn expected_piece_count(&self) -> u64 {
        match self.piece_length {
            0 => 0,
            len => self.total_size().div_ceil(len),
        }
    }

    /// Size in bytes of a single piece (the last one may be short)
    pub fn piece_size(&self, index: usize) -> u64 {
        self.piece_range(index).map_or(0, |(start, end)| end.saturating_sub(start))
    }
}
