//! Piece bitfield
//!
//! One bit per piece, most significant bit first, as sent in the BitTorrent
//! `bitfield` message. The length is fixed at construction.

use tokio::sync::RwLock;
use tracing::{debug, trace};

use crate::error::{Result, TorrentError};

#[derive(Debug)]
struct Bits {
    bytes: Vec<u8>,
    /// Number of set bits, kept in step with `bytes`
    have: usize,
}

/// Concurrency-safe possession vector for a torrent's pieces
#[derive(Debug)]
pub struct PieceBitfield {
    bits: RwLock<Bits>,
    num_pieces: usize,
}

impl PieceBitfield {
    /// Create an all-clear bitfield of `ceil(num_pieces / 8)` bytes
    pub fn new(num_pieces: usize) -> Self {
        let byte_len = (num_pieces + 7) / 8;
        debug!("Creating bitfield for {} pieces ({} bytes)", num_pieces, byte_len);
        Self {
            bits: RwLock::new(Bits {
                bytes: vec![0u8; byte_len],
                have: 0,
            }),
            num_pieces,
        }
    }

    pub fn num_pieces(&self) -> usize {
        self.num_pieces
    }

    /// Length of the bitfield in bytes
    pub fn byte_len(&self) -> usize {
        (self.num_pieces + 7) / 8
    }

    fn locate(&self, index: usize) -> Result<(usize, u8)> {
        if index >= self.num_pieces {
            return Err(TorrentError::index_out_of_range(index, self.num_pieces));
        }
        Ok((index / 8, 0x80 >> (index % 8)))
    }

    /// Check if we hold a specific piece
    pub async fn has_piece(&self, index: usize) -> Result<bool> {
        let (byte, mask) = self.locate(index)?;
        Ok(self.bits.read().await.bytes[byte] & mask != 0)
    }

    /// Mark a piece as held. Returns `true` if the bit was not already set.
    pub async fn set_piece(&self, index: usize) -> Result<bool> {
        let (byte, mask) = self.locate(index)?;
        let mut bits = self.bits.write().await;
        if bits.bytes[byte] & mask != 0 {
            trace!("Piece {} already set", index);
            return Ok(false);
        }
        bits.bytes[byte] |= mask;
        bits.have += 1;
        trace!("Piece {} set ({}/{})", index, bits.have, self.num_pieces);
        Ok(true)
    }

    /// Whether every expected piece is held
    pub async fn is_complete(&self) -> bool {
        self.bits.read().await.have == self.num_pieces
    }

    /// Number of pieces held
    pub async fn count(&self) -> usize {
        self.bits.read().await.have
    }

    /// Copy of the raw bitfield bytes
    pub async fn to_bytes(&self) -> Vec<u8> {
        self.bits.read().await.bytes.clone()
    }
}
