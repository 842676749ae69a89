//! Piece progress
//!
//! Shared between the controller and every peer-session worker: the local
//! bitfield and the seed signal it drives.

use tracing::{debug, info};

use crate::client::signal::{SeedSignal, SeedWait};
use crate::error::Result;
use crate::piece::PieceBitfield;

#[derive(Debug)]
pub struct PieceProgress {
    bitfield: PieceBitfield,
    seed: SeedSignal,
}

impl PieceProgress {
    pub fn new(num_pieces: usize) -> Self {
        Self {
            bitfield: PieceBitfield::new(num_pieces),
            seed: SeedSignal::new(),
        }
    }

    /// Record a piece that passed hash verification.
    ///
    /// Returns `true` only for the call that completed the torrent and fired
    /// the seed signal.
    pub async fn mark_piece_complete(&self, index: usize) -> Result<bool> {
        if self.bitfield.set_piece(index).await? {
            debug!("Piece {} complete", index);
        }

        // Read after the write so every earlier set_piece is visible.
        if self.bitfield.is_complete().await && self.seed.fire() {
            info!("Download complete: {} pieces", self.bitfield.num_pieces());
            return Ok(true);
        }
        Ok(false)
    }

    pub fn bitfield(&self) -> &PieceBitfield {
        &self.bitfield
    }

    pub fn is_seeding(&self) -> bool {
        self.seed.is_set()
    }

    pub async fn wait_for_seed(&self) {
        self.seed.wait().await
    }

    pub async fn wait_for_seed_or_cancel<F: std::future::Future>(&self, cancel: F) -> SeedWait {
        self.seed.wait_or_cancel(cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TorrentError;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_last_piece_fires_once() {
        let progress = PieceProgress::new(3);
        assert!(!progress.mark_piece_complete(0).await.unwrap());
        assert!(!progress.mark_piece_complete(1).await.unwrap());
        assert!(progress.mark_piece_complete(2).await.unwrap());
        assert!(progress.is_seeding());

        assert!(!progress.mark_piece_complete(2).await.unwrap());
        assert!(!progress.mark_piece_complete(0).await.unwrap());
    }

    #[tokio::test]
    async fn test_out_of_range_does_not_fire() {
        let progress = PieceProgress::new(1);
        assert!(matches!(
            progress.mark_piece_complete(1).await,
            Err(TorrentError::IndexOutOfRange { .. })
        ));
        assert!(!progress.is_seeding());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_workers_fire_once() {
        let progress = Arc::new(PieceProgress::new(32));
        let mut workers = Vec::new();
        for worker in 0..8 {
            let progress = progress.clone();
            workers.push(tokio::spawn(async move {
                let mut fired = 0;
                for i in 0..32 {
                    if progress.mark_piece_complete((i + worker * 4) % 32).await.unwrap() {
                        fired += 1;
                    }
                }
                fired
            }));
        }

        let waiter = {
            let progress = progress.clone();
            tokio::spawn(async move { progress.wait_for_seed().await })
        };

        let mut fired = 0;
        for worker in workers {
            fired += worker.await.unwrap();
        }
        assert_eq!(fired, 1);
        waiter.await.unwrap();
        assert!(progress.bitfield().is_complete().await);
    }
}
