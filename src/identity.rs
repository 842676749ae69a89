//! Client identity
//!
//! Generates the 20-byte peer id announced to trackers and peers.

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

/// A 20-byte peer identifier
pub type PeerId = [u8; 20];

/// Azureus-style client prefix
pub const CLIENT_PREFIX: &[u8; 8] = b"-RT0100-";

/// Generate a fresh peer id from the wall clock and the thread RNG.
pub fn generate_peer_id() -> PeerId {
    let peer_id = generate_peer_id_with(SystemTime::now(), &mut rand::thread_rng());
    info!("Generated new peer ID: {}", hex::encode(peer_id));
    peer_id
}

/// Generate a peer id from an explicit time and entropy source.
///
/// The wall-clock nanoseconds are mixed with one draw from `entropy` to seed
/// a new generator, so two processes started in the same instant still
/// diverge. The same `now` and the same seeded `entropy` always give the
/// same id.
pub fn generate_peer_id_with<R: RngCore + ?Sized>(now: SystemTime, entropy: &mut R) -> PeerId {
    let nanos = now
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default();
    let mut rng = StdRng::seed_from_u64(nanos ^ entropy.next_u64());

    let mut peer_id = [0u8; 20];
    peer_id[..CLIENT_PREFIX.len()].copy_from_slice(CLIENT_PREFIX);
    rng.fill_bytes(&mut peer_id[CLIENT_PREFIX.len()..]);
    peer_id
}
