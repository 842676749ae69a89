//! Client lifecycle states

use serde::Serialize;
use std::fmt;

/// Lifecycle of a client: `Initializing -> PeersDiscovered -> Leeching -> Seeding`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientState {
    /// Identity, bitfield, and tracker are being set up
    Initializing,
    /// The tracker returned at least one peer
    PeersDiscovered,
    /// Session workers are attached and downloading
    Leeching,
    /// Every piece is held; upload only
    Seeding,
}

impl Default for ClientState {
    fn default() -> Self {
        ClientState::Initializing
    }
}

impl fmt::Display for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientState::Initializing => write!(f, "initializing"),
            ClientState::PeersDiscovered => write!(f, "peers discovered"),
            ClientState::Leeching => write!(f, "leeching"),
            ClientState::Seeding => write!(f, "seeding"),
        }
    }
}
