//! Client module
//!
//! The controller that ties peer discovery, the peer pool, and piece
//! progress into one lifecycle.

pub mod controller;
pub mod progress;
pub mod signal;
pub mod state;

pub use controller::{AnnounceSummary, Client, ClientOptions, ClientStatus};
pub use progress::PieceProgress;
pub use signal::{SeedSignal, SeedWait};
pub use state::ClientState;
