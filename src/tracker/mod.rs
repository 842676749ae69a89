//! Tracker module
//!
//! HTTP announce requests, compact responses, and backup failover.

pub mod client;
pub mod response;

#[cfg(test)]
pub(crate) mod mock;

pub use client::{AnnounceParams, TrackerClient, DEFAULT_TRACKER_TIMEOUT};
pub use response::TrackerResponse;
