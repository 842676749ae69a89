//! Piece possession tracking
//!
//! Which pieces of the content are verified and held locally.

pub mod bitfield;

pub use bitfield::PieceBitfield;
