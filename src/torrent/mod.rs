//! Torrent file handling module
//!
//! Parses .torrent files into the content descriptor the client consumes.

pub mod parser;
pub mod info;

pub use parser::TorrentParser;
pub use info::{TorrentInfo, TorrentFile};
