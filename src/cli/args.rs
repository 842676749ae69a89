//! CLI arguments module
//!
//! Defines command-line argument parsing using clap.

use clap::Parser;
use std::path::PathBuf;

/// CLI arguments for the torrent client
#[derive(Debug, Parser)]
#[command(name = "rust-torrent-client")]
#[command(about = "Announce a torrent, connect to its swarm, and wait to seed", long_about = None)]
pub struct CliArgs {
    /// Path to the .torrent file
    #[arg(value_name = "TORRENT_FILE")]
    pub torrent_file: PathBuf,

    /// Port announced to the tracker
    #[arg(short, long, default_value_t = 6881)]
    pub port: u16,

    /// Maximum number of peers to connect to
    #[arg(short, long, default_value_t = 50)]
    pub max_connections: usize,

    /// Tracker request timeout in seconds
    #[arg(long, default_value_t = 10)]
    pub tracker_timeout: u64,

    /// Keep running until every piece is present, re-announcing on the tracker's interval
    #[arg(long)]
    pub seed: bool,

    /// Print the client status as JSON
    #[arg(long)]
    pub json: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Quiet mode (no output except errors)
    #[arg(short, long)]
    pub quiet: bool,
}

impl CliArgs {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Get the log level based on verbosity settings
    pub fn log_level(&self) -> tracing::Level {
        if self.verbose {
            tracing::Level::DEBUG
        } else if self.quiet {
            tracing::Level::ERROR
        } else {
            tracing::Level::INFO
        }
    }
}
