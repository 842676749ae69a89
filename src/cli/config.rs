//! CLI configuration module
//!
//! Turns parsed arguments into validated settings for the client.

use crate::cli::args::CliArgs;
use crate::client::ClientOptions;
use std::path::PathBuf;
use std::time::Duration;
use anyhow::Result;

/// Configuration for the torrent client
#[derive(Debug, Clone)]
pub struct Config {
    /// Torrent file to load
    pub torrent_file: PathBuf,
    /// Port announced to the tracker
    pub port: u16,
    /// Maximum number of peer connections
    pub max_connections: usize,
    /// Tracker request timeout
    pub tracker_timeout: Duration,
    /// Wait for the seed phase after startup
    pub seed: bool,
    /// Print status as JSON
    pub json: bool,
    /// Verbose output
    pub verbose: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Config {
    /// Create configuration from CLI arguments
    pub fn from_args(args: &CliArgs) -> Self {
        Self {
            torrent_file: args.torrent_file.clone(),
            port: args.port,
            max_connections: args.max_connections,
            tracker_timeout: Duration::from_secs(args.tracker_timeout),
            seed: args.seed,
            json: args.json,
            verbose: args.verbose,
            quiet: args.quiet,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(anyhow::anyhow!("Port cannot be 0"));
        }

        if self.max_connections == 0 {
            return Err(anyhow::anyhow!("max_connections must be at least 1"));
        }

        if self.tracker_timeout < Duration::from_secs(1) {
            return Err(anyhow::anyhow!("tracker_timeout must be at least 1 second"));
        }

        if self.verbose && self.quiet {
            return Err(anyhow::anyhow!("verbose and quiet cannot both be set"));
        }

        if self.torrent_file.as_os_str().is_empty() {
            return Err(anyhow::anyhow!("torrent_file cannot be empty"));
        }

        Ok(())
    }

    /// Settings handed to the client controller
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            port: self.port,
            tracker_timeout: self.tracker_timeout,
        }
    }

    /// Check if the seed phase should run
    pub fn is_seeding_enabled(&self) -> bool {
        self.seed
    }

    /// Check if quiet mode is enabled
    pub fn is_quiet(&self) -> bool {
        self.quiet
    }
}
