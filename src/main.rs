//! rust-torrent-client - Main entry point
//!
//! Loads a torrent, announces to its trackers, connects to the swarm, and
//! optionally waits for the seed phase.

use anyhow::{Context, Result};
use rust_torrent_client::{
    CliArgs, Client, ClientStatus, Config, PeerSession, SeedWait, TcpPeerSession, TorrentInfo,
};
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Re-announce period when the tracker does not send an interval
const DEFAULT_REANNOUNCE: Duration = Duration::from_secs(30 * 60);

/// Set up panic handler for unexpected errors
fn setup_panic_handler() {
    std::panic::set_hook(Box::new(|panic_info| {
        let backtrace = std::backtrace::Backtrace::capture();

        if let Some(location) = panic_info.location() {
            error!(
                "PANIC occurred at {}:{}:{}",
                location.file(),
                location.line(),
                location.column()
            );
        }
        let payload = panic_info.payload();
        if let Some(s) = payload.downcast_ref::<&str>() {
            error!("Panic message: {}", s);
        } else if let Some(s) = payload.downcast_ref::<String>() {
            error!("Panic message: {}", s);
        } else {
            error!("Panic message: unknown");
        }
        error!("Backtrace:\n{:?}", backtrace);
    }));
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_panic_handler();

    let args = CliArgs::parse_args();
    init_logging(&args);
    info!("rust-torrent-client starting");
    debug!("CLI arguments: {:?}", args);

    let config = Config::from_args(&args);
    config.validate().context("Invalid configuration")?;

    let mut client = Client::from_path(&config.torrent_file, &config.client_options())
        .await
        .with_context(|| format!("Failed to start client for {}", config.torrent_file.display()))?;

    if !config.is_quiet() {
        display_torrent_info(client.torrent(), &config);
        client.tracker().print_info();
        println!();
    }

    client.attach();
    let connected = connect_peers(&client, config.max_connections).await;
    info!("Connected to {} peers", connected);

    print_status(&client.status().await, &config)?;

    if config.is_seeding_enabled() {
        run_until_seeding(&mut client, &config).await?;
    }

    info!("rust-torrent-client finished");
    Ok(())
}

/// Initialize logging based on verbosity settings
fn init_logging(args: &CliArgs) {
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(args.log_level())
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if args.is_verbose() {
        subscriber.pretty().init();
    } else {
        subscriber.compact().init();
    }

    debug!("Logging initialized successfully");
}

/// Display torrent information
fn display_torrent_info(torrent: &TorrentInfo, config: &Config) {
    println!("Torrent Information:");
    println!("  Name: {}", torrent.name);
    println!("  Size: {} ({})", torrent.total_size(), format_bytes(torrent.total_size()));
    println!("  Pieces: {}", torrent.piece_count());
    println!("  Piece length: {}", format_bytes(torrent.piece_length));
    println!("  Info hash: {}", torrent.info_hash_hex());
    println!();
    println!("Configuration:");
    println!("  Listen port: {}", config.port);
    println!("  Max connections: {}", config.max_connections);
    println!("  Tracker timeout: {}s", config.tracker_timeout.as_secs());
    println!("  Seeding: {}", if config.is_seeding_enabled() { "enabled" } else { "disabled" });
    println!();
}

fn print_status(status: &ClientStatus, config: &Config) -> Result<()> {
    if config.json {
        println!("{}", serde_json::to_string_pretty(status).context("Failed to encode status")?);
    } else if !config.is_quiet() {
        println!(
            "[{}] peers: {} active / {} inactive | pieces: {}/{} | left: {} | swarm: {} seeders, {} leechers",
            status.state,
            status.peers.active,
            status.peers.inactive,
            status.pieces_have,
            status.pieces_total,
            format_bytes(status.bytes_left),
            status.tracker.seeders,
            status.tracker.leechers
        );
    }
    Ok(())
}

/// Try every inactive peer, up to the free connection slots, and promote
/// the ones that complete a handshake. Sessions the remote side closed are
/// dropped first so they stop holding slots.
async fn connect_peers(client: &Client, max_connections: usize) -> usize {
    for addr in client.peers().prune_closed().await {
        debug!("Released slot held by {}", addr);
    }

    let slots = max_connections.saturating_sub(client.peers().snapshot().await.active);
    let candidates: Vec<_> = client.peers().inactive_addrs().await.into_iter().take(slots).collect();
    if candidates.is_empty() {
        debug!("No connection slots or candidates available");
        return 0;
    }

    let info_hash = client.torrent().info_hash;
    let our_id = *client.id();
    let mut attempts = JoinSet::new();
    for addr in candidates {
        attempts.spawn(async move {
            let mut session = TcpPeerSession::new(addr, info_hash, our_id);
            let outcome = session.connect().await;
            (session, outcome)
        });
    }

    let mut connected = 0;
    while let Some(joined) = attempts.join_next().await {
        match joined {
            Ok((session, Ok(peer_id))) => {
                let addr = session.addr();
                match client.peers().promote_to_active(addr, peer_id, Box::new(session)).await {
                    Ok(()) => connected += 1,
                    Err(e) => warn!("Dropping connection to {}: {}", addr, e),
                }
            }
            Ok((session, Err(e))) => debug!("Peer {} unavailable: {}", session.addr(), e),
            Err(e) => error!("Connection task failed: {}", e),
        }
    }
    connected
}

enum Step {
    Seeding,
    Reannounce,
    Shutdown,
}

/// Wait for the seed signal, re-announcing on the tracker's interval
async fn run_until_seeding(client: &mut Client, config: &Config) -> Result<()> {
    let progress = client.progress().clone();
    info!("Waiting for all pieces (Ctrl-C to stop)");

    loop {
        let interval = client.announce_interval().unwrap_or(DEFAULT_REANNOUNCE);
        let step = tokio::select! {
            outcome = progress.wait_for_seed_or_cancel(tokio::time::sleep(interval)) => match outcome {
                SeedWait::Ready => Step::Seeding,
                SeedWait::Cancelled => Step::Reannounce,
            },
            _ = tokio::signal::ctrl_c() => Step::Shutdown,
        };

        match step {
            Step::Seeding => {
                info!("Client is now {}", client.state());
                print_status(&client.status().await, config)?;
                return Ok(());
            }
            Step::Reannounce => {
                match client.refresh_peers().await {
                    Ok(added) => debug!("{} new peers from re-announce", added),
                    Err(e) => warn!("Re-announce failed: {}", e),
                }
                connect_peers(client, config.max_connections).await;
                print_status(&client.status().await, config)?;
            }
            Step::Shutdown => {
                info!("Shutdown requested");
                return Ok(());
            }
        }
    }
}

/// Format bytes to human readable string
fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_index])
}
