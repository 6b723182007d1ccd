//! PlayerIO - standalone player server
//!
//! Runs one [`PlayerServer`] against the built-in simulated robot, stepping
//! it in real time at the configured basic time step.
//!
//! Usage:
//!   player-io 10001 localhost --robot-name "red player 2"
//!   player-io --config player.toml
//!
//! Step timing diagnostics follow `[benchmark] level`; set `RUST_LOG=debug`
//! to see every batch size and rejected command.

use clap::Parser;
use player_io::config::PlayerConfig;
use player_io::devices::mock::SimulatedRobot;
use player_io::quota::FileQuotaStore;
use player_io::{Error, PlayerServer, Result, ServerConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Per-player TCP bridge for a simulated robot
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TCP port to listen on (overrides the configuration file)
    port: Option<u16>,

    /// Host names allowed to connect (overrides the configuration file)
    hosts: Vec<String>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Robot name such as "red player 2", selects team and player id
    #[arg(long)]
    robot_name: Option<String>,

    /// Directory shared by the team's quota ledgers
    #[arg(long)]
    quota_dir: Option<PathBuf>,
}

fn load_config(args: &Args) -> Result<ServerConfig> {
    let mut config = match &args.config {
        Some(path) => {
            log::info!("Using config: {}", path.display());
            ServerConfig::from_file(path)?
        }
        None => ServerConfig::default(),
    };

    if let Some(port) = args.port {
        config.network.port = port;
    }
    if !args.hosts.is_empty() {
        config.network.allowed_hosts = args.hosts.clone();
    }
    if let Some(name) = &args.robot_name {
        config.player = PlayerConfig::from_robot_name(name)?;
    }
    if let Some(dir) = &args.quota_dir {
        config.quota.directory = dir.clone();
    }

    config.validate()?;
    Ok(config)
}

fn unix_time_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = load_config(&args)?;
    let player = config.player;
    let step_ms = config.timing.basic_time_step_ms;

    log::info!(
        "{}: PlayerIO v{} starting",
        player,
        env!("CARGO_PKG_VERSION")
    );

    let store = FileQuotaStore::new(&config.quota.directory);
    let mut server = PlayerServer::new(&config, Box::new(store))?;
    let mut robot = SimulatedRobot::humanoid(config.simulation.clone());

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.store(false, Ordering::Relaxed);
    })
    .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

    let step = Duration::from_millis(u64::from(step_ms));
    while running.load(Ordering::Relaxed) {
        let started = Instant::now();
        server.step(&mut robot, unix_time_ms());
        robot.advance(step_ms);
        if let Some(rest) = step.checked_sub(started.elapsed()) {
            thread::sleep(rest);
        }
    }

    log::info!("{}: shutting down", player);
    Ok(())
}
