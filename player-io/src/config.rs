//! Configuration for the PlayerIO server
//!
//! Loads configuration from a TOML file. Every field has a default so an empty
//! file (or no file at all) yields a usable server; command line values are
//! layered on top by the binary.

use crate::devices::mock::SimulationConfig;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Team budget: 100 MB/s evaluated over a sliding window of 1000 ms
pub const DEFAULT_TEAM_QUOTA_BYTES: u64 = 100 * 1024 * 1024;

/// Top-level server configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub quota: QuotaConfig,
    #[serde(default)]
    pub benchmark: BenchmarkConfig,
    /// Robot used by the standalone binary
    #[serde(default)]
    pub simulation: SimulationConfig,
}

/// Listening socket and access control
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
    /// TCP port the player server listens on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Hostnames allowed to complete the handshake (exact match)
    #[serde(default)]
    pub allowed_hosts: Vec<String>,

    /// Largest inbound frame accepted before the connection is dropped
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,

    /// How long a single outbound write may stall on a full socket buffer
    #[serde(default = "default_write_stall_ms")]
    pub write_stall_ms: u64,
}

fn default_port() -> u16 {
    10001
}
fn default_max_frame_bytes() -> usize {
    1024 * 1024
}
fn default_write_stall_ms() -> u64 {
    1000
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            allowed_hosts: Vec::new(),
            max_frame_bytes: default_max_frame_bytes(),
            write_stall_ms: default_write_stall_ms(),
        }
    }
}

/// Team colour of a player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Team {
    #[default]
    Red,
    Blue,
}

impl Team {
    /// Lowercase name used in quota ledger file names
    pub fn as_str(&self) -> &'static str {
        match self {
            Team::Red => "red",
            Team::Blue => "blue",
        }
    }
}

/// Which player this process serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct PlayerConfig {
    #[serde(default)]
    pub team: Team,
    #[serde(default = "default_player_id")]
    pub id: u8,
}

fn default_player_id() -> u8 {
    1
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            team: Team::default(),
            id: default_player_id(),
        }
    }
}

impl PlayerConfig {
    /// Parse a robot name such as `"red player 2"`.
    ///
    /// A leading `r` selects the red team, anything else blue. The player id
    /// is the last whitespace-separated token.
    pub fn from_robot_name(name: &str) -> Result<Self> {
        let team = if name.starts_with('r') {
            Team::Red
        } else {
            Team::Blue
        };
        let id = name
            .split_whitespace()
            .last()
            .and_then(|token| token.parse::<u8>().ok())
            .ok_or_else(|| Error::Config(format!("Cannot parse player id from \"{}\"", name)))?;
        Ok(Self { team, id })
    }
}

impl fmt::Display for PlayerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let team = match self.team {
            Team::Red => "RED",
            Team::Blue => "BLUE",
        };
        write!(f, "{} {}", team, self.id)
    }
}

/// Simulation step timing
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimingConfig {
    /// Duration of one simulation step in milliseconds
    #[serde(default = "default_basic_time_step_ms")]
    pub basic_time_step_ms: u32,
}

fn default_basic_time_step_ms() -> u32 {
    8
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            basic_time_step_ms: default_basic_time_step_ms(),
        }
    }
}

/// Team bandwidth accounting
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QuotaConfig {
    /// Directory holding the per-player ledger files
    #[serde(default = "default_quota_directory")]
    pub directory: PathBuf,

    /// Bytes a team may send within one 1000 ms window
    #[serde(default = "default_team_quota_bytes")]
    pub team_quota_bytes: u64,

    /// Player ids `1..=team_size` are considered siblings
    #[serde(default = "default_team_size")]
    pub team_size: u8,
}

fn default_quota_directory() -> PathBuf {
    PathBuf::from(".")
}
fn default_team_quota_bytes() -> u64 {
    DEFAULT_TEAM_QUOTA_BYTES
}
fn default_team_size() -> u8 {
    4
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            directory: default_quota_directory(),
            team_quota_bytes: default_team_quota_bytes(),
            team_size: default_team_size(),
        }
    }
}

/// Step timing diagnostics
///
/// | Level | Output |
/// |-------|--------|
/// | 0 | silent |
/// | 1 | step and phase costs when the step exceeds `budget_ms` |
/// | 2 | step cost every cycle |
/// | 3 | phase costs every cycle |
///
/// Anything above 1 slows the simulation noticeably.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BenchmarkConfig {
    #[serde(default = "default_benchmark_level")]
    pub level: u8,
    #[serde(default = "default_budget_ms")]
    pub budget_ms: f64,
}

fn default_benchmark_level() -> u8 {
    1
}
fn default_budget_ms() -> f64 {
    1.0
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            level: default_benchmark_level(),
            budget_ms: default_budget_ms(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: ServerConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the scheduler cannot work with
    pub fn validate(&self) -> Result<()> {
        let step = self.timing.basic_time_step_ms;
        if step == 0 || step > 1000 {
            return Err(Error::Config(format!(
                "basic_time_step_ms must be within 1..=1000, got {}",
                step
            )));
        }
        if self.quota.team_size == 0 {
            return Err(Error::Config("team_size must be at least 1".to_string()));
        }
        Ok(())
    }
}
