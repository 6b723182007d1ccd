//! Shared storage for per-player quota windows
//!
//! Every player process owns exactly one entry and rewrites it in full each
//! cycle. Readers of sibling entries never lock; a missing, truncated or
//! unparseable entry simply counts as zero bytes.

use crate::config::PlayerConfig;
use crate::error::Result;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Storage backend for quota windows, keyed by player identity
pub trait QuotaStore: Send {
    /// Replace the stored window of `identity`
    fn write_window(&self, identity: &PlayerConfig, window: &[u64]) -> Result<()>;

    /// Stored window of `identity`, `None` if nothing usable is stored
    fn read_window(&self, identity: &PlayerConfig) -> Option<Vec<u64>>;
}

// ============================================================================
// File-backed store
// ============================================================================

/// One text file per player, one slot value per line
///
/// Files are named `quota-<team>-<id>.txt` so every process of a match can
/// point at the same directory.
#[derive(Debug, Clone)]
pub struct FileQuotaStore {
    directory: PathBuf,
}

impl FileQuotaStore {
    pub fn new<P: AsRef<Path>>(directory: P) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
        }
    }

    /// Path of the ledger file for `identity`
    pub fn path_for(&self, identity: &PlayerConfig) -> PathBuf {
        self.directory
            .join(format!("quota-{}-{}.txt", identity.team.as_str(), identity.id))
    }
}

impl QuotaStore for FileQuotaStore {
    fn write_window(&self, identity: &PlayerConfig, window: &[u64]) -> Result<()> {
        let mut contents = String::with_capacity(window.len() * 8);
        for slot in window {
            contents.push_str(&slot.to_string());
            contents.push('\n');
        }
        fs::write(self.path_for(identity), contents)?;
        Ok(())
    }

    fn read_window(&self, identity: &PlayerConfig) -> Option<Vec<u64>> {
        let contents = fs::read_to_string(self.path_for(identity)).ok()?;
        Some(
            contents
                .lines()
                .map(|line| line.trim().parse::<u64>().unwrap_or(0))
                .collect(),
        )
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// Process-local store; clones share the same map
#[derive(Debug, Clone, Default)]
pub struct MemoryQuotaStore {
    windows: Arc<Mutex<HashMap<PlayerConfig, Vec<u64>>>>,
}

impl MemoryQuotaStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl QuotaStore for MemoryQuotaStore {
    fn write_window(&self, identity: &PlayerConfig, window: &[u64]) -> Result<()> {
        if let Ok(mut windows) = self.windows.lock() {
            windows.insert(*identity, window.to_vec());
        }
        Ok(())
    }

    fn read_window(&self, identity: &PlayerConfig) -> Option<Vec<u64>> {
        self.windows.lock().ok()?.get(identity).cloned()
    }
}
