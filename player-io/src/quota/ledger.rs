//! Team bandwidth ledger
//!
//! Each player keeps a circular window of bytes sent, one slot per simulation
//! step over one second. After every send the window is published to the
//! [`QuotaStore`] and the windows of all team mates are summed to get the
//! team's usage over the last second.

use super::store::QuotaStore;
use crate::config::PlayerConfig;
use crate::error::Result;

/// Length of the accounting window
const WINDOW_MS: u32 = 1000;

const MEGABYTE: u64 = 1024 * 1024;

/// Sliding one-second byte count shared by a team
pub struct QuotaLedger {
    player: PlayerConfig,
    step_ms: u32,
    team_quota_bytes: u64,
    team_size: u8,
    window: Vec<u64>,
    store: Box<dyn QuotaStore>,
}

impl QuotaLedger {
    /// Open the ledger of `player` and publish an empty window.
    ///
    /// `step_ms` must be within `1..=1000`.
    pub fn new(
        player: PlayerConfig,
        step_ms: u32,
        team_quota_bytes: u64,
        team_size: u8,
        store: Box<dyn QuotaStore>,
    ) -> Self {
        let window_size = (WINDOW_MS / step_ms.max(1)).max(1) as usize;
        let ledger = Self {
            player,
            step_ms: step_ms.max(1),
            team_quota_bytes,
            team_size,
            window: vec![0; window_size],
            store,
        };
        if let Err(e) = ledger.store.write_window(&player, &ledger.window) {
            log::warn!("{}: cannot initialise quota ledger: {}", player, e);
        }
        ledger
    }

    /// Number of slots in the window
    pub fn window_size(&self) -> usize {
        self.window.len()
    }

    /// Slot of the cycle starting at `time_ms`
    pub fn slot_index(&self, time_ms: u32) -> usize {
        (time_ms / self.step_ms) as usize % self.window.len()
    }

    /// Record `size` bytes in `slot`, publish the window and return the team
    /// total over the last second.
    ///
    /// The slot is recorded locally even when publishing fails; the error is
    /// returned so the caller can report it, and [`Self::team_total`] still
    /// gives a usable figure.
    pub fn record_and_check(&mut self, size: u64, slot: usize) -> Result<u64> {
        let slot = slot % self.window.len();
        self.window[slot] = size;
        self.store.write_window(&self.player, &self.window)?;
        Ok(self.team_total())
    }

    /// Own window plus the published windows of every team mate
    pub fn team_total(&self) -> u64 {
        let own: u64 = self.window.iter().sum();
        let siblings: u64 = (1..=self.team_size)
            .filter(|&id| id != self.player.id)
            .filter_map(|id| {
                self.store.read_window(&PlayerConfig {
                    team: self.player.team,
                    id,
                })
            })
            .map(|window| window.iter().sum::<u64>())
            .sum();
        own.saturating_add(siblings)
    }

    /// Whether `total` is above the team budget
    pub fn exceeds(&self, total: u64) -> bool {
        total > self.team_quota_bytes
    }

    /// Diagnostic sent in place of a batch that would exceed the budget
    pub fn overrun_message(&self) -> String {
        format!("{} MB/s quota exceeded.", self.team_quota_bytes / MEGABYTE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_TEAM_QUOTA_BYTES, Team};
    use crate::quota::store::{FileQuotaStore, MemoryQuotaStore};
    use tempfile::TempDir;

    fn player(team: Team, id: u8) -> PlayerConfig {
        PlayerConfig { team, id }
    }

    fn ledger(id: u8, step_ms: u32, store: &MemoryQuotaStore) -> QuotaLedger {
        QuotaLedger::new(
            player(Team::Red, id),
            step_ms,
            DEFAULT_TEAM_QUOTA_BYTES,
            4,
            Box::new(store.clone()),
        )
    }

    #[test]
    fn test_window_geometry() {
        let store = MemoryQuotaStore::new();
        let ledger = ledger(1, 8, &store);
        assert_eq!(ledger.window_size(), 125);
        assert_eq!(ledger.slot_index(0), 0);
        assert_eq!(ledger.slot_index(16), 2);
        assert_eq!(ledger.slot_index(1000), 0);
        assert_eq!(ledger.slot_index(1008), 1);

        let coarse = self::ledger(2, 32, &store);
        assert_eq!(coarse.window_size(), 31);
        assert_eq!(coarse.slot_index(31 * 32), 0);
    }

    #[test]
    fn test_slot_overwritten_after_one_window() {
        let store = MemoryQuotaStore::new();
        let mut ledger = ledger(1, 500, &store);
        assert_eq!(ledger.window_size(), 2);

        assert_eq!(ledger.record_and_check(100, 0).unwrap(), 100);
        assert_eq!(ledger.record_and_check(50, 1).unwrap(), 150);
        assert_eq!(ledger.record_and_check(10, ledger.slot_index(1000)).unwrap(), 60);
    }

    #[test]
    fn test_siblings_summed_other_team_ignored() {
        let store = MemoryQuotaStore::new();
        let mut red1 = ledger(1, 8, &store);
        let mut red3 = ledger(3, 8, &store);
        let mut blue1 = QuotaLedger::new(
            player(Team::Blue, 1),
            8,
            DEFAULT_TEAM_QUOTA_BYTES,
            4,
            Box::new(store.clone()),
        );

        red3.record_and_check(1000, 5).unwrap();
        blue1.record_and_check(70_000, 0).unwrap();
        assert_eq!(red1.record_and_check(24, 0).unwrap(), 1024);
        assert_eq!(blue1.team_total(), 70_000);
    }

    #[test]
    fn test_quota_exceeded_by_one_byte() {
        let store = MemoryQuotaStore::new();
        let mut red1 = ledger(1, 8, &store);
        let mut red2 = ledger(2, 8, &store);

        red2.record_and_check(DEFAULT_TEAM_QUOTA_BYTES, 3).unwrap();
        let at_limit = red1.record_and_check(0, 0).unwrap();
        assert!(!red1.exceeds(at_limit));

        let over = red1.record_and_check(1, 0).unwrap();
        assert_eq!(over, DEFAULT_TEAM_QUOTA_BYTES + 1);
        assert!(red1.exceeds(over));
        assert_eq!(red1.overrun_message(), "100 MB/s quota exceeded.");
    }

    #[test]
    fn test_file_backed_siblings() {
        let dir = TempDir::new().unwrap();
        let mut blue1 = QuotaLedger::new(
            player(Team::Blue, 1),
            8,
            DEFAULT_TEAM_QUOTA_BYTES,
            4,
            Box::new(FileQuotaStore::new(dir.path())),
        );
        let mut blue4 = QuotaLedger::new(
            player(Team::Blue, 4),
            8,
            DEFAULT_TEAM_QUOTA_BYTES,
            4,
            Box::new(FileQuotaStore::new(dir.path())),
        );

        blue4.record_and_check(300, 10).unwrap();
        assert_eq!(blue1.record_and_check(200, 10).unwrap(), 500);

        let contents = std::fs::read_to_string(dir.path().join("quota-blue-1.txt")).unwrap();
        assert_eq!(contents.lines().count(), 125);
        assert_eq!(contents.lines().nth(10), Some("200"));
    }
}
