//! Team bandwidth quota shared across player processes

pub mod ledger;
pub mod store;

pub use ledger::QuotaLedger;
pub use store::{FileQuotaStore, MemoryQuotaStore, QuotaStore};
