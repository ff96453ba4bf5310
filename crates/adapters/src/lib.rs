//! feed-relay adapters crate
//!
//! This crate contains infrastructure adapters implementing the domain ports:
//! - `ledger`: SQLite ledger
//! - `page`: JSON feed page source
//! - `publish`: HTTP submission publisher
//! - `outbox`: JSONL outbox publisher for manual approval
//! - `media`: HTTP media fetcher writing to a scratch directory
//! - `notify`: Chat webhook notifier

mod ledger_sqlite;
pub mod media;
pub mod notify;
pub mod outbox;

pub mod page;
pub mod publish;

/// Re-exports for ledger adapters
pub mod ledger {
    pub use crate::ledger_sqlite::SqliteLedger;
}
