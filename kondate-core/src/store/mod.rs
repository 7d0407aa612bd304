//! Persistent crawl state: the detail cache, the processed ledger and the
//! local JSON archive.
//!
//! The crawler only talks to [`DetailStore`] and [`ProcessedLedger`], so the
//! flat-file layout can be replaced without touching adapters or the crawler.

mod archive;
mod detail_cache;
mod ledger;

use std::collections::HashSet;

use crate::error::StoreError;

pub use archive::LocalArchive;
pub use detail_cache::FsDetailCache;
pub use ledger::FileLedger;

/// Write-once storage of raw detail pages, keyed by recipe id.
pub trait DetailStore {
    /// True if the id has a cached page, quarantined or not.
    fn contains(&self, id: &str) -> bool;

    /// Store a page. Existing entries are never overwritten; returns whether
    /// anything was written.
    fn put(&self, id: &str, data: &[u8]) -> Result<bool, StoreError>;

    fn read(&self, name: &str) -> Result<Vec<u8>, StoreError>;

    /// Names of every stored entry, including quarantined ones.
    fn file_names(&self) -> Result<Vec<String>, StoreError>;

    /// Move an entry out of the way of future parse passes. Returns the new name.
    fn quarantine(&self, name: &str) -> Result<String, StoreError>;
}

/// Append-only record of ids already handed to the publisher.
pub trait ProcessedLedger {
    fn load(&self) -> Result<HashSet<String>, StoreError>;

    fn append(&self, id: &str) -> Result<(), StoreError>;
}

/// Names written by the stores themselves, or moved aside by quarantine.
pub fn is_reserved_name(name: &str) -> bool {
    name.starts_with('_') || name.starts_with('.')
}
