//! Watermark persistence for crawler progress.
//!
//! A watermark is the most recent progress timestamp a crawler has committed
//! for an index. This crate stores one [`CrawlerMetadata`] record per
//! (index, crawler) pair behind the [`WatermarkStore`] trait.
//!
//! # Concurrency
//! Writes are compare-and-set: [`WatermarkStore::set_metadata`] only applies
//! when the stored watermark still equals the value the caller read, and
//! reports [`WriteOutcome::Conflict`] otherwise. Callers re-read and re-check
//! on conflict. Different (index, crawler) pairs never interact.
//!
//! # Implementations
//! - [`Repository`]: SQLite, via a [`Database`] connection pool.
//! - [`ReadOnlyStore`]: wraps another store and drops writes (dry runs).
//! - `MemoryStore`: in-memory, behind the `mock` feature, for tests.

mod db;
pub mod error;
#[cfg(any(test, feature = "mock"))]
mod memory;
mod models;
mod repo;
mod ro;

pub use crate::db::Database;
#[cfg(any(test, feature = "mock"))]
pub use crate::memory::MemoryStore;
pub use crate::repo::Repository;
pub use crate::ro::ReadOnlyStore;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use time::OffsetDateTime;

pub type StoreHandle = Arc<dyn WatermarkStore + Send + Sync>;

/// Persisted progress of one crawler on one index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlerMetadata {
    /// Absent until the first accepted commit.
    pub last_commit_at: Option<OffsetDateTime>,
}

/// Result of a compare-and-set write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The new watermark was stored.
    Written,
    /// The stored watermark no longer matched the expected value; nothing was
    /// written.
    Conflict,
}

/// Storage for crawler watermarks, keyed by (index, crawler).
#[async_trait]
pub trait WatermarkStore: Send + Sync {
    /// Name of the store, used for logging only.
    fn name(&self) -> &str;

    /// Read the metadata for a crawler. A crawler that never committed yields
    /// [`CrawlerMetadata::default()`].
    async fn get_metadata(&self, index: &str, crawler: &str) -> Result<CrawlerMetadata>;

    /// Store `timestamp` as the crawler's watermark if, and only if, the
    /// stored value still equals `expected` (`None` meaning no commit has been
    /// recorded yet).
    ///
    /// This does not check ordering; that is the caller's concern. It only
    /// guarantees that a write is never based on a stale read.
    async fn set_metadata(
        &self,
        index: &str,
        crawler: &str,
        expected: Option<OffsetDateTime>,
        timestamp: OffsetDateTime,
    ) -> Result<WriteOutcome>;

    /// All stored records of an index, ordered by crawler name.
    async fn list_metadata(&self, index: &str) -> Result<Vec<(String, CrawlerMetadata)>>;
}
