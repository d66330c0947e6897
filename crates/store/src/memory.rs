//! In-memory watermark store for testing.

use crate::error::Result;
use crate::{CrawlerMetadata, WatermarkStore, WriteOutcome};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use time::OffsetDateTime;
use tokio::sync::RwLock;

/// In-memory watermark store for testing.
///
/// Records live in a `HashMap` behind a [`RwLock`]; the write lock is held
/// across the compare and the write, which makes
/// [`set_metadata`](WatermarkStore::set_metadata) atomic. Successful writes
/// are counted so tests can assert that rejected commits never touch the
/// store.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<(String, String), CrawlerMetadata>>,
    writes: AtomicUsize,
}

impl MemoryStore {
    /// Create a store pre-populated with watermarks.
    pub fn with_records<'a>(records: impl IntoIterator<Item = (&'a str, &'a str, OffsetDateTime)>) -> Self {
        let records = records
            .into_iter()
            .map(|(index, crawler, at)| {
                ((index.to_string(), crawler.to_string()), CrawlerMetadata { last_commit_at: Some(at) })
            })
            .collect();
        Self {
            records: RwLock::new(records),
            writes: AtomicUsize::new(0),
        }
    }

    /// Number of successful writes since creation (pre-populated records
    /// excluded).
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WatermarkStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get_metadata(&self, index: &str, crawler: &str) -> Result<CrawlerMetadata> {
        let key = (index.to_string(), crawler.to_string());
        Ok(self.records.read().await.get(&key).copied().unwrap_or_default())
    }

    async fn set_metadata(
        &self,
        index: &str,
        crawler: &str,
        expected: Option<OffsetDateTime>,
        timestamp: OffsetDateTime,
    ) -> Result<WriteOutcome> {
        let mut guard = self.records.write().await;
        let key = (index.to_string(), crawler.to_string());
        let current = guard.get(&key).and_then(|metadata| metadata.last_commit_at);
        if current != expected {
            return Ok(WriteOutcome::Conflict);
        }
        guard.insert(key, CrawlerMetadata { last_commit_at: Some(timestamp) });
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(WriteOutcome::Written)
    }

    async fn list_metadata(&self, index: &str) -> Result<Vec<(String, CrawlerMetadata)>> {
        let mut records: Vec<_> = self
            .records
            .read()
            .await
            .iter()
            .filter(|((i, _), metadata)| i == index && metadata.last_commit_at.is_some())
            .map(|((_, crawler), metadata)| (crawler.clone(), *metadata))
            .collect();
        records.sort_by(|(a, _), (b, _)| a.cmp(b));
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[tokio::test]
    async fn test_compare_and_set() {
        let store = MemoryStore::default();
        let t1 = datetime!(2021-01-01 00:00 UTC);
        let t2 = datetime!(2021-01-02 00:00 UTC);
        assert_eq!(store.set_metadata("proj1", "c1", Some(t1), t2).await.unwrap(), WriteOutcome::Conflict);
        assert_eq!(store.writes(), 0);
        assert_eq!(store.set_metadata("proj1", "c1", None, t1).await.unwrap(), WriteOutcome::Written);
        assert_eq!(store.set_metadata("proj1", "c1", None, t2).await.unwrap(), WriteOutcome::Conflict);
        assert_eq!(store.set_metadata("proj1", "c1", Some(t1), t2).await.unwrap(), WriteOutcome::Written);
        assert_eq!(store.get_metadata("proj1", "c1").await.unwrap().last_commit_at, Some(t2));
        assert_eq!(store.writes(), 2);
    }

    #[tokio::test]
    async fn test_conflict_on_missing_record_creates_nothing() {
        let store = MemoryStore::default();
        let t1 = datetime!(2021-01-01 00:00 UTC);
        assert_eq!(store.set_metadata("proj1", "c1", Some(t1), t1).await.unwrap(), WriteOutcome::Conflict);
        assert!(store.records.read().await.is_empty());
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn test_list_skips_other_indexes() {
        let t1 = datetime!(2021-01-01 00:00 UTC);
        let store = MemoryStore::with_records([("proj1", "b", t1), ("proj1", "a", t1), ("proj2", "c", t1)]);
        // A conflicting write on an unknown key must not show up as a record.
        store.set_metadata("proj1", "z", Some(t1), t1).await.unwrap();
        let names: Vec<_> = store.list_metadata("proj1").await.unwrap().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["a", "b"]);
    }
}
