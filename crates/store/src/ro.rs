//! Read-only watermark store.
//!
//! Wraps another store and prevents writes from executing, while still
//! reporting success.

use crate::error::Result;
use crate::{CrawlerMetadata, StoreHandle, WatermarkStore, WriteOutcome};
use async_trait::async_trait;
use time::OffsetDateTime;

/// Read-only watermark store.
///
/// Reads go to the inner store; writes are dropped and logged as an
/// [`info event`](tracing::Event), and reported as
/// [`Written`](WriteOutcome::Written) so that callers follow their normal
/// success path during a dry run.
#[derive(Clone)]
pub struct ReadOnlyStore {
    inner: StoreHandle,
}
impl ReadOnlyStore {
    pub fn new(inner: StoreHandle) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl WatermarkStore for ReadOnlyStore {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn get_metadata(&self, index: &str, crawler: &str) -> Result<CrawlerMetadata> {
        self.inner.get_metadata(index, crawler).await
    }

    async fn set_metadata(
        &self,
        index: &str,
        crawler: &str,
        _expected: Option<OffsetDateTime>,
        timestamp: OffsetDateTime,
    ) -> Result<WriteOutcome> {
        tracing::info!(index, crawler, %timestamp, "Skipping watermark write during read-only mode");
        Ok(WriteOutcome::Written)
    }

    async fn list_metadata(&self, index: &str) -> Result<Vec<(String, CrawlerMetadata)>> {
        self.inner.list_metadata(index).await
    }
}
