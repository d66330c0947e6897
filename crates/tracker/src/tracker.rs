use crate::Registry;
use crate::error::{ErrorKind, Rejection, Result};
use crawlmark_config::{CrawlerConfig, ProjectDefinition};
use crawlmark_store::{StoreHandle, WriteOutcome};
use exn::ResultExt;
use serde::Serialize;
use std::sync::Arc;
use time::{OffsetDateTime, UtcOffset};
use tracing::instrument;

/// Upper bound on compare-and-set attempts for a single commit.
pub const MAX_COMMIT_ATTEMPTS: usize = 8;

/// Progress of one registered crawler, as reported by [`Tracker::status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrawlerStatus {
    pub name: String,
    /// The stored watermark, or the baseline if the crawler never committed.
    #[serde(with = "time::serde::rfc3339")]
    pub watermark: OffsetDateTime,
    /// Whether a commit has ever been recorded for this crawler.
    pub committed: bool,
}

/// Entry point for committing and querying crawler progress.
///
/// Holds the [`Registry`] used to authorize crawlers and the store holding
/// their watermarks. Cheap to clone; clones share both.
#[derive(Clone)]
pub struct Tracker {
    registry: Arc<Registry>,
    store: StoreHandle,
}

impl Tracker {
    pub fn new(registry: impl Into<Arc<Registry>>, store: StoreHandle) -> Self {
        Self {
            registry: registry.into(),
            store,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Validate identity, converting a refusal into [`ErrorKind::Rejected`].
    fn resolve(&self, index: &str, crawler: &str, api_key: Option<&str>) -> Result<&CrawlerConfig> {
        match self.registry.validate(index, crawler, api_key) {
            Ok(config) => Ok(config),
            Err(rejection) => {
                tracing::debug!(%rejection, "Crawler identity rejected");
                exn::bail!(ErrorKind::Rejected(rejection))
            },
        }
    }

    /// Advance the watermark of `crawler` on `index` to `timestamp`.
    ///
    /// The timestamp is accepted when it is not earlier than the stored
    /// watermark (equal is fine) and returned, normalized to UTC. Rejections
    /// never write to the store.
    ///
    /// The read and the conditional write form a compare-and-set loop: when
    /// another commit for the same crawler lands in between, the watermark is
    /// re-read and re-checked, so a smaller timestamp can never overwrite a
    /// larger one. After [`MAX_COMMIT_ATTEMPTS`] lost races the commit fails
    /// with the retryable [`ErrorKind::Contention`].
    #[instrument(skip(self, api_key))]
    pub async fn commit(
        &self,
        index: &str,
        crawler: &str,
        api_key: &str,
        timestamp: OffsetDateTime,
    ) -> Result<OffsetDateTime> {
        let config = self.resolve(index, crawler, Some(api_key))?;
        let timestamp = timestamp.to_offset(UtcOffset::UTC);
        for attempt in 1..=MAX_COMMIT_ATTEMPTS {
            let current = self.store.get_metadata(index, &config.name).await.or_raise(|| ErrorKind::Store)?;
            if let Some(previous) = current.last_commit_at
                && timestamp < previous
            {
                tracing::debug!(%previous, "Commit is older than the stored watermark");
                exn::bail!(ErrorKind::Rejected(Rejection::CommitDateInferiorThanPrevious));
            }
            let outcome = self
                .store
                .set_metadata(index, &config.name, current.last_commit_at, timestamp)
                .await
                .or_raise(|| ErrorKind::Store)?;
            match outcome {
                WriteOutcome::Written => {
                    tracing::info!(store = self.store.name(), "Watermark committed");
                    return Ok(timestamp);
                },
                WriteOutcome::Conflict => {
                    tracing::debug!(attempt, "Watermark changed concurrently; re-reading");
                },
            }
        }
        tracing::warn!(attempts = MAX_COMMIT_ATTEMPTS, "Giving up on contended watermark");
        exn::bail!(ErrorKind::Contention(MAX_COMMIT_ATTEMPTS))
    }

    /// The watermark of `crawler` on `index`, or its configured baseline if
    /// it has never committed. No API key is required.
    #[instrument(skip(self))]
    pub async fn last_updated(&self, index: &str, crawler: &str) -> Result<OffsetDateTime> {
        let config = self.resolve(index, crawler, None)?;
        let metadata = self.store.get_metadata(index, &config.name).await.or_raise(|| ErrorKind::Store)?;
        Ok(metadata.last_commit_at.unwrap_or(config.baseline_since))
    }

    /// Progress of every crawler registered on `index`, in registry order.
    #[instrument(skip(self))]
    pub async fn status(&self, index: &str) -> Result<Vec<CrawlerStatus>> {
        let Some(crawlers) = self.registry.get_crawlers(index) else {
            tracing::debug!("Status requested for unknown index");
            exn::bail!(ErrorKind::Rejected(Rejection::UnknownIndex));
        };
        let stored = self.store.list_metadata(index).await.or_raise(|| ErrorKind::Store)?;
        Ok(crawlers
            .iter()
            .map(|config| {
                let last_commit_at = stored
                    .iter()
                    .find(|(name, _)| *name == config.name)
                    .and_then(|(_, metadata)| metadata.last_commit_at);
                CrawlerStatus {
                    name: config.name.clone(),
                    watermark: last_commit_at.unwrap_or(config.baseline_since),
                    committed: last_commit_at.is_some(),
                }
            })
            .collect())
    }

    /// Project definitions of `index`; empty for an unknown index.
    pub fn projects(&self, index: &str) -> &[ProjectDefinition] {
        self.registry.projects(index)
    }
}
