//! Per-index crawler registry and crawler identity validation.

use crate::error::{ErrorKind, Rejection, Result};
use crawlmark_config::{Config, CrawlerConfig, IndexConfig, ProjectDefinition};
use std::collections::{BTreeMap, HashSet};

/// Static mapping from index to its crawlers and projects.
///
/// Built once at startup and never mutated. Crawler names are unique within
/// an index; building a registry with duplicates fails with
/// [`ErrorKind::DuplicateCrawler`] instead of letting one entry silently
/// shadow another.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    indexes: BTreeMap<String, IndexConfig>,
}

impl Registry {
    /// Build a registry from per-index configuration.
    pub fn new(indexes: impl IntoIterator<Item = (String, IndexConfig)>) -> Result<Self> {
        let indexes: BTreeMap<String, IndexConfig> = indexes.into_iter().collect();
        for (index, config) in &indexes {
            let mut seen = HashSet::new();
            if let Some(duplicate) = config.crawlers.iter().find(|c| !seen.insert(c.name.as_str())) {
                exn::bail!(ErrorKind::DuplicateCrawler(index.clone(), duplicate.name.clone()));
            }
        }
        Ok(Self { indexes })
    }

    /// Crawlers registered for `index`, in configuration order.
    ///
    /// Returns `None` for an index that is not configured or has no crawlers.
    pub fn get_crawlers(&self, index: &str) -> Option<&[CrawlerConfig]> {
        self.indexes.get(index).map(|i| i.crawlers.as_slice()).filter(|c| !c.is_empty())
    }

    /// Project definitions of `index`; empty when the index is unknown.
    pub fn projects(&self, index: &str) -> &[ProjectDefinition] {
        self.indexes.get(index).map(|i| i.projects.as_slice()).unwrap_or_default()
    }

    /// All configured index identifiers, sorted.
    pub fn indexes(&self) -> impl Iterator<Item = &str> {
        self.indexes.keys().map(String::as_str)
    }

    // =========================================================================
    // Identity
    // =========================================================================

    /// Resolve and authorize a crawler.
    ///
    /// `api_key` is `None` when no key check is wanted (progress queries).
    /// When `Some`, it must equal the crawler's configured key; a crawler
    /// without a configured key accepts any key. A missing key on a commit
    /// should be passed as `Some("")`, which never matches a configured key.
    ///
    /// | Condition                               | Rejection        |
    /// |-----------------------------------------|------------------|
    /// | index absent or without crawlers        | `UnknownIndex`   |
    /// | no crawler named `crawler` in the index | `UnknownCrawler` |
    /// | key supplied and different              | `UnknownApiKey`  |
    pub fn validate(
        &self,
        index: &str,
        crawler: &str,
        api_key: Option<&str>,
    ) -> std::result::Result<&CrawlerConfig, Rejection> {
        let crawlers = self.get_crawlers(index).ok_or(Rejection::UnknownIndex)?;
        let config = crawlers.iter().find(|c| c.name == crawler).ok_or(Rejection::UnknownCrawler)?;
        if let (Some(supplied), Some(expected)) = (api_key, config.api_key.as_deref())
            && supplied != expected
        {
            return Err(Rejection::UnknownApiKey);
        }
        Ok(config)
    }
}

impl TryFrom<&Config> for Registry {
    type Error = crate::error::Error;
    fn try_from(config: &Config) -> Result<Self> {
        Self::new(config.indexes.clone())
    }
}
