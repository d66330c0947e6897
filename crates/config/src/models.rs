//! Configuration models.
//!
//! These are plain deserialization targets. Nothing here enforces cross-entry
//! rules (such as crawler name uniqueness); that is the job of whoever builds
//! a registry out of them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use time::OffsetDateTime;

/// Default size of the SQLite connection pool.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DATABASE_FILENAME: &str = "crawlmark.db";

/// Root configuration object.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    /// Keyed by index identifier.
    pub indexes: BTreeMap<String, IndexConfig>,
}

/// Where and how the watermark database is opened.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
    pub max_connections: Option<u32>,
}
impl DatabaseConfig {
    /// The configured database path, or `crawlmark.db` in the platform data
    /// directory when none is configured.
    pub fn resolved_path(&self) -> PathBuf {
        if let Some(path) = &self.path {
            return path.clone();
        }
        match crate::project_dirs() {
            Some(dirs) => dirs.data_local_dir().join(DATABASE_FILENAME),
            None => PathBuf::from(DATABASE_FILENAME),
        }
    }

    pub fn resolved_max_connections(&self) -> u32 {
        self.max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS)
    }
}

/// Everything configured for a single index.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct IndexConfig {
    /// Ordered; order is preserved for listings.
    pub crawlers: Vec<CrawlerConfig>,
    pub projects: Vec<ProjectDefinition>,
}

/// A crawler allowed to report progress against an index.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CrawlerConfig {
    pub name: String,
    /// Shared secret required to commit. `None` means commits are not
    /// authenticated for this crawler.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Progress point reported before the crawler has ever committed.
    #[serde(alias = "updated_since", deserialize_with = "utc::deserialize")]
    pub baseline_since: OffsetDateTime,
}
impl CrawlerConfig {
    pub fn new(name: impl Into<String>, api_key: Option<String>, baseline_since: OffsetDateTime) -> Self {
        Self {
            name: name.into(),
            api_key,
            baseline_since: baseline_since.to_offset(time::UtcOffset::UTC),
        }
    }
}

/// A named project within an index. Carried verbatim from configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ProjectDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository_regex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_regex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_regex: Option<String>,
}

/// RFC 3339 timestamps, normalized to UTC on the way in.
mod utc {
    use serde::{Deserialize, Deserializer};
    use time::format_description::well_known::Rfc3339;
    use time::{OffsetDateTime, UtcOffset};

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<OffsetDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        OffsetDateTime::parse(raw.trim(), &Rfc3339)
            .map(|dt| dt.to_offset(UtcOffset::UTC))
            .map_err(serde::de::Error::custom)
    }
}
