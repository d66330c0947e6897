//! Configuration loading for crawlmark.
//!
//! Configuration is merged with [figment] from, in increasing priority:
//!
//! 1. a configuration file (TOML, YAML or JSON, chosen by extension), and
//! 2. environment variables prefixed with `CRAWLMARK_`, where nested keys are
//!    separated by a double underscore (`CRAWLMARK_DATABASE__PATH=...`).
//!
//! When no file is given explicitly, `<config dir>/crawlmark/config.toml` is
//! used if it exists. A missing *default* file is not an error; a missing
//! *explicit* file is.
//!
//! # Example
//!
//! ```toml
//! [database]
//! path = "/var/lib/crawlmark/crawlmark.db"
//!
//! [[indexes.proj1.crawlers]]
//! name = "c1"
//! api_key = "k1"
//! baseline_since = "2020-01-01T00:00:00Z"
//!
//! [[indexes.proj1.projects]]
//! name = "core"
//! repository_regex = "org/core.*"
//! ```

pub mod error;
mod models;

pub use crate::models::{
    Config, CrawlerConfig, DEFAULT_MAX_CONNECTIONS, DatabaseConfig, IndexConfig, ProjectDefinition,
};
use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Toml, Yaml};
use std::path::{Path, PathBuf};
use tracing::instrument;

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "CRAWLMARK_";
const CONFIG_FILENAME: &str = "config.toml";

pub(crate) fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "crawlmark")
}

impl Config {
    /// Location of the configuration file used when none is given.
    pub fn default_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILENAME))
    }

    /// Load configuration from `path` (or the default location) merged with
    /// environment overrides.
    #[instrument(level = "debug")]
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let figment = match path {
            Some(path) if !path.is_file() => exn::bail!(ErrorKind::NotFound(path.to_path_buf())),
            Some(path) => Self::file_provider(path)?,
            None => match Self::default_path().filter(|p| p.is_file()) {
                Some(path) => Self::file_provider(&path)?,
                None => {
                    tracing::debug!("No configuration file found; using environment only");
                    Figment::new()
                },
            },
        };
        Self::from_figment(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Extract configuration from an already-assembled [`Figment`].
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Self = figment.extract().or_raise(|| ErrorKind::Invalid)?;
        tracing::debug!(indexes = config.indexes.len(), "Configuration loaded");
        Ok(config)
    }

    fn file_provider(path: &Path) -> Result<Figment> {
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or_default().to_ascii_lowercase();
        let figment = Figment::new();
        Ok(match extension.as_str() {
            "toml" => figment.merge(Toml::file(path)),
            "yaml" | "yml" => figment.merge(Yaml::file(path)),
            "json" => figment.merge(Json::file(path)),
            _ => exn::bail!(ErrorKind::UnsupportedFormat(extension)),
        })
    }
}
