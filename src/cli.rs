//! Command-line interface definition.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

#[derive(Debug, Parser)]
#[command(name = "crawlmark", version, about)]
pub struct Cli {
    /// Configuration file (TOML, YAML or JSON).
    #[arg(long, short, global = true, env = "CRAWLMARK_CONFIG")]
    pub config: Option<PathBuf>,
    /// Validate and report as usual, but never write watermarks.
    #[arg(long, global = true)]
    pub dry_run: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Commit a crawler's progress timestamp.
    Commit {
        #[arg(long)]
        index: String,
        #[arg(long)]
        crawler: String,
        #[arg(long, env = "CRAWLMARK_API_KEY", hide_env_values = true, default_value = "")]
        api_key: String,
        /// RFC 3339 timestamp; defaults to now.
        #[arg(long, value_parser = parse_timestamp)]
        timestamp: Option<OffsetDateTime>,
    },
    /// Show how far a crawler has progressed.
    LastUpdated {
        #[arg(long)]
        index: String,
        #[arg(long)]
        crawler: String,
    },
    /// Show the progress of every crawler of an index.
    Status {
        #[arg(long)]
        index: String,
    },
    /// List the projects configured for an index.
    Projects {
        #[arg(long)]
        index: String,
    },
}

fn parse_timestamp(value: &str) -> Result<OffsetDateTime, String> {
    OffsetDateTime::parse(value.trim(), &Rfc3339).map_err(|e| format!("expected an RFC 3339 timestamp: {e}"))
}
