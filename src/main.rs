mod cli;
mod error;

use crate::cli::{Cli, Command};
use crate::error::{ErrorKind, Result};
use clap::Parser;
use crawlmark_config::Config;
use crawlmark_store::{Database, ReadOnlyStore, Repository, StoreHandle};
use crawlmark_tracker::api::{self, CommitRequest, LastUpdatedRequest, ProjectsRequest, TimestampResponse};
use crawlmark_tracker::{Registry, Tracker};
use exn::ResultExt;
use serde_json::Value;
use std::process::ExitCode;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing_subscriber::EnvFilter;

/// Exit code for a request that was handled but refused (bad key, stale
/// timestamp, ...).
const EXIT_REJECTED: u8 = 2;
/// Exit code for a failure that may go away on retry (`EX_TEMPFAIL`).
const EXIT_TEMPORARY: u8 = 75;

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr; stdout is reserved for the JSON response.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("crawlmark=info")))
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:?}");
            ExitCode::from(failure_code(&err))
        },
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    let registry = Registry::try_from(&config).or_raise(|| ErrorKind::Registry)?;
    let path = config.database.resolved_path();
    tracing::debug!(path = %path.display(), "Opening watermark database");
    let db = Database::connect(&path, Some(config.database.resolved_max_connections()))
        .await
        .or_raise(|| ErrorKind::Database)?;
    let mut store: StoreHandle = Arc::new(Repository::from(&db));
    if cli.dry_run {
        store = Arc::new(ReadOnlyStore::new(store));
    }
    let tracker = Tracker::new(registry, store);
    let result = dispatch(&tracker, cli.command).await;
    db.close().await;
    let (response, rejected) = result?;
    println!("{}", serde_json::to_string_pretty(&response).or_raise(|| ErrorKind::Output)?);
    Ok(match rejected {
        true => ExitCode::from(EXIT_REJECTED),
        false => ExitCode::SUCCESS,
    })
}

fn failure_code(kind: &ErrorKind) -> u8 {
    match kind.is_retryable() {
        true => EXIT_TEMPORARY,
        false => 1,
    }
}

/// Runs one command, returning the JSON response and whether it is a
/// rejection.
async fn dispatch(tracker: &Tracker, command: Command) -> Result<(Value, bool)> {
    let response = match command {
        Command::Commit { index, crawler, api_key, timestamp } => {
            let request = CommitRequest {
                index,
                crawler,
                api_key,
                timestamp: timestamp.unwrap_or_else(OffsetDateTime::now_utc),
            };
            api::commit(tracker, &request).await.or_raise(|| ErrorKind::Request)?
        },
        Command::LastUpdated { index, crawler } => {
            let request = LastUpdatedRequest { index, crawler };
            api::last_updated(tracker, &request).await.or_raise(|| ErrorKind::Request)?
        },
        Command::Status { index } => {
            return match tracker.status(&index).await {
                Ok(status) => Ok((serde_json::json!({ "crawlers": status }), false)),
                Err(err) => match err.rejection() {
                    Some(rejection) => Ok((serde_json::json!({ "error": rejection }), true)),
                    None => Err(err.raise(ErrorKind::Request)),
                },
            };
        },
        Command::Projects { index } => {
            let response = api::projects(tracker, &ProjectsRequest { index });
            return Ok((serde_json::to_value(response).or_raise(|| ErrorKind::Output)?, false));
        },
    };
    let rejected = matches!(response, TimestampResponse::Error(_));
    Ok((serde_json::to_value(response).or_raise(|| ErrorKind::Output)?, rejected))
}
