//! Crawler progress tracking.
//!
//! Untrusted crawlers report how far they have ingested an index by
//! committing a timestamp (their *watermark*); anyone who knows the index and
//! crawler name can ask for it back. This crate holds the rules:
//!
//! - **Identity**: [`Registry::validate`] resolves a crawler by index and name
//!   and checks its API key (commits only).
//! - **Commit**: [`Tracker::commit`] only ever moves a watermark forward (or
//!   keeps it in place), even under concurrent commits.
//! - **Query**: [`Tracker::last_updated`] returns the watermark, falling back
//!   to the crawler's configured baseline before its first commit.
//!
//! The registry and the [`WatermarkStore`](crawlmark_store::WatermarkStore)
//! are injected into the [`Tracker`]; [`api`] maps decoded requests onto it
//! and shapes the responses.

pub mod api;
pub mod error;
mod registry;
mod tracker;

pub use crate::error::Rejection;
pub use crate::registry::Registry;
pub use crate::tracker::{CrawlerStatus, MAX_COMMIT_ATTEMPTS, Tracker};
