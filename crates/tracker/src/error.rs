//! Tracker Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.
//!
//! A [`Rejection`] is an expected outcome of a well-formed request (unknown
//! crawler, bad key, stale timestamp) and is reported back to the caller as
//! such. Every other [`ErrorKind`] is a failure of the service itself.

use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};

/// A tracker error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for tracker operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a commit or query was refused.
///
/// Serialized by variant name, which is also the name used on the wire.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rejection {
    /// The index has no registered crawlers.
    #[display("unknown index")]
    UnknownIndex,
    /// The index exists but has no crawler with that name.
    #[display("unknown crawler")]
    UnknownCrawler,
    /// The crawler exists but the supplied API key does not match.
    #[display("unknown API key")]
    UnknownApiKey,
    /// The commit timestamp precedes the stored watermark.
    #[display("commit date inferior to previous")]
    CommitDateInferiorThanPrevious,
}

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request was refused; report the reason back to the caller.
    #[display("request rejected: {_0}")]
    Rejected(#[error(not(source))] Rejection),
    /// The watermark store failed.
    #[display("watermark store error")]
    Store,
    /// Every compare-and-set attempt lost a race against another writer.
    #[display("watermark contention: gave up after {_0} attempts")]
    Contention(#[error(not(source))] usize),
    /// The same crawler name is registered twice within one index.
    #[display("duplicate crawler in index {_0}: {_1}")]
    DuplicateCrawler(#[error(not(source))] String, String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store | Self::Contention(_))
    }

    /// The rejection carried by this error, if it is one.
    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            Self::Rejected(rejection) => Some(*rejection),
            _ => None,
        }
    }
}
