//! Request and response shapes.
//!
//! Requests arrive already decoded. Responses carry either the timestamp or
//! the [`Rejection`] reason; they serialize as `{"timestamp": "<RFC 3339>"}`
//! or `{"error": "<Rejection>"}`.
//!
//! Only rejections end up in a response. Store failures and exhausted
//! retries are returned as `Err` so the transport can report a transient
//! failure instead.

use crate::Tracker;
use crate::error::{Rejection, Result};
use crawlmark_config::ProjectDefinition;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRequest {
    pub index: String,
    pub crawler: String,
    /// Empty when the client sent none.
    #[serde(default, alias = "apikey")]
    pub api_key: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastUpdatedRequest {
    pub index: String,
    pub crawler: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectsRequest {
    pub index: String,
}

/// Either a timestamp or the reason there is none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampResponse {
    Timestamp(#[serde(with = "time::serde::rfc3339")] OffsetDateTime),
    Error(Rejection),
}
impl TimestampResponse {
    fn from_result(result: Result<OffsetDateTime>) -> Result<Self> {
        match result {
            Ok(timestamp) => Ok(Self::Timestamp(timestamp)),
            Err(err) => match err.rejection() {
                Some(rejection) => Ok(Self::Error(rejection)),
                None => Err(err),
            },
        }
    }
}

/// The accepted timestamp, echoed back.
pub type CommitResponse = TimestampResponse;
/// The watermark, or the baseline if the crawler never committed.
pub type LastUpdatedResponse = TimestampResponse;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectsResponse {
    pub projects: Vec<ProjectDefinition>,
}

pub async fn commit(tracker: &Tracker, request: &CommitRequest) -> Result<CommitResponse> {
    let result = tracker.commit(&request.index, &request.crawler, &request.api_key, request.timestamp).await;
    TimestampResponse::from_result(result)
}

pub async fn last_updated(tracker: &Tracker, request: &LastUpdatedRequest) -> Result<LastUpdatedResponse> {
    TimestampResponse::from_result(tracker.last_updated(&request.index, &request.crawler).await)
}

pub fn projects(tracker: &Tracker, request: &ProjectsRequest) -> ProjectsResponse {
    ProjectsResponse {
        projects: tracker.projects(&request.index).to_vec(),
    }
}
