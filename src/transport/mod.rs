//! Client side of the backend HTTP boundary.
//!
//! The backend persists the whole document at `/api/config` and serves the
//! read-only notification and log views. Nothing here retries; callers
//! decide what a failure means for the session.

mod http;
mod session;

pub use http::{HttpTransport, DEFAULT_TIMEOUT_SECS};
pub use session::*;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::document::{null_as_default, ConfigDocument, FormatError};

/// Default page size for the notification history.
pub const DEFAULT_NOTIFICATION_LIMIT: u32 = 20;

/// Timestamp format the backend writes into records.
pub const RECORD_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("backend rejected the configuration: {0}")]
    Rejected(String),
    #[error("unexpected payload: {0}")]
    Format(#[from] FormatError),
}

impl From<serde_json::Error> for TransportError {
    fn from(e: serde_json::Error) -> Self {
        Self::Format(FormatError::Decode(e))
    }
}

// ============================================================================
// Wire types
// ============================================================================

/// Body of a `POST /api/config` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SaveResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One delivered notification as recorded by the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationRecord {
    #[serde(deserialize_with = "null_as_default")]
    pub timestamp: String,
    #[serde(deserialize_with = "null_as_default")]
    pub client: String,
    #[serde(deserialize_with = "null_as_default")]
    pub original: String,
    /// Empty when no summary was produced.
    #[serde(deserialize_with = "null_as_default")]
    pub ai: String,
}

/// One backend log line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogRecord {
    pub timestamp: String,
    pub level: String,
    pub message: String,
}

/// Parse a record timestamp; `None` for anything the backend did not write
/// in its usual format.
pub fn parse_record_timestamp(timestamp: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(timestamp, RECORD_TIMESTAMP_FORMAT).ok()
}

#[derive(Debug, Deserialize)]
pub(crate) struct NotificationsPage {
    #[serde(default, deserialize_with = "null_as_default")]
    pub notifications: Vec<NotificationRecord>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LogsPage {
    #[serde(default, deserialize_with = "null_as_default")]
    pub logs: Vec<LogRecord>,
}

/// Filter for the notification history. Dates are inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationQuery {
    pub limit: u32,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl Default for NotificationQuery {
    fn default() -> Self {
        Self {
            limit: DEFAULT_NOTIFICATION_LIMIT,
            start_date: None,
            end_date: None,
        }
    }
}

impl NotificationQuery {
    pub(crate) fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("limit", self.limit.to_string())];
        if let Some(date) = self.start_date {
            pairs.push(("start_date", date.format("%Y-%m-%d").to_string()));
        }
        if let Some(date) = self.end_date {
            pairs.push(("end_date", date.format("%Y-%m-%d").to_string()));
        }
        pairs
    }
}

/// Log level filter. `None` and `"all"` both mean every level.
pub(crate) fn level_param(level: Option<&str>) -> Option<String> {
    level
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.eq_ignore_ascii_case("all"))
        .map(str::to_uppercase)
}

// ============================================================================
// Transport trait
// ============================================================================

#[async_trait]
pub trait ConfigTransport: Send + Sync {
    /// Fetch the whole document, migrating older payload shapes.
    async fn load_config(&self) -> Result<ConfigDocument, TransportError>;

    /// Persist the whole document as it stands when called.
    async fn save_config(&self, doc: &ConfigDocument) -> Result<(), TransportError>;

    async fn notifications(
        &self,
        query: &NotificationQuery,
    ) -> Result<Vec<NotificationRecord>, TransportError>;

    async fn logs(&self, level: Option<&str>) -> Result<Vec<LogRecord>, TransportError>;
}
