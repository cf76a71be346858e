use std::fmt;

use serde::Deserialize;
use thiserror::Error;

use crate::salesforce::{BulkJobState, ResultPartition};

// ─────────────────────────────────────────────────────────────────────────────
// Remote Error Details
// ─────────────────────────────────────────────────────────────────────────────

/// Parsed body of a non-2xx response.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseContent {
    /// Body parsed as JSON.
    Json(serde_json::Value),
    /// Body that was not valid JSON, kept verbatim.
    Text(String),
}

impl ResponseContent {
    /// Parses a response body, preferring JSON and falling back to raw text.
    pub fn parse(body: String) -> Self {
        match serde_json::from_str::<serde_json::Value>(&body) {
            Ok(value) => ResponseContent::Json(value),
            Err(_) => ResponseContent::Text(body),
        }
    }

    /// Returns the first `[errorCode] message` pair if the body uses the
    /// Salesforce error array format.
    pub fn salesforce_error(&self) -> Option<String> {
        let ResponseContent::Json(value) = self else {
            return None;
        };
        let errors: Vec<SalesforceError> = serde_json::from_value(value.clone()).ok()?;
        errors
            .first()
            .map(|e| format!("[{}] {}", e.error_code, e.message))
    }
}

impl fmt::Display for ResponseContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(sf) = self.salesforce_error() {
            return f.write_str(&sf);
        }
        match self {
            ResponseContent::Json(value) => write!(f, "{}", value),
            ResponseContent::Text(text) if text.trim().is_empty() => f.write_str("<empty body>"),
            ResponseContent::Text(text) => f.write_str(text),
        }
    }
}

/// Salesforce API error response format.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SalesforceError {
    message: String,
    error_code: String,
}

/// Everything known about a failed remote call.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteError {
    /// Request URL, path only (never host or query).
    pub url: String,
    /// HTTP status code.
    pub status: u16,
    /// Which resource the call addressed (e.g. "ingest job", "batch").
    pub resource_name: String,
    /// Parsed response body.
    pub content: ResponseContent,
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "HTTP {} on {} ({}): {}",
            self.status, self.url, self.resource_name, self.content
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// AppError
// ─────────────────────────────────────────────────────────────────────────────

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum AppError {
    // ── Remote (mapped from HTTP status) ──────────────────────────────────────
    #[error("More than one record matched: {0}")]
    AmbiguousMatch(RemoteError),

    #[error("Malformed request: {0}")]
    MalformedRequest(RemoteError),

    #[error("Session expired: {0}")]
    ExpiredSession(RemoteError),

    #[error("Request refused: {0}")]
    RequestRefused(RemoteError),

    #[error("Resource not found: {0}")]
    ResourceNotFound(RemoteError),

    #[error("Salesforce error: {0}")]
    GeneralRemoteError(RemoteError),

    // ── Bulk Operations ───────────────────────────────────────────────────────
    #[error("Bulk job {job_id} ended in state {state:?}: {message}")]
    JobFailed {
        job_id: String,
        state: BulkJobState,
        message: String,
    },

    #[error("Failed to fetch {partition} for job {job_id}: {source}")]
    ResultFetch {
        job_id: String,
        partition: ResultPartition,
        #[source]
        source: Box<AppError>,
    },

    #[error("Polling timed out after {elapsed_secs}s with {pending_jobs} job(s) still open")]
    PollingTimeout { elapsed_secs: u64, pending_jobs: usize },

    #[error("Operation cancelled")]
    Cancelled,

    // ── Caller Input ──────────────────────────────────────────────────────────
    #[error("Invalid configuration: {0}")]
    ConfigurationError(String),

    #[error("{}", schema_message(.row, .message))]
    SchemaError { row: Option<usize>, message: String },

    #[error("CSV chunk error: {0}")]
    CsvChunkError(String),

    // ── Network ───────────────────────────────────────────────────────────────
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    // ── Generic fallback ──────────────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

fn schema_message(row: &Option<usize>, message: &str) -> String {
    match row {
        Some(row) => format!("Schema error at record {}: {}", row, message),
        None => format!("Schema error: {}", message),
    }
}

impl AppError {
    /// Maps a non-2xx HTTP status to the matching error kind.
    ///
    /// 300 → `AmbiguousMatch`, 400 → `MalformedRequest`, 401 → `ExpiredSession`,
    /// 403 → `RequestRefused`, 404 → `ResourceNotFound`, anything else →
    /// `GeneralRemoteError`.
    pub fn from_status(
        url: impl Into<String>,
        status: u16,
        resource_name: impl Into<String>,
        body: String,
    ) -> Self {
        let remote = RemoteError {
            url: url.into(),
            status,
            resource_name: resource_name.into(),
            content: ResponseContent::parse(body),
        };

        match status {
            300 => AppError::AmbiguousMatch(remote),
            400 => AppError::MalformedRequest(remote),
            401 => AppError::ExpiredSession(remote),
            403 => AppError::RequestRefused(remote),
            404 => AppError::ResourceNotFound(remote),
            _ => AppError::GeneralRemoteError(remote),
        }
    }

    /// Returns the remote details when this error came from a non-2xx response.
    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            AppError::AmbiguousMatch(r)
            | AppError::MalformedRequest(r)
            | AppError::ExpiredSession(r)
            | AppError::RequestRefused(r)
            | AppError::ResourceNotFound(r)
            | AppError::GeneralRemoteError(r) => Some(r),
            AppError::ResultFetch { source, .. } => source.remote(),
            _ => None,
        }
    }

    /// HTTP status code of the underlying remote failure, if any.
    pub fn status(&self) -> Option<u16> {
        self.remote().map(|r| r.status)
    }

    pub(crate) fn schema(row: Option<usize>, message: impl Into<String>) -> Self {
        AppError::SchemaError {
            row,
            message: message.into(),
        }
    }
}
