//! Salesforce Bulk API v2 ingest layer.
//!
//! - **Session credentials** via `secrecy::SecretString`, never logged
//! - **Job driver** for the create → upload → close → poll protocol
//! - **Job pool scheduler** that polls open jobs round-robin and merges
//!   results as each job finishes

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod bulk_ingest_v2;
pub mod bulk_scheduler;
pub mod client;

pub use bulk_ingest_v2::{
    BulkIngestJobInfo, BulkIngestV2Client, BulkOperation, CreateIngestJobRequest,
};
pub use bulk_scheduler::{
    JobFailurePolicy, JobPoolScheduler, JobStatusProvider, PollConfig, DEFAULT_POLL_INTERVAL,
};
pub use client::{sanitize_url_for_logs, SessionCredentials};

/// Default Salesforce REST API version.
pub const API_VERSION: &str = "v60.0";

// ─────────────────────────────────────────────────────────────────────────────
// BulkJobState
// ─────────────────────────────────────────────────────────────────────────────

/// Remote state of a bulk ingest job.
///
/// `Open → UploadComplete → InProgress → {JobComplete | Failed | Aborted}`.
/// States the service adds later deserialize as `Unknown` and are treated as
/// still in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BulkJobState {
    Open,
    UploadComplete,
    InProgress,
    JobComplete,
    Failed,
    Aborted,
    #[serde(other)]
    Unknown,
}

impl BulkJobState {
    /// True for states from which no further transition occurs.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BulkJobState::JobComplete | BulkJobState::Failed | BulkJobState::Aborted
        )
    }

    /// True for `Failed` and `Aborted`.
    pub fn is_unsuccessful(self) -> bool {
        matches!(self, BulkJobState::Failed | BulkJobState::Aborted)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ResultPartition
// ─────────────────────────────────────────────────────────────────────────────

/// One of the three disjoint result sets a finished job exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultPartition {
    /// Rows the service applied. Leading columns `sf__Id`, `sf__Created`.
    Successful,
    /// Rows the service rejected. Leading columns `sf__Id`, `sf__Error`.
    Failed,
    /// Rows never attempted. Original columns only.
    Unprocessed,
}

impl ResultPartition {
    /// All partitions in merge order.
    pub const ALL: [ResultPartition; 3] = [
        ResultPartition::Successful,
        ResultPartition::Failed,
        ResultPartition::Unprocessed,
    ];

    /// URL path segment of the partition's endpoint.
    pub fn path_segment(self) -> &'static str {
        match self {
            ResultPartition::Successful => "successfulResults",
            ResultPartition::Failed => "failedResults",
            ResultPartition::Unprocessed => "unprocessedrecords",
        }
    }
}

impl fmt::Display for ResultPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path_segment())
    }
}
