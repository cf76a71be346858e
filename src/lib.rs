//! Bulk record mutation against the Salesforce Bulk API v2 ingest endpoint.
//!
//! Large record sets are split into size-bounded CSV chunks, each chunk is
//! driven through its own ingest job, every job is polled to completion and
//! the per-job success, failure and unprocessed results are merged back into
//! CSV text.

pub mod bulk;
pub mod config;
pub mod error;
pub mod salesforce;
pub mod streaming;
pub mod telemetry;

pub use bulk::{BulkIngestHandler, IngestClientOps, SObjectBulk};
pub use config::BulkConfig;
pub use error::{AppError, RemoteError, ResponseContent};
pub use salesforce::{
    BulkIngestV2Client, BulkJobState, BulkOperation, JobFailurePolicy, PollConfig,
    SessionCredentials,
};
pub use streaming::{BulkData, ChunkConfig, Record};
