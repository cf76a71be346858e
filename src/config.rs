//! Configuration for bulk ingest runs.
//!
//! All settings have defaults matching the service limits, can be adjusted with
//! consuming builder methods, and deserialize from any serde format with
//! durations given in whole seconds:
//!
//! ```json
//! {
//!   "chunk": { "max_bytes": 104857600, "max_records": 10000 },
//!   "poll":  { "poll_interval_secs": 5, "max_poll_duration_secs": 3600,
//!              "failure_policy": "surface" }
//! }
//! ```

use serde::Deserialize;

use crate::error::AppError;
use crate::salesforce::PollConfig;
use crate::streaming::ChunkConfig;

/// Settings for one `BulkIngestHandler`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BulkConfig {
    /// Chunk size limits.
    pub chunk: ChunkConfig,
    /// Polling cadence, deadline and failure policy.
    pub poll: PollConfig,
}

impl BulkConfig {
    pub fn with_chunk(mut self, chunk: ChunkConfig) -> Self {
        self.chunk = chunk;
        self
    }

    pub fn with_poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Validates every section.
    ///
    /// # Errors
    ///
    /// `AppError::ConfigurationError` naming the first offending setting.
    pub fn validate(&self) -> Result<(), AppError> {
        self.chunk.validate()?;
        self.poll.validate()
    }
}

/// Serde helpers for durations expressed in seconds.
pub(crate) mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }

    pub fn deserialize_option<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_secs))
    }
}
