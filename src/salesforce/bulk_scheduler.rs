//! Job pool scheduler for bulk ingest runs.
//!
//! Drives a list of closed ingest jobs to completion by polling them
//! round-robin. A job that reaches a terminal state has its results fetched
//! and merged right away; the rest are polled again after `poll_interval`.
//!
//! # Usage
//!
//! ```ignore
//! let scheduler = JobPoolScheduler::new(&client, PollConfig::default());
//! let bodies = scheduler.run(job_ids, &header, &cancel).await?;
//! ```

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::Deserialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::salesforce::bulk_ingest_v2::{redact_id, BulkIngestJobInfo, BulkIngestV2Client};
use crate::streaming::{fetch_and_merge, CsvHeader, JobResultProvider};

/// Default pause between polling rounds.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// What to do when a job ends `Failed` or `Aborted`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobFailurePolicy {
    /// Fetch and merge the job's results like any finished job.
    #[default]
    FetchResults,
    /// Stop the run with `AppError::JobFailed`.
    Surface,
}

/// Polling configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Pause between rounds (default: 5 s).
    #[serde(
        rename = "poll_interval_secs",
        deserialize_with = "crate::config::duration_secs::deserialize"
    )]
    pub poll_interval: Duration,
    /// Upper bound on total polling time. Unbounded when `None`.
    #[serde(
        rename = "max_poll_duration_secs",
        deserialize_with = "crate::config::duration_secs::deserialize_option"
    )]
    pub max_poll_duration: Option<Duration>,
    /// Handling of `Failed`/`Aborted` jobs.
    pub failure_policy: JobFailurePolicy,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_poll_duration: None,
            failure_policy: JobFailurePolicy::default(),
        }
    }
}

impl PollConfig {
    /// Sets the pause between rounds.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the polling deadline.
    pub fn max_poll_duration(mut self, limit: Duration) -> Self {
        self.max_poll_duration = Some(limit);
        self
    }

    /// Sets the failure policy.
    pub fn failure_policy(mut self, policy: JobFailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.poll_interval.is_zero() {
            return Err(AppError::ConfigurationError(
                "poll_interval must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Provider Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Status and abort calls the scheduler needs.
///
/// Implemented by the real client; tests provide scripted fakes.
pub trait JobStatusProvider: Send + Sync {
    /// Gets the current job status.
    fn get_job_status<'a>(
        &'a self,
        job_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<BulkIngestJobInfo, AppError>> + Send + 'a>>;

    /// Aborts a job (best-effort).
    fn abort_job<'a>(
        &'a self,
        job_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), AppError>> + Send + 'a>>;
}

impl JobStatusProvider for BulkIngestV2Client {
    fn get_job_status<'a>(
        &'a self,
        job_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<BulkIngestJobInfo, AppError>> + Send + 'a>> {
        Box::pin(BulkIngestV2Client::get_job_status(self, job_id))
    }

    fn abort_job<'a>(
        &'a self,
        job_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), AppError>> + Send + 'a>> {
        Box::pin(BulkIngestV2Client::abort_job(self, job_id))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// JobPoolScheduler
// ─────────────────────────────────────────────────────────────────────────────

/// Round-robin poller over a set of submitted jobs.
pub struct JobPoolScheduler<'a, P: ?Sized> {
    provider: &'a P,
    config: PollConfig,
}

impl<'a, P> JobPoolScheduler<'a, P>
where
    P: JobStatusProvider + JobResultProvider + ?Sized,
{
    pub fn new(provider: &'a P, config: PollConfig) -> Self {
        Self { provider, config }
    }

    /// Polls every job until it is terminal and returns one merged result
    /// body per job, in completion order.
    ///
    /// Each round checks jobs in list order and builds a fresh list of the
    /// ones still open. The scheduler sleeps only between rounds that leave
    /// work behind.
    ///
    /// # Errors
    ///
    /// - `AppError::Cancelled` - `cancel` fired; open jobs were aborted
    /// - `AppError::PollingTimeout` - `max_poll_duration` elapsed; open jobs were aborted
    /// - `AppError::JobFailed` - a job failed under `JobFailurePolicy::Surface`;
    ///   the jobs still open were aborted
    /// - Any status or result fetch error
    pub async fn run(
        &self,
        job_ids: Vec<String>,
        header: &CsvHeader,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, AppError> {
        let started = Instant::now();
        let total = job_ids.len();
        let mut open_jobs = job_ids;
        let mut bodies: Vec<String> = Vec::with_capacity(total);
        let mut round: u64 = 0;

        info!("[BULK-SCHEDULER] Polling {} job(s)", total);

        while !open_jobs.is_empty() {
            if cancel.is_cancelled() {
                return Err(self.abort_open_jobs(&open_jobs, AppError::Cancelled).await);
            }

            if let Some(limit) = self.config.max_poll_duration {
                let elapsed = started.elapsed();
                if elapsed > limit {
                    let err = AppError::PollingTimeout {
                        elapsed_secs: elapsed.as_secs(),
                        pending_jobs: open_jobs.len(),
                    };
                    return Err(self.abort_open_jobs(&open_jobs, err).await);
                }
            }

            round += 1;
            let mut still_open: Vec<String> = Vec::with_capacity(open_jobs.len());

            let mut pending = open_jobs.into_iter();

            while let Some(job_id) = pending.next() {
                let info = self.provider.get_job_status(&job_id).await?;

                if !info.state.is_terminal() {
                    still_open.push(job_id);
                    continue;
                }

                if info.state.is_unsuccessful() {
                    let message = info
                        .error_message
                        .unwrap_or_else(|| "Unknown error".to_string());
                    warn!(
                        "[BULK-SCHEDULER] Job {} ended {:?}: {}",
                        redact_id(&job_id),
                        info.state,
                        message
                    );

                    if self.config.failure_policy == JobFailurePolicy::Surface {
                        let remaining: Vec<String> =
                            still_open.into_iter().chain(pending).collect();
                        let err = AppError::JobFailed {
                            job_id,
                            state: info.state,
                            message,
                        };
                        return Err(self.abort_open_jobs(&remaining, err).await);
                    }
                } else {
                    info!(
                        "[BULK-SCHEDULER] Job {} complete ({} processed, {} failed)",
                        redact_id(&job_id),
                        info.processed_records.unwrap_or(0),
                        info.failed_records.unwrap_or(0)
                    );
                }

                bodies.push(fetch_and_merge(self.provider, &job_id, header).await?);
            }

            open_jobs = still_open;

            if open_jobs.is_empty() {
                break;
            }

            debug!(
                round,
                remaining = open_jobs.len(),
                "[BULK-SCHEDULER] Jobs still running, sleeping"
            );

            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(self.abort_open_jobs(&open_jobs, AppError::Cancelled).await);
                }
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }

        info!(
            "[BULK-SCHEDULER] All {} job(s) finished after {} round(s)",
            total, round
        );

        Ok(bodies)
    }

    /// Best-effort abort of every open job; returns `reason` for the caller
    /// to propagate.
    pub(crate) async fn abort_open_jobs(&self, open_jobs: &[String], reason: AppError) -> AppError {
        warn!(
            "[BULK-SCHEDULER] {}; aborting {} open job(s)",
            reason,
            open_jobs.len()
        );

        for job_id in open_jobs {
            if let Err(e) = self.provider.abort_job(job_id).await {
                warn!(
                    "[BULK-SCHEDULER] Abort of job {} failed: {}",
                    redact_id(job_id),
                    e
                );
            }
        }

        reason
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
