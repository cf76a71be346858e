//! Bulk operation entry points.
//!
//! `BulkIngestHandler` owns a client and settings; `handler.sobject("Contact")`
//! scopes operations to one object. Every operation runs the same pipeline:
//!
//! 1. Turn the input into a header plus rows (encoding records if needed)
//! 2. Split the rows into size-bounded chunks
//! 3. For each chunk in order: create a job, upload the chunk, close the job
//! 4. Poll every submitted job to a terminal state and merge its results
//! 5. Join the per-job result bodies with `\n`

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::bulk::ops::IngestClientOps;
use crate::config::BulkConfig;
use crate::error::AppError;
use crate::salesforce::bulk_ingest_v2::redact_id;
use crate::salesforce::client::build_http_client;
use crate::salesforce::{
    BulkIngestV2Client, BulkOperation, CreateIngestJobRequest, JobPoolScheduler,
    SessionCredentials,
};
use crate::streaming::{chunk_rows, BulkData, Chunk, CsvChunker, RowIter};

// ─────────────────────────────────────────────────────────────────────────────
// BulkIngestHandler
// ─────────────────────────────────────────────────────────────────────────────

/// Runs bulk ingest operations with one client and one set of settings.
pub struct BulkIngestHandler<C = BulkIngestV2Client> {
    client: C,
    config: BulkConfig,
}

impl BulkIngestHandler<BulkIngestV2Client> {
    /// Builds a handler over a fresh HTTP client for `credentials`.
    ///
    /// # Errors
    ///
    /// - `AppError::ConfigurationError` - Invalid settings
    /// - `AppError::Internal` - The HTTP client or ingest URL cannot be built
    pub fn connect(credentials: SessionCredentials, config: BulkConfig) -> Result<Self, AppError> {
        let http = build_http_client()?;
        let client = BulkIngestV2Client::new(Arc::new(http), credentials)?;
        Self::new(client, config)
    }
}

impl<C: IngestClientOps> BulkIngestHandler<C> {
    /// Creates a handler after validating `config`.
    ///
    /// # Errors
    ///
    /// `AppError::ConfigurationError` naming the first invalid setting.
    pub fn new(client: C, config: BulkConfig) -> Result<Self, AppError> {
        config.validate()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &BulkConfig {
        &self.config
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Scopes operations to one object, e.g. `"Contact"`.
    pub fn sobject(&self, object: impl Into<String>) -> SObjectBulk<'_, C> {
        SObjectBulk {
            handler: self,
            object: object.into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SObjectBulk
// ─────────────────────────────────────────────────────────────────────────────

/// Bulk operations against a single object.
///
/// Each call returns the merged result CSV of every job it submitted, in job
/// completion order, one body per job with its own header.
pub struct SObjectBulk<'h, C> {
    handler: &'h BulkIngestHandler<C>,
    object: String,
}

impl<'h, C: IngestClientOps> SObjectBulk<'h, C> {
    pub fn object(&self) -> &str {
        &self.object
    }

    pub async fn insert(&self, data: impl Into<BulkData>) -> Result<String, AppError> {
        self.run(BulkOperation::Insert, data.into(), None, &CancellationToken::new())
            .await
    }

    pub async fn update(&self, data: impl Into<BulkData>) -> Result<String, AppError> {
        self.run(BulkOperation::Update, data.into(), None, &CancellationToken::new())
            .await
    }

    /// Inserts or updates rows matched on `external_id_field`.
    ///
    /// # Errors
    ///
    /// `AppError::ConfigurationError` before any request if `external_id_field`
    /// is blank.
    pub async fn upsert(
        &self,
        data: impl Into<BulkData>,
        external_id_field: &str,
    ) -> Result<String, AppError> {
        self.run(
            BulkOperation::Upsert,
            data.into(),
            Some(external_id_field),
            &CancellationToken::new(),
        )
        .await
    }

    pub async fn delete(&self, data: impl Into<BulkData>) -> Result<String, AppError> {
        self.run(BulkOperation::Delete, data.into(), None, &CancellationToken::new())
            .await
    }

    /// Runs `operation` over `data`, stopping early when `cancel` fires.
    ///
    /// `external_id_field` is required for upserts and ignored otherwise.
    ///
    /// # Errors
    ///
    /// - `AppError::ConfigurationError` - Blank object name or upsert field
    /// - `AppError::SchemaError` / `AppError::CsvChunkError` - Bad input
    /// - `AppError::Cancelled` - `cancel` fired; submitted jobs were aborted
    /// - Any remote, polling or result fetch error
    pub async fn run(
        &self,
        operation: BulkOperation,
        data: BulkData,
        external_id_field: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<String, AppError> {
        if self.object.trim().is_empty() {
            return Err(AppError::ConfigurationError(
                "Object name must not be blank".to_string(),
            ));
        }
        let external_id = resolve_external_id(operation, external_id_field)?;

        let operation_id = Uuid::new_v4();
        let span = info_span!(
            "bulk_operation",
            %operation_id,
            object = %self.object,
            operation = %operation
        );

        let orchestrator = BulkUploadOrchestrator {
            client: &self.handler.client,
            config: &self.handler.config,
            object: &self.object,
            operation,
            external_id,
            cancel,
        };

        orchestrator.run(data).instrument(span).await
    }
}

/// Upserts need a non-blank field name; other operations never send one.
fn resolve_external_id(
    operation: BulkOperation,
    external_id_field: Option<&str>,
) -> Result<Option<String>, AppError> {
    let field = external_id_field.map(str::trim).filter(|f| !f.is_empty());

    match (operation, field) {
        (BulkOperation::Upsert, Some(field)) => Ok(Some(field.to_string())),
        (BulkOperation::Upsert, None) => Err(AppError::ConfigurationError(
            "Upsert requires a non-blank external ID field".to_string(),
        )),
        (_, Some(field)) => {
            debug!(
                "[BULK-ORCHESTRATOR] Ignoring external ID field {} for {}",
                field, operation
            );
            Ok(None)
        }
        (_, None) => Ok(None),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Orchestrator
// ─────────────────────────────────────────────────────────────────────────────

/// State for one bulk call. Nothing outlives the call.
struct BulkUploadOrchestrator<'a, C> {
    client: &'a C,
    config: &'a BulkConfig,
    object: &'a str,
    operation: BulkOperation,
    external_id: Option<String>,
    cancel: &'a CancellationToken,
}

impl<'a, C: IngestClientOps> BulkUploadOrchestrator<'a, C> {
    async fn run(self, data: BulkData) -> Result<String, AppError> {
        if self.cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        let (header, rows) = data.into_rows()?;
        let chunks = chunk_rows(&header, rows, &self.config.chunk)?;

        let job_ids = self.submit_chunks(chunks).await?;

        info!(
            "[BULK-ORCHESTRATOR] Submitted {} job(s) for {} {}",
            job_ids.len(),
            self.operation.as_str(),
            self.object
        );

        let bodies = self
            .scheduler()
            .run(job_ids, &header, self.cancel)
            .await?;

        info!(
            "[BULK-ORCHESTRATOR] Finished {} {} with {} result bod{}",
            self.operation.as_str(),
            self.object,
            bodies.len(),
            if bodies.len() == 1 { "y" } else { "ies" }
        );

        Ok(bodies.join("\n"))
    }

    fn scheduler(&self) -> JobPoolScheduler<'a, C> {
        JobPoolScheduler::new(self.client, self.config.poll.clone())
    }

    /// Submits chunks one at a time. On any failure the jobs already submitted
    /// are aborted before the error is returned.
    async fn submit_chunks(&self, chunks: CsvChunker<RowIter>) -> Result<Vec<String>, AppError> {
        let mut job_ids: Vec<String> = Vec::new();

        for chunk in chunks {
            let submitted = match chunk {
                Ok(_) if self.cancel.is_cancelled() => Err(AppError::Cancelled),
                Ok(chunk) => self.process_chunk(chunk).await,
                Err(e) => Err(e),
            };

            match submitted {
                Ok(job_id) => job_ids.push(job_id),
                Err(e) if job_ids.is_empty() => return Err(e),
                Err(e) => return Err(self.scheduler().abort_open_jobs(&job_ids, e).await),
            }
        }

        Ok(job_ids)
    }

    /// Processes a single chunk: create job, upload data, close job.
    async fn process_chunk(&self, chunk: Chunk) -> Result<String, AppError> {
        let part_number = chunk.index + 1;
        let rows = chunk.rows;

        let mut req = CreateIngestJobRequest::new(self.object, self.operation);
        if let Some(field) = &self.external_id {
            req = req.with_external_id_field(field.clone());
        }

        let job_id = self.client.create_ingest_job(req).await?.id;

        if let Err(e) = self.upload_and_close(&job_id, chunk).await {
            warn!(
                "[BULK-ORCHESTRATOR] Part {} failed after creating job {}: {}",
                part_number,
                redact_id(&job_id),
                e
            );
            if let Err(abort_err) = self.client.abort_job(&job_id).await {
                warn!(
                    "[BULK-ORCHESTRATOR] Abort of job {} failed: {}",
                    redact_id(&job_id),
                    abort_err
                );
            }
            return Err(e);
        }

        info!(
            "[BULK-ORCHESTRATOR] Part {} ({} rows) submitted as job {}",
            part_number,
            rows,
            redact_id(&job_id)
        );

        Ok(job_id)
    }

    async fn upload_and_close(&self, job_id: &str, chunk: Chunk) -> Result<(), AppError> {
        self.client.upload_job_data(job_id, chunk.into_csv()).await?;
        self.client.close_job(job_id).await?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
