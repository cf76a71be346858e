//! Client seam for the bulk facade.

use std::future::Future;
use std::pin::Pin;

use crate::error::AppError;
use crate::salesforce::{
    BulkIngestJobInfo, BulkIngestV2Client, CreateIngestJobRequest, JobStatusProvider,
};
use crate::streaming::JobResultProvider;

/// Every job call one bulk operation makes, allowing test fakes.
///
/// Status and result calls come from the scheduler and merger traits; this adds
/// the submission half of the lifecycle.
pub trait IngestClientOps: JobStatusProvider + JobResultProvider {
    /// Creates a new ingest job.
    fn create_ingest_job(
        &self,
        req: CreateIngestJobRequest,
    ) -> Pin<Box<dyn Future<Output = Result<BulkIngestJobInfo, AppError>> + Send + '_>>;

    /// Uploads the job's single CSV batch.
    fn upload_job_data<'a>(
        &'a self,
        job_id: &'a str,
        csv: String,
    ) -> Pin<Box<dyn Future<Output = Result<(), AppError>> + Send + 'a>>;

    /// Marks the upload complete so the service starts processing.
    fn close_job<'a>(
        &'a self,
        job_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<BulkIngestJobInfo, AppError>> + Send + 'a>>;
}

impl IngestClientOps for BulkIngestV2Client {
    fn create_ingest_job(
        &self,
        req: CreateIngestJobRequest,
    ) -> Pin<Box<dyn Future<Output = Result<BulkIngestJobInfo, AppError>> + Send + '_>> {
        Box::pin(BulkIngestV2Client::create_ingest_job(self, req))
    }

    fn upload_job_data<'a>(
        &'a self,
        job_id: &'a str,
        csv: String,
    ) -> Pin<Box<dyn Future<Output = Result<(), AppError>> + Send + 'a>> {
        Box::pin(BulkIngestV2Client::upload_job_data(self, job_id, csv))
    }

    fn close_job<'a>(
        &'a self,
        job_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<BulkIngestJobInfo, AppError>> + Send + 'a>> {
        Box::pin(BulkIngestV2Client::close_job(self, job_id))
    }
}
