//! Salesforce Bulk API v2 ingest client.
//!
//! This module drives a single ingest job through its lifecycle:
//! - Create the job (insert, update, upsert, delete)
//! - Upload one CSV chunk as the job's data
//! - Close (or abort) the job
//! - Poll job status
//! - Download the successful, failed and unprocessed result partitions
//!
//! # Security
//!
//! - Raw CSV contents are never logged
//! - Auth headers and tokens are never logged
//! - Only HTTP method, path, and status codes are logged

use std::sync::Arc;

use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::error::AppError;
use crate::salesforce::client::{sanitize_url_for_logs, SessionCredentials};
use crate::salesforce::{BulkJobState, ResultPartition};

// ─────────────────────────────────────────────────────────────────────────────
// Public Types
// ─────────────────────────────────────────────────────────────────────────────

/// Bulk ingest operation type.
///
/// Serialized lowercase ("insert", "update", "upsert", "delete"), which is
/// what the job creation endpoint expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkOperation {
    /// Insert new records.
    Insert,
    /// Update existing records by ID.
    Update,
    /// Insert or update records based on external ID field.
    Upsert,
    /// Delete records by ID.
    Delete,
}

impl BulkOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            BulkOperation::Insert => "insert",
            BulkOperation::Update => "update",
            BulkOperation::Upsert => "upsert",
            BulkOperation::Delete => "delete",
        }
    }
}

impl std::fmt::Display for BulkOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request body for creating an ingest job.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIngestJobRequest {
    /// The Salesforce object name (e.g., "Account", "Contact").
    pub object: String,
    /// The operation to perform.
    pub operation: BulkOperation,
    /// External ID field name (upsert only).
    /// Skipped when None: the service rejects a null value here.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id_field_name: Option<String>,
}

impl CreateIngestJobRequest {
    pub fn new(object: impl Into<String>, operation: BulkOperation) -> Self {
        Self {
            object: object.into(),
            operation,
            external_id_field_name: None,
        }
    }

    pub fn with_external_id_field(mut self, field: impl Into<String>) -> Self {
        self.external_id_field_name = Some(field.into());
        self
    }
}

/// Information about a Bulk API v2 ingest job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkIngestJobInfo {
    /// Unique identifier for the job.
    pub id: String,
    /// Current state of the job.
    pub state: BulkJobState,
    /// The Salesforce object being processed.
    #[serde(default)]
    pub object: String,
    /// The operation being performed.
    #[serde(default)]
    pub operation: Option<BulkOperation>,
    /// Number of records processed so far.
    #[serde(default, rename = "numberRecordsProcessed")]
    pub processed_records: Option<u64>,
    /// Number of records that failed processing.
    #[serde(default, rename = "numberRecordsFailed")]
    pub failed_records: Option<u64>,
    /// Error message if job failed.
    #[serde(default)]
    pub error_message: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Internal Wire Types
// ─────────────────────────────────────────────────────────────────────────────

/// Request body for changing job state (close or abort).
#[derive(Debug, Serialize)]
struct UpdateJobStateRequest {
    state: &'static str,
}

// ─────────────────────────────────────────────────────────────────────────────
// BulkIngestV2Client
// ─────────────────────────────────────────────────────────────────────────────

/// Client for Salesforce Bulk API v2 ingest operations.
///
/// Every non-2xx response becomes the matching `AppError` kind carrying the
/// request path, status, resource name and parsed body.
#[derive(Clone)]
pub struct BulkIngestV2Client {
    /// Shared HTTP client.
    client: Arc<Client>,
    /// Session used for every request.
    credentials: SessionCredentials,
    /// `{instance}/services/data/{version}/jobs/ingest/`
    ingest_url: Url,
}

impl BulkIngestV2Client {
    /// Creates a new Bulk API v2 ingest client.
    ///
    /// # Errors
    ///
    /// `AppError::Internal` if the ingest URL cannot be derived from the
    /// instance URL.
    pub fn new(client: Arc<Client>, credentials: SessionCredentials) -> Result<Self, AppError> {
        let ingest_url = credentials.ingest_base_url()?;
        Ok(Self {
            client,
            credentials,
            ingest_url,
        })
    }

    /// Creates a new bulk ingest job (`POST <base>`).
    ///
    /// The body always carries `contentType: "CSV"` and `lineEnding: "LF"`,
    /// matching how chunks are written.
    ///
    /// # Errors
    ///
    /// - Remote error kinds for non-2xx responses
    /// - `AppError::ConnectionFailed` - Network error
    pub async fn create_ingest_job(
        &self,
        req: CreateIngestJobRequest,
    ) -> Result<BulkIngestJobInfo, AppError> {
        let url = self.ingest_url.clone();

        let mut body = serde_json::to_value(&req).map_err(|e| {
            AppError::Internal(format!("Failed to serialize job request: {}", e))
        })?;
        body.as_object_mut()
            .ok_or_else(|| AppError::Internal("Expected object in JSON".to_string()))?
            .extend([
                ("contentType".to_string(), serde_json::json!("CSV")),
                ("lineEnding".to_string(), serde_json::json!("LF")),
            ]);

        info!(
            "[BULK-INGEST] POST /jobs/ingest (creating {} job for {})",
            req.operation, req.object
        );

        let response = self
            .send(self.client.post(url.clone()).json(&body))
            .await
            .map_err(|e| AppError::ConnectionFailed(format!("Ingest job creation failed: {}", e)))?;

        info!("[BULK-INGEST] POST /jobs/ingest -> {}", response.status().as_u16());

        let response = self.check_response(response, &url, "ingest job").await?;

        let job_info: BulkIngestJobInfo = response.json().await.map_err(|e| {
            AppError::Internal(format!("Failed to parse job creation response: {}", e))
        })?;

        debug!(
            "[BULK-INGEST] Created job {} in state {:?}",
            redact_id(&job_info.id),
            job_info.state
        );

        Ok(job_info)
    }

    /// Uploads one CSV chunk as the job's data (`PUT <base>/{id}/batches/`).
    ///
    /// # Errors
    ///
    /// - Remote error kinds for non-2xx responses
    /// - `AppError::ConnectionFailed` - Network error
    pub async fn upload_job_data(&self, job_id: &str, csv: String) -> Result<(), AppError> {
        let url = self.job_url(job_id, Some("batches/"))?;
        let size = csv.len();

        info!(
            "[BULK-INGEST] PUT /jobs/ingest/{}/batches ({} bytes)",
            redact_id(job_id),
            size
        );

        let response = self
            .send(
                self.client
                    .put(url.clone())
                    .header(reqwest::header::CONTENT_TYPE, "text/csv")
                    .body(csv),
            )
            .await
            .map_err(|e| AppError::ConnectionFailed(format!("CSV upload failed: {}", e)))?;

        info!(
            "[BULK-INGEST] PUT /jobs/ingest/{}/batches -> {}",
            redact_id(job_id),
            response.status().as_u16()
        );

        self.check_response(response, &url, "batch").await?;
        Ok(())
    }

    /// Marks the job upload complete so Salesforce starts processing.
    ///
    /// # Errors
    ///
    /// - Remote error kinds for non-2xx responses
    /// - `AppError::ConnectionFailed` - Network error
    pub async fn close_job(&self, job_id: &str) -> Result<BulkIngestJobInfo, AppError> {
        let response = self
            .set_job_state(job_id, "UploadComplete", "closing")
            .await?;

        response.json().await.map_err(|e| {
            AppError::Internal(format!("Failed to parse job close response: {}", e))
        })
    }

    /// Aborts a bulk ingest job.
    ///
    /// Callers treat this as best-effort: the job may already be terminal.
    pub async fn abort_job(&self, job_id: &str) -> Result<(), AppError> {
        self.set_job_state(job_id, "Aborted", "aborting").await?;
        Ok(())
    }

    /// Gets the current status of a bulk ingest job.
    ///
    /// A `Failed` job is a successful status read here; deciding what a
    /// failed job means is up to the caller.
    ///
    /// # Errors
    ///
    /// - `AppError::ResourceNotFound` - Job not found
    /// - Other remote error kinds for non-2xx responses
    /// - `AppError::ConnectionFailed` - Network error
    pub async fn get_job_status(&self, job_id: &str) -> Result<BulkIngestJobInfo, AppError> {
        let url = self.job_url(job_id, None)?;

        debug!(
            "[BULK-INGEST] GET /jobs/ingest/{} (status)",
            redact_id(job_id)
        );

        let response = self
            .send(self.client.get(url.clone()))
            .await
            .map_err(|e| AppError::ConnectionFailed(format!("Job status check failed: {}", e)))?;

        debug!(
            "[BULK-INGEST] GET /jobs/ingest/{} -> {}",
            redact_id(job_id),
            response.status().as_u16()
        );

        let response = self.check_response(response, &url, "ingest job").await?;

        response.json().await.map_err(|e| {
            AppError::Internal(format!("Failed to parse job status response: {}", e))
        })
    }

    /// Downloads one result partition of a finished job as CSV text.
    ///
    /// # Errors
    ///
    /// - Remote error kinds for non-2xx responses
    /// - `AppError::ConnectionFailed` - Network error
    pub async fn get_results(
        &self,
        job_id: &str,
        partition: ResultPartition,
    ) -> Result<String, AppError> {
        let segment = format!("{}/", partition.path_segment());
        let url = self.job_url(job_id, Some(&segment))?;

        info!(
            "[BULK-INGEST] GET /jobs/ingest/{}/{} (downloading)",
            redact_id(job_id),
            partition
        );

        let response = self
            .send(self.client.get(url.clone()))
            .await
            .map_err(|e| {
                AppError::ConnectionFailed(format!("{} download failed: {}", partition, e))
            })?;

        info!(
            "[BULK-INGEST] GET /jobs/ingest/{}/{} -> {}",
            redact_id(job_id),
            partition,
            response.status().as_u16()
        );

        let response = self
            .check_response(response, &url, partition.path_segment())
            .await?;

        response.text().await.map_err(|e| {
            AppError::ConnectionFailed(format!("Failed to read {} body: {}", partition, e))
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Private Helpers
    // ─────────────────────────────────────────────────────────────────────────

    async fn set_job_state(
        &self,
        job_id: &str,
        state: &'static str,
        action: &str,
    ) -> Result<Response, AppError> {
        let url = self.job_url(job_id, None)?;
        let request_body = UpdateJobStateRequest { state };

        info!(
            "[BULK-INGEST] PATCH /jobs/ingest/{} ({})",
            redact_id(job_id),
            action
        );

        let response = self
            .send(self.client.patch(url.clone()).json(&request_body))
            .await
            .map_err(|e| AppError::ConnectionFailed(format!("Job {} failed: {}", action, e)))?;

        info!(
            "[BULK-INGEST] PATCH /jobs/ingest/{} -> {}",
            redact_id(job_id),
            response.status().as_u16()
        );

        self.check_response(response, &url, "ingest job").await
    }

    /// Attaches auth and accept headers and sends the request.
    async fn send(&self, request: RequestBuilder) -> Result<Response, reqwest::Error> {
        request
            .bearer_auth(self.credentials.bearer_token())
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
    }

    /// Passes 2xx responses through; maps everything else to an `AppError`.
    async fn check_response(
        &self,
        response: Response,
        url: &Url,
        resource_name: &str,
    ) -> Result<Response, AppError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("Unable to read error body"));

        Err(AppError::from_status(
            sanitize_url_for_logs(url),
            status.as_u16(),
            resource_name,
            body,
        ))
    }

    /// Builds `<base>{job_id}` or `<base>{job_id}/{suffix}`.
    fn job_url(&self, job_id: &str, suffix: Option<&str>) -> Result<Url, AppError> {
        let relative = match suffix {
            Some(suffix) => format!("{}/{}", job_id, suffix),
            None => job_id.to_string(),
        };
        self.ingest_url.join(&relative).map_err(|e| {
            AppError::Internal(format!("Failed to build job URL: {}", e))
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helper Functions
// ─────────────────────────────────────────────────────────────────────────────

/// Redacts a job ID for logging (shows first 8 chars).
pub(crate) fn redact_id(id: &str) -> String {
    match id.char_indices().nth(8) {
        Some((cut, _)) => format!("{}...", &id[..cut]),
        None => id.to_string(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::salesforce::API_VERSION;
    use wiremock::matchers::{body_json, body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const JOB_ID: &str = "750xx000000001ABC";

    /// Helper to create a test client pointing to mock server.
    fn create_test_client(mock_url: &str) -> BulkIngestV2Client {
        let creds = SessionCredentials::new(mock_url, "test_token").unwrap();
        BulkIngestV2Client::new(Arc::new(Client::new()), creds).unwrap()
    }

    fn ingest_path(suffix: &str) -> String {
        format!("/services/data/{}/jobs/ingest/{}", API_VERSION, suffix)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Create Job Tests
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_create_ingest_job_success() {
        let mock_server = MockServer::start().await;
        let client = create_test_client(&mock_server.uri());

        let response_body = serde_json::json!({
            "id": JOB_ID,
            "state": "Open",
            "object": "Account",
            "operation": "insert",
            "numberRecordsProcessed": 0,
            "numberRecordsFailed": 0
        });

        Mock::given(method("POST"))
            .and(path(ingest_path("")))
            .and(header("Authorization", "Bearer test_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&response_body))
            .expect(1)
            .mount(&mock_server)
            .await;

        let info = client
            .create_ingest_job(CreateIngestJobRequest::new("Account", BulkOperation::Insert))
            .await
            .unwrap();

        assert_eq!(info.id, JOB_ID);
        assert_eq!(info.state, BulkJobState::Open);
        assert_eq!(info.operation, Some(BulkOperation::Insert));
    }

    #[tokio::test]
    async fn test_create_job_body_without_external_id() {
        let mock_server = MockServer::start().await;
        let client = create_test_client(&mock_server.uri());

        let expected_request = serde_json::json!({
            "object": "Contact",
            "operation": "insert",
            "contentType": "CSV",
            "lineEnding": "LF"
        });

        Mock::given(method("POST"))
            .and(path(ingest_path("")))
            .and(body_json(&expected_request))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"id": JOB_ID, "state": "Open"})),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let result = client
            .create_ingest_job(CreateIngestJobRequest::new("Contact", BulkOperation::Insert))
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_create_upsert_job_includes_external_id() {
        let mock_server = MockServer::start().await;
        let client = create_test_client(&mock_server.uri());

        let expected_request = serde_json::json!({
            "object": "Contact",
            "operation": "upsert",
            "externalIdFieldName": "Ext_Id__c",
            "contentType": "CSV",
            "lineEnding": "LF"
        });

        Mock::given(method("POST"))
            .and(path(ingest_path("")))
            .and(body_json(&expected_request))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"id": JOB_ID, "state": "Open"})),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let req = CreateIngestJobRequest::new("Contact", BulkOperation::Upsert)
            .with_external_id_field("Ext_Id__c");

        assert!(client.create_ingest_job(req).await.is_ok());
    }

    #[tokio::test]
    async fn test_create_job_400_is_malformed_request() {
        let mock_server = MockServer::start().await;
        let client = create_test_client(&mock_server.uri());

        let error_body = serde_json::json!([{
            "errorCode": "INVALIDJOB",
            "message": "Unable to find object: Nope__c"
        }]);

        Mock::given(method("POST"))
            .and(path(ingest_path("")))
            .respond_with(ResponseTemplate::new(400).set_body_json(&error_body))
            .mount(&mock_server)
            .await;

        let err = client
            .create_ingest_job(CreateIngestJobRequest::new("Nope__c", BulkOperation::Insert))
            .await
            .unwrap_err();

        match &err {
            AppError::MalformedRequest(remote) => {
                assert_eq!(remote.status, 400);
                assert_eq!(remote.resource_name, "ingest job");
                assert_eq!(remote.url, ingest_path(""));
            }
            e => panic!("Expected MalformedRequest, got: {:?}", e),
        }
        assert!(err.to_string().contains("INVALIDJOB"));
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Upload / Close / Abort Tests
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_upload_job_data_success() {
        let mock_server = MockServer::start().await;
        let client = create_test_client(&mock_server.uri());

        let csv = "Name,Industry\nAcme,Tech\n".to_string();

        Mock::given(method("PUT"))
            .and(path(ingest_path(&format!("{}/batches/", JOB_ID))))
            .and(header("Content-Type", "text/csv"))
            .and(body_string(csv.clone()))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&mock_server)
            .await;

        assert!(client.upload_job_data(JOB_ID, csv).await.is_ok());
    }

    #[tokio::test]
    async fn test_upload_401_is_expired_session() {
        let mock_server = MockServer::start().await;
        let client = create_test_client(&mock_server.uri());

        Mock::given(method("PUT"))
            .and(path(ingest_path(&format!("{}/batches/", JOB_ID))))
            .respond_with(ResponseTemplate::new(401).set_body_string("Session expired"))
            .mount(&mock_server)
            .await;

        let err = client
            .upload_job_data(JOB_ID, "Id\n1\n".to_string())
            .await
            .unwrap_err();

        match err {
            AppError::ExpiredSession(remote) => assert_eq!(remote.resource_name, "batch"),
            e => panic!("Expected ExpiredSession, got: {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_close_job_success() {
        let mock_server = MockServer::start().await;
        let client = create_test_client(&mock_server.uri());

        Mock::given(method("PATCH"))
            .and(path(ingest_path(JOB_ID)))
            .and(body_json(serde_json::json!({"state": "UploadComplete"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"id": JOB_ID, "state": "UploadComplete"})),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let info = client.close_job(JOB_ID).await.unwrap();
        assert_eq!(info.state, BulkJobState::UploadComplete);
    }

    #[tokio::test]
    async fn test_abort_job_success() {
        let mock_server = MockServer::start().await;
        let client = create_test_client(&mock_server.uri());

        Mock::given(method("PATCH"))
            .and(path(ingest_path(JOB_ID)))
            .and(body_json(serde_json::json!({"state": "Aborted"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"id": JOB_ID, "state": "Aborted"})),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        assert!(client.abort_job(JOB_ID).await.is_ok());
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Status Tests
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_get_job_status_job_complete() {
        let mock_server = MockServer::start().await;
        let client = create_test_client(&mock_server.uri());

        let response_body = serde_json::json!({
            "id": JOB_ID,
            "state": "JobComplete",
            "object": "Account",
            "operation": "insert",
            "numberRecordsProcessed": 1000,
            "numberRecordsFailed": 5
        });

        Mock::given(method("GET"))
            .and(path(ingest_path(JOB_ID)))
            .respond_with(ResponseTemplate::new(200).set_body_json(&response_body))
            .mount(&mock_server)
            .await;

        let info = client.get_job_status(JOB_ID).await.unwrap();
        assert_eq!(info.state, BulkJobState::JobComplete);
        assert_eq!(info.processed_records, Some(1000));
        assert_eq!(info.failed_records, Some(5));
    }

    #[tokio::test]
    async fn test_get_job_status_failed_is_not_an_error() {
        let mock_server = MockServer::start().await;
        let client = create_test_client(&mock_server.uri());

        let response_body = serde_json::json!({
            "id": JOB_ID,
            "state": "Failed",
            "errorMessage": "InvalidBatch : LineEnding is invalid on user data"
        });

        Mock::given(method("GET"))
            .and(path(ingest_path(JOB_ID)))
            .respond_with(ResponseTemplate::new(200).set_body_json(&response_body))
            .mount(&mock_server)
            .await;

        let info = client.get_job_status(JOB_ID).await.unwrap();
        assert_eq!(info.state, BulkJobState::Failed);
        assert!(info.error_message.unwrap().contains("LineEnding"));
    }

    #[tokio::test]
    async fn test_get_job_status_not_found() {
        let mock_server = MockServer::start().await;
        let client = create_test_client(&mock_server.uri());

        Mock::given(method("GET"))
            .and(path(ingest_path(JOB_ID)))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let err = client.get_job_status(JOB_ID).await.unwrap_err();
        assert!(matches!(err, AppError::ResourceNotFound(_)));
        assert_eq!(err.status(), Some(404));
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Result Tests
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_get_results_per_partition() {
        let mock_server = MockServer::start().await;
        let client = create_test_client(&mock_server.uri());

        let bodies = [
            (ResultPartition::Successful, "\"sf__Id\",\"sf__Created\",Name\n001,true,Acme\n"),
            (ResultPartition::Failed, "\"sf__Id\",\"sf__Error\",Name\n,REQUIRED_FIELD_MISSING,\n"),
            (ResultPartition::Unprocessed, "Name\nLeftover\n"),
        ];

        for (partition, body) in bodies {
            Mock::given(method("GET"))
                .and(path(ingest_path(&format!(
                    "{}/{}/",
                    JOB_ID,
                    partition.path_segment()
                ))))
                .respond_with(ResponseTemplate::new(200).set_body_string(body))
                .expect(1)
                .mount(&mock_server)
                .await;
        }

        for (partition, body) in bodies {
            let text = client.get_results(JOB_ID, partition).await.unwrap();
            assert_eq!(text, body);
        }
    }

    #[tokio::test]
    async fn test_error_url_never_contains_host() {
        let mock_server = MockServer::start().await;
        let client = create_test_client(&mock_server.uri());

        Mock::given(method("GET"))
            .and(path(ingest_path(&format!("{}/failedResults/", JOB_ID))))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&mock_server)
            .await;

        let err = client
            .get_results(JOB_ID, ResultPartition::Failed)
            .await
            .unwrap_err();

        let remote = err.remote().unwrap();
        assert!(matches!(err, AppError::GeneralRemoteError(_)));
        assert!(!remote.url.contains("127.0.0.1"));
        assert!(remote.url.ends_with("/failedResults/"));
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Serialization Tests
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_bulk_operation_serializes_lowercase() {
        let cases = [
            (BulkOperation::Insert, "\"insert\""),
            (BulkOperation::Update, "\"update\""),
            (BulkOperation::Upsert, "\"upsert\""),
            (BulkOperation::Delete, "\"delete\""),
        ];

        for (op, expected) in cases {
            assert_eq!(serde_json::to_string(&op).unwrap(), expected);
            assert_eq!(format!("\"{}\"", op.as_str()), expected);
        }
    }

    #[test]
    fn test_redact_id_long() {
        assert_eq!(redact_id("750xx000000001ABC"), "750xx000...");
    }

    #[test]
    fn test_redact_id_short() {
        assert_eq!(redact_id("750xx"), "750xx");
    }
}
