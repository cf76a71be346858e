//! Result merging for bulk ingest jobs.
//!
//! A finished job exposes three result partitions (successful, failed,
//! unprocessed). This module fetches them and combines them into one CSV body
//! under a single canonical header.
//!
//! Key features:
//! - Record-aware splitting (quoted newlines never split a row)
//! - Rows are copied byte-for-byte from the partition text
//! - Header normalization with BOM stripping
//! - Header mismatches are logged, never fatal

use std::future::Future;
use std::pin::Pin;

use csv::{ByteRecord, ReaderBuilder, WriterBuilder};
use tracing::{debug, warn};

use crate::error::AppError;
use crate::salesforce::bulk_ingest_v2::{redact_id, BulkIngestV2Client};
use crate::salesforce::ResultPartition;
use crate::streaming::record_encoder::CsvHeader;

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// UTF-8 BOM as it appears at the start of a decoded string.
const UTF8_BOM: char = '\u{feff}';

/// Prefix for unprocessed rows: empty `sf__Id` and `sf__Error` columns.
const UNPROCESSED_PREFIX: &str = "\"\",\"\",";

/// Result columns the service puts in front of the input columns.
const RESULT_COLUMN_COUNT: usize = 2;

// ─────────────────────────────────────────────────────────────────────────────
// Public Types
// ─────────────────────────────────────────────────────────────────────────────

/// Raw text of a job's three result partitions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobResultPartitions {
    pub successful: String,
    pub failed: String,
    pub unprocessed: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Provider Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Trait for downloading job results from Salesforce.
///
/// Decouples the merger from the HTTP client so tests can serve fixtures.
pub trait JobResultProvider: Send + Sync {
    /// Downloads one result partition of a finished job as CSV text.
    fn get_results<'a>(
        &'a self,
        job_id: &'a str,
        partition: ResultPartition,
    ) -> Pin<Box<dyn Future<Output = Result<String, AppError>> + Send + 'a>>;
}

impl JobResultProvider for BulkIngestV2Client {
    fn get_results<'a>(
        &'a self,
        job_id: &'a str,
        partition: ResultPartition,
    ) -> Pin<Box<dyn Future<Output = Result<String, AppError>> + Send + 'a>> {
        Box::pin(BulkIngestV2Client::get_results(self, job_id, partition))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Public API
// ─────────────────────────────────────────────────────────────────────────────

/// Fetches the three partitions of a finished job.
///
/// # Errors
///
/// Any fetch failure is wrapped in `AppError::ResultFetch` naming the job and
/// the partition.
pub async fn fetch_partitions<P>(provider: &P, job_id: &str) -> Result<JobResultPartitions, AppError>
where
    P: JobResultProvider + ?Sized,
{
    let mut partitions = JobResultPartitions::default();

    for partition in ResultPartition::ALL {
        let body = provider
            .get_results(job_id, partition)
            .await
            .map_err(|source| AppError::ResultFetch {
                job_id: job_id.to_string(),
                partition,
                source: Box::new(source),
            })?;

        match partition {
            ResultPartition::Successful => partitions.successful = body,
            ResultPartition::Failed => partitions.failed = body,
            ResultPartition::Unprocessed => partitions.unprocessed = body,
        }
    }

    Ok(partitions)
}

/// Fetches and merges a finished job's results into one CSV body.
pub async fn fetch_and_merge<P>(
    provider: &P,
    job_id: &str,
    header: &CsvHeader,
) -> Result<String, AppError>
where
    P: JobResultProvider + ?Sized,
{
    let partitions = fetch_partitions(provider, job_id).await?;
    let merged = merge_job_results(header, &partitions);

    debug!(
        "[RESULT-MERGER] Merged results for job {} ({} bytes)",
        redact_id(job_id),
        merged.len()
    );

    Ok(merged)
}

/// Merges one job's partitions into a single CSV body.
///
/// The success header is canonical; when the success body is empty the failed
/// header is used, and when both are empty a header is synthesized from
/// `header`. Output is success rows, then failed rows, then unprocessed rows
/// prefixed with two empty columns, joined with `\n` and without a trailing
/// newline.
pub fn merge_job_results(header: &CsvHeader, partitions: &JobResultPartitions) -> String {
    let (success_header, success_rows) = split_records(&partitions.successful);
    let (failed_header, failed_rows) = split_records(&partitions.failed);
    let (unprocessed_header, unprocessed_rows) = split_records(&partitions.unprocessed);

    let canonical = match (success_header, failed_header) {
        (Some(h), _) | (None, Some(h)) => h.to_string(),
        (None, None) => synthesize_header(header),
    };

    check_header_consistency(&canonical, failed_header, unprocessed_header);

    let mut lines: Vec<String> =
        Vec::with_capacity(1 + success_rows.len() + failed_rows.len() + unprocessed_rows.len());
    lines.push(canonical);
    lines.extend(success_rows.iter().map(|row| row.to_string()));
    lines.extend(failed_rows.iter().map(|row| row.to_string()));
    lines.extend(
        unprocessed_rows
            .iter()
            .map(|row| format!("{}{}", UNPROCESSED_PREFIX, row)),
    );

    debug!(
        "[RESULT-MERGER] {} successful, {} failed, {} unprocessed rows",
        success_rows.len(),
        failed_rows.len(),
        unprocessed_rows.len()
    );

    lines.join("\n")
}

// ─────────────────────────────────────────────────────────────────────────────
// Private Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Splits partition text into its header line and raw data rows.
///
/// Record boundaries come from the CSV reader's byte positions, so each row is
/// an exact slice of the input (quoting and embedded newlines intact) minus
/// its line terminator.
fn split_records(text: &str) -> (Option<&str>, Vec<&str>) {
    let text = text.strip_prefix(UTF8_BOM).unwrap_or(text);

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut record = ByteRecord::new();
    let mut raw_records: Vec<&str> = Vec::new();
    let mut start = 0usize;

    loop {
        match reader.read_byte_record(&mut record) {
            Ok(true) => {
                let end = reader.position().byte() as usize;
                let raw = text
                    .get(start..end)
                    .unwrap_or_default()
                    .trim_matches(|c: char| c == '\r' || c == '\n');
                if !raw.is_empty() {
                    raw_records.push(raw);
                }
                start = end;
            }
            Ok(false) => break,
            Err(e) => {
                warn!(
                    "[RESULT-MERGER] CSV parse error, keeping remaining lines verbatim: {}",
                    e
                );
                raw_records.extend(
                    text.get(start..)
                        .unwrap_or_default()
                        .lines()
                        .filter(|line| !line.trim().is_empty()),
                );
                break;
            }
        }
    }

    let mut records = raw_records.into_iter();
    let header = records.next();
    (header, records.collect())
}

/// `"sf__Id","sf__Error",<input header>`
fn synthesize_header(header: &CsvHeader) -> String {
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());

    let input = match writer.write_record(header.columns()) {
        Ok(()) => writer
            .into_inner()
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .map(|line| line.trim_end_matches(['\r', '\n']).to_string()),
        Err(_) => None,
    }
    .unwrap_or_else(|| header.columns().join(","));

    format!("\"sf__Id\",\"sf__Error\",{}", input)
}

/// Logs a warning when the partitions disagree on the input columns.
fn check_header_consistency(canonical: &str, failed: Option<&str>, unprocessed: Option<&str>) {
    let canonical_columns = header_columns(canonical);
    let input_columns = canonical_columns
        .get(RESULT_COLUMN_COUNT..)
        .unwrap_or_default();

    if let Some(failed) = failed {
        let failed_columns = header_columns(failed);
        if failed_columns.get(RESULT_COLUMN_COUNT..).unwrap_or_default() != input_columns {
            warn!("[RESULT-MERGER] Failed results header does not match successful results header");
        }
    }

    if let Some(unprocessed) = unprocessed {
        if header_columns(unprocessed) != input_columns {
            warn!("[RESULT-MERGER] Unprocessed records header does not match result columns");
        }
    }
}

/// Parses a header line into unquoted column names.
fn header_columns(line: &str) -> Vec<String> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .from_reader(line.as_bytes());

    let mut record = csv::StringRecord::new();
    match reader.read_record(&mut record) {
        Ok(true) => record.iter().map(|c| c.trim().to_string()).collect(),
        _ => Vec::new(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
