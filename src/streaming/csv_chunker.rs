//! Record-aware CSV chunking that never corrupts records.
//!
//! Uses the `csv` crate to serialize each row, so embedded commas, quotes and
//! newlines inside quoted fields survive. Rows are grouped lazily into
//! header-prefixed chunks that stay under the upload size limit.

use csv::{StringRecord, Terminator, WriterBuilder};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::streaming::record_encoder::CsvHeader;

/// Hard upload limit of a single ingest job (100 MiB).
pub const MAX_UPLOAD_BYTES: u64 = 100 * 1024 * 1024;

/// Default headroom kept below `max_bytes`, in percent.
pub const DEFAULT_SAFETY_MARGIN_PCT: u8 = 2;

/// Batch size presets for Salesforce Bulk API operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchSize {
    /// 10 records per batch
    ExtraSmall,
    /// 200 records per batch
    Small,
    /// 2,000 records per batch
    Medium,
    /// 10,000 records per batch
    Large,
    /// Custom record count
    Custom(u32),
}

impl BatchSize {
    /// Returns the batch size as a u64.
    pub fn as_u64(self) -> u64 {
        match self {
            BatchSize::ExtraSmall => 10,
            BatchSize::Small => 200,
            BatchSize::Medium => 2_000,
            BatchSize::Large => 10_000,
            BatchSize::Custom(n) => n as u64,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ChunkConfig
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for CSV chunking.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ChunkConfig {
    /// Maximum bytes per chunk, header included (default: 100 MiB).
    pub max_bytes: u64,
    /// Maximum records per chunk (excluding header). Unlimited when `None`.
    pub max_records: Option<u64>,
    /// Percentage of `max_bytes` kept free as headroom (default: 2).
    pub safety_margin_pct: u8,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_bytes: MAX_UPLOAD_BYTES,
            max_records: None,
            safety_margin_pct: DEFAULT_SAFETY_MARGIN_PCT,
        }
    }
}

impl ChunkConfig {
    /// Creates a ChunkConfig with the given batch size.
    pub fn with_batch_size(batch_size: BatchSize) -> Self {
        Self::default().max_records(batch_size.as_u64())
    }

    /// Sets the max_bytes limit.
    pub fn max_bytes(mut self, bytes: u64) -> Self {
        self.max_bytes = bytes;
        self
    }

    /// Sets the max_records limit.
    pub fn max_records(mut self, records: u64) -> Self {
        self.max_records = Some(records);
        self
    }

    /// Sets the safety margin percentage.
    pub fn safety_margin_pct(mut self, pct: u8) -> Self {
        self.safety_margin_pct = pct;
        self
    }

    /// Byte budget actually used for chunking:
    /// `max_bytes - max_bytes * safety_margin_pct / 100`.
    pub fn effective_max_bytes(&self) -> u64 {
        let margin = self.max_bytes.saturating_mul(self.safety_margin_pct as u64) / 100;
        self.max_bytes.saturating_sub(margin)
    }

    /// Rejects limits that could never produce a valid chunk.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.max_bytes == 0 {
            return Err(AppError::ConfigurationError(
                "max_bytes must be greater than 0".to_string(),
            ));
        }
        if self.safety_margin_pct >= 100 {
            return Err(AppError::ConfigurationError(format!(
                "safety_margin_pct must be below 100, got {}",
                self.safety_margin_pct
            )));
        }
        if self.max_records == Some(0) {
            return Err(AppError::ConfigurationError(
                "max_records must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Chunk
// ─────────────────────────────────────────────────────────────────────────────

/// One upload unit: the header line followed by zero or more data rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Zero-based position in the chunk sequence.
    pub index: usize,
    /// Number of data rows (header excluded).
    pub rows: u64,
    csv: String,
}

impl Chunk {
    /// The chunk's CSV text.
    pub fn as_str(&self) -> &str {
        &self.csv
    }

    /// Size in bytes, header included.
    pub fn len_bytes(&self) -> usize {
        self.csv.len()
    }

    pub fn into_csv(self) -> String {
        self.csv
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// CsvChunker
// ─────────────────────────────────────────────────────────────────────────────

/// Lazy iterator of chunks over a row source.
///
/// Finite and non-restartable. Every chunk starts with the same header. A
/// source with no rows yields exactly one header-only chunk.
pub struct CsvChunker<I> {
    rows: I,
    header_bytes: Vec<u8>,
    width: usize,
    limit: u64,
    max_records: Option<u64>,
    /// Row that did not fit the previous chunk; it seeds the next one.
    carry: Option<Vec<u8>>,
    next_index: usize,
    row_number: u64,
    finished: bool,
}

/// Starts chunking `rows` under `header`.
///
/// # Errors
///
/// `AppError::CsvChunkError` if the header cannot be serialized.
pub fn chunk_rows<I>(header: &CsvHeader, rows: I, config: &ChunkConfig) -> Result<CsvChunker<I>, AppError>
where
    I: Iterator<Item = Result<StringRecord, AppError>>,
{
    let header_bytes = serialize_record(&header.to_record())?;
    let limit = config.effective_max_bytes();

    if header_bytes.len() as u64 > limit {
        warn!(
            "[CSV-CHUNKER] Header alone ({} bytes) exceeds the chunk limit ({} bytes)",
            header_bytes.len(),
            limit
        );
    }

    Ok(CsvChunker {
        rows,
        header_bytes,
        width: header.len(),
        limit,
        max_records: config.max_records,
        carry: None,
        next_index: 0,
        row_number: 0,
        finished: false,
    })
}

impl<I> CsvChunker<I>
where
    I: Iterator<Item = Result<StringRecord, AppError>>,
{
    /// Checks if adding a record would exceed the configured limits.
    fn would_exceed_limits(&self, current_bytes: u64, current_rows: u64, record_size: u64) -> bool {
        // The first record of a chunk is always accepted, so a single
        // oversized record still becomes its own chunk.
        if current_rows == 0 {
            return false;
        }

        if let Some(max_records) = self.max_records {
            if current_rows >= max_records {
                return true;
            }
        }

        current_bytes + record_size > self.limit
    }

    fn next_row(&mut self) -> Option<Result<Vec<u8>, AppError>> {
        let record = match self.rows.next()? {
            Ok(record) => record,
            Err(e) => return Some(Err(e)),
        };
        self.row_number += 1;

        if record.len() != self.width {
            return Some(Err(AppError::CsvChunkError(format!(
                "Row {} has {} fields, header has {}",
                self.row_number,
                record.len(),
                self.width
            ))));
        }

        Some(serialize_record(&record))
    }

    fn emit(&mut self, buf: Vec<u8>, rows: u64) -> Option<Result<Chunk, AppError>> {
        let index = self.next_index;
        self.next_index += 1;

        if buf.len() as u64 > self.limit {
            warn!(
                chunk_index = index,
                bytes = buf.len(),
                limit = self.limit,
                "[CSV-CHUNKER] Single record exceeds the chunk limit, uploading it alone"
            );
        }

        debug!(
            chunk_index = index,
            rows,
            bytes = buf.len(),
            "[CSV-CHUNKER] Completed chunk"
        );

        let csv = match String::from_utf8(buf) {
            Ok(csv) => csv,
            Err(e) => {
                self.finished = true;
                return Some(Err(AppError::CsvChunkError(format!(
                    "Chunk {} is not valid UTF-8: {}",
                    index, e
                ))));
            }
        };

        Some(Ok(Chunk { index, rows, csv }))
    }
}

impl<I> Iterator for CsvChunker<I>
where
    I: Iterator<Item = Result<StringRecord, AppError>>,
{
    type Item = Result<Chunk, AppError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let mut buf = self.header_bytes.clone();
        let mut rows: u64 = 0;

        if let Some(carried) = self.carry.take() {
            buf.extend_from_slice(&carried);
            rows = 1;
        }

        loop {
            match self.next_row() {
                None => {
                    self.finished = true;
                    break;
                }
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(e));
                }
                Some(Ok(row)) => {
                    if self.would_exceed_limits(buf.len() as u64, rows, row.len() as u64) {
                        self.carry = Some(row);
                        break;
                    }
                    buf.extend_from_slice(&row);
                    rows += 1;
                }
            }
        }

        // Only the very first chunk may be header-only.
        if rows == 0 && self.next_index > 0 {
            return None;
        }

        self.emit(buf, rows)
    }
}

/// Serializes a record using LF terminator and minimal quoting.
fn serialize_record(record: &StringRecord) -> Result<Vec<u8>, AppError> {
    let mut buf = Vec::with_capacity(record.as_slice().len() + record.len() + 1);
    {
        let mut writer = WriterBuilder::new()
            .has_headers(false)
            .terminator(Terminator::Any(b'\n'))
            .from_writer(&mut buf);

        writer
            .write_record(record)
            .map_err(|e| AppError::CsvChunkError(format!("Failed to serialize record: {}", e)))?;

        writer
            .flush()
            .map_err(|e| AppError::CsvChunkError(format!("Failed to flush writer: {}", e)))?;
    }
    Ok(buf)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streaming::record_encoder::BulkData;

    fn chunks_of(csv: &str, config: ChunkConfig) -> Vec<Chunk> {
        let (header, rows) = BulkData::Csv(csv.to_string()).into_rows().unwrap();
        chunk_rows(&header, rows, &config)
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    fn rows_of(chunk: &Chunk) -> Vec<&str> {
        chunk.as_str().lines().skip(1).collect()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Limits
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_split_by_record_count() {
        let csv = "Id,Name\n1,A\n2,B\n3,C\n4,D\n5,E\n";
        let chunks = chunks_of(csv, ChunkConfig::default().max_records(2));

        assert_eq!(chunks.len(), 3);
        assert_eq!(
            chunks.iter().map(|c| c.rows).collect::<Vec<_>>(),
            vec![2, 2, 1]
        );
        assert_eq!(chunks[0].as_str(), "Id,Name\n1,A\n2,B\n");
        assert_eq!(chunks[2].as_str(), "Id,Name\n5,E\n");
        assert_eq!(
            chunks.iter().map(|c| c.index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn test_split_by_bytes_never_exceeds_limit() {
        // Header "Id,Payload\n" = 11 bytes; each row "n,<40 x>\n" = 43 bytes.
        let payload = "x".repeat(40);
        let mut csv = String::from("Id,Payload\n");
        for i in 0..5 {
            csv.push_str(&format!("{},{}\n", i, payload));
        }

        let config = ChunkConfig::default().max_bytes(100).safety_margin_pct(0);
        let chunks = chunks_of(&csv, config);

        // 11 + 43 + 43 = 97 fits, a third row would make 140.
        assert_eq!(
            chunks.iter().map(|c| c.rows).collect::<Vec<_>>(),
            vec![2, 2, 1]
        );
        for chunk in &chunks {
            assert!(chunk.len_bytes() <= 100);
            assert!(chunk.as_str().starts_with("Id,Payload\n"));
        }
    }

    #[test]
    fn test_safety_margin_shrinks_limit() {
        let config = ChunkConfig::default().max_bytes(1000).safety_margin_pct(10);
        assert_eq!(config.effective_max_bytes(), 900);

        assert_eq!(
            ChunkConfig::default().effective_max_bytes(),
            MAX_UPLOAD_BYTES - MAX_UPLOAD_BYTES * 2 / 100
        );
    }

    #[test]
    fn test_oversized_record_gets_its_own_chunk() {
        let big = "y".repeat(200);
        let csv = format!("Id,Payload\n1,a\n2,{}\n3,b\n", big);

        let config = ChunkConfig::default().max_bytes(50).safety_margin_pct(0);
        let chunks = chunks_of(&csv, config);

        assert_eq!(chunks.len(), 3);
        assert_eq!(rows_of(&chunks[0]), vec!["1,a"]);
        assert_eq!(chunks[1].rows, 1);
        assert!(chunks[1].len_bytes() > 50);
        assert_eq!(rows_of(&chunks[2]), vec!["3,b"]);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Record Integrity
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_quoted_fields_survive_chunking() {
        let csv = "Id,Notes\n1,\"Hello, World\"\n2,\"Line1\nLine2\"\n3,\"He said \"\"hi\"\"\"\n";
        let chunks = chunks_of(csv, ChunkConfig::default().max_records(1));

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].as_str(), "Id,Notes\n1,\"Hello, World\"\n");
        assert_eq!(chunks[1].as_str(), "Id,Notes\n2,\"Line1\nLine2\"\n");
        assert_eq!(chunks[2].as_str(), "Id,Notes\n3,\"He said \"\"hi\"\"\"\n");
    }

    #[test]
    fn test_concatenation_reproduces_rows_in_order() {
        let mut csv = String::from("Id,Name\n");
        for i in 0..57 {
            csv.push_str(&format!("{},Name {}\n", i, i));
        }

        let chunks = chunks_of(&csv, ChunkConfig::with_batch_size(BatchSize::ExtraSmall));
        assert_eq!(chunks.len(), 6);

        let rebuilt: String = std::iter::once("Id,Name\n".to_string())
            .chain(
                chunks
                    .iter()
                    .map(|c| c.as_str().strip_prefix("Id,Name\n").unwrap().to_string()),
            )
            .collect();
        assert_eq!(rebuilt, csv);
    }

    #[test]
    fn test_crlf_input_is_rewritten_with_lf() {
        let chunks = chunks_of("Id,Name\r\n1,A\r\n", ChunkConfig::default());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].as_str(), "Id,Name\n1,A\n");
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Edge Cases
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_zero_rows_yields_one_header_only_chunk() {
        let chunks = chunks_of("Id,Name\n", ChunkConfig::default());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].as_str(), "Id,Name\n");
        assert_eq!(chunks[0].rows, 0);
    }

    #[test]
    fn test_exact_fit_does_not_emit_trailing_empty_chunk() {
        let chunks = chunks_of("Id\n1\n2\n", ChunkConfig::default().max_records(2));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].rows, 2);
    }

    #[test]
    fn test_ragged_row_is_an_error() {
        let header = CsvHeader::new(["Id", "Name"]).unwrap();
        let rows = vec![
            Ok(StringRecord::from(vec!["1", "A"])),
            Ok(StringRecord::from(vec!["2"])),
        ];

        let mut chunker = chunk_rows(&header, rows.into_iter(), &ChunkConfig::default()).unwrap();

        match chunker.next() {
            Some(Err(AppError::CsvChunkError(msg))) => assert!(msg.contains("Row 2")),
            other => panic!("Expected CsvChunkError, got {:?}", other),
        }
        assert!(chunker.next().is_none());
    }

    #[test]
    fn test_chunker_is_lazy() {
        let header = CsvHeader::new(["Id"]).unwrap();
        let pulled = std::cell::Cell::new(0u32);
        let rows = (0..1_000).map(|i| {
            pulled.set(pulled.get() + 1);
            Ok(StringRecord::from(vec![i.to_string()]))
        });

        let mut chunker = chunk_rows(&header, rows, &ChunkConfig::default().max_records(10)).unwrap();
        let first = chunker.next().unwrap().unwrap();

        assert_eq!(first.rows, 10);
        // Ten rows plus the one carried into the next chunk.
        assert_eq!(pulled.get(), 11);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Config
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_batch_size_values() {
        assert_eq!(BatchSize::ExtraSmall.as_u64(), 10);
        assert_eq!(BatchSize::Small.as_u64(), 200);
        assert_eq!(BatchSize::Medium.as_u64(), 2_000);
        assert_eq!(BatchSize::Large.as_u64(), 10_000);
        assert_eq!(BatchSize::Custom(500).as_u64(), 500);
    }

    #[test]
    fn test_validate_rejects_bad_limits() {
        assert!(ChunkConfig::default().validate().is_ok());
        assert!(ChunkConfig::default().max_bytes(0).validate().is_err());
        assert!(ChunkConfig::default().safety_margin_pct(100).validate().is_err());
        assert!(ChunkConfig::default().max_records(0).validate().is_err());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: ChunkConfig = serde_json::from_str(r#"{"max_records": 200}"#).unwrap();
        assert_eq!(config.max_records, Some(200));
        assert_eq!(config.max_bytes, MAX_UPLOAD_BYTES);
        assert_eq!(config.safety_margin_pct, DEFAULT_SAFETY_MARGIN_PCT);
    }
}
