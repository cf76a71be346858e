//! Record encoding: turns structured records into header-prefixed CSV text.
//!
//! Records are ordered field maps. The first record fixes the header; every
//! other record must carry exactly the same field set (order may differ, values
//! are written in header order). Already tabular input passes through untouched.
//!
//! Readers and row iterators are consumed lazily: rows are pulled only as the
//! chunker asks for them, so a source larger than memory can be submitted.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Terminator, WriterBuilder};
use serde_json::Value;

use crate::error::AppError;

/// One record: field name → scalar value, in insertion order.
pub type Record = serde_json::Map<String, Value>;

/// Boxed row iterator handed to the chunker.
pub type RowIter = Box<dyn Iterator<Item = Result<StringRecord, AppError>> + Send>;

// ─────────────────────────────────────────────────────────────────────────────
// CsvHeader
// ─────────────────────────────────────────────────────────────────────────────

/// Column names of one operation.
///
/// Threaded explicitly through chunking, upload and result merging instead of
/// being re-inferred from each partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvHeader {
    columns: Vec<String>,
}

impl CsvHeader {
    /// Creates a header.
    ///
    /// # Errors
    ///
    /// `AppError::CsvChunkError` if there are no columns.
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Result<Self, AppError> {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        if columns.is_empty() {
            return Err(AppError::CsvChunkError("CSV has no header row".to_string()));
        }
        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// The header as a CSV record.
    pub fn to_record(&self) -> StringRecord {
        StringRecord::from(self.columns.clone())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// BulkData
// ─────────────────────────────────────────────────────────────────────────────

/// Input accepted by the bulk operations.
pub enum BulkData {
    /// Structured records, encoded to CSV before chunking.
    Records(Vec<Record>),
    /// CSV text with a header row. Passed through without re-encoding.
    Csv(String),
    /// CSV with a header row, read incrementally (e.g. from a file).
    Reader(Box<dyn Read + Send>),
    /// Pre-split tabular rows.
    Rows {
        header: Vec<String>,
        rows: Vec<Vec<String>>,
    },
    /// Header plus a lazy row source supplied by the caller.
    Iter { header: CsvHeader, rows: RowIter },
}

impl fmt::Debug for BulkData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BulkData::Records(records) => f.debug_tuple("Records").field(&records.len()).finish(),
            BulkData::Csv(text) => f.debug_tuple("Csv").field(&text.len()).finish(),
            BulkData::Reader(_) => f.write_str("Reader(..)"),
            BulkData::Rows { header, rows } => f
                .debug_struct("Rows")
                .field("header", header)
                .field("rows", &rows.len())
                .finish(),
            BulkData::Iter { header, .. } => f
                .debug_struct("Iter")
                .field("header", header)
                .finish_non_exhaustive(),
        }
    }
}

impl From<Vec<Record>> for BulkData {
    fn from(records: Vec<Record>) -> Self {
        BulkData::Records(records)
    }
}

impl From<String> for BulkData {
    fn from(csv: String) -> Self {
        BulkData::Csv(csv)
    }
}

impl From<&str> for BulkData {
    fn from(csv: &str) -> Self {
        BulkData::Csv(csv.to_string())
    }
}

impl BulkData {
    /// Wraps any CSV byte source. Nothing is read until chunking starts.
    pub fn from_reader(reader: impl Read + Send + 'static) -> Self {
        BulkData::Reader(Box::new(reader))
    }

    /// Opens a CSV file for streaming.
    ///
    /// # Errors
    ///
    /// `AppError::CsvChunkError` if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let file = File::open(path.as_ref())
            .map_err(|e| AppError::CsvChunkError(format!("Failed to open source file: {}", e)))?;
        Ok(Self::from_reader(BufReader::new(file)))
    }

    /// Resolves the input into its header and a lazy row iterator.
    ///
    /// Records go through [`encode_records`] first; CSV text and readers are
    /// parsed with a strict (non-flexible) reader so quoted commas and
    /// newlines survive. Only the header is read here.
    pub fn into_rows(self) -> Result<(CsvHeader, RowIter), AppError> {
        match self {
            BulkData::Records(records) => {
                let csv_text = encode_records(&records)?;
                csv_rows(Cursor::new(csv_text.into_bytes()))
            }
            BulkData::Csv(text) => csv_rows(Cursor::new(text.into_bytes())),
            BulkData::Reader(reader) => csv_rows(reader),
            BulkData::Iter { header, rows } => Ok((header, rows)),
            BulkData::Rows { header, rows } => {
                let header = CsvHeader::new(header)?;
                let iter = rows
                    .into_iter()
                    .map(|row| Ok::<_, AppError>(StringRecord::from(row)));
                Ok((header, Box::new(iter)))
            }
        }
    }
}

fn csv_rows<R>(source: R) -> Result<(CsvHeader, RowIter), AppError>
where
    R: Read + Send + 'static,
{
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(source);

    let headers = reader
        .headers()
        .map_err(|e| AppError::CsvChunkError(format!("Failed to read CSV headers: {}", e)))?
        .clone();

    if headers.is_empty() || (headers.len() == 1 && headers[0].is_empty()) {
        return Err(AppError::CsvChunkError("CSV has no header row".to_string()));
    }

    let header = CsvHeader::new(headers.iter())?;
    let rows = reader.into_records().map(|r| {
        r.map_err(|e| AppError::CsvChunkError(format!("Failed to read CSV record: {}", e)))
    });

    Ok((header, Box::new(rows)))
}

// ─────────────────────────────────────────────────────────────────────────────
// Encoding
// ─────────────────────────────────────────────────────────────────────────────

/// Encodes records as CSV text (LF terminators, minimal quoting).
///
/// # Errors
///
/// `AppError::SchemaError` when the sequence is empty, when a record's field
/// set differs from the first record's, or when a value is an array/object.
pub fn encode_records(records: &[Record]) -> Result<String, AppError> {
    let first = records
        .first()
        .ok_or_else(|| AppError::schema(None, "no records to encode"))?;

    let header: Vec<&str> = first.keys().map(String::as_str).collect();

    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::with_capacity(records.len() * 64));

    writer
        .write_record(&header)
        .map_err(|e| AppError::Internal(format!("Failed to write CSV header: {}", e)))?;

    let mut fields: Vec<String> = Vec::with_capacity(header.len());
    for (row, record) in records.iter().enumerate() {
        check_field_set(row, &header, record)?;

        fields.clear();
        for name in &header {
            let value = record.get(*name).unwrap_or(&Value::Null);
            fields.push(render_scalar(row, name, value)?);
        }

        writer
            .write_record(&fields)
            .map_err(|e| AppError::Internal(format!("Failed to write CSV record: {}", e)))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::Internal(format!("Failed to flush CSV writer: {}", e)))?;

    String::from_utf8(bytes).map_err(|e| AppError::Internal(format!("Encoded CSV is not UTF-8: {}", e)))
}

fn check_field_set(row: usize, header: &[&str], record: &Record) -> Result<(), AppError> {
    if let Some(missing) = header.iter().find(|name| !record.contains_key(**name)) {
        return Err(AppError::schema(
            Some(row),
            format!("missing field '{}'", missing),
        ));
    }

    if record.len() != header.len() {
        let extra = record
            .keys()
            .find(|key| !header.contains(&key.as_str()))
            .map(String::as_str)
            .unwrap_or("?");
        return Err(AppError::schema(
            Some(row),
            format!("unexpected field '{}'", extra),
        ));
    }

    Ok(())
}

fn render_scalar(row: usize, name: &str, value: &Value) -> Result<String, AppError> {
    match value {
        Value::Null => Ok(String::new()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::String(s) => Ok(s.clone()),
        Value::Array(_) | Value::Object(_) => Err(AppError::schema(
            Some(row),
            format!("field '{}' is not a scalar value", name),
        )),
    }
}
