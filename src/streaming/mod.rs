//! CSV handling for bulk ingest.
//!
//! This module turns caller input into record-aware, size-bounded CSV chunks
//! (fields with embedded commas and newlines inside quotes stay intact) and
//! folds each finished job's result partitions back into one CSV body.

mod csv_chunker;
mod record_encoder;
mod result_merger;

pub use csv_chunker::{
    chunk_rows, BatchSize, Chunk, ChunkConfig, CsvChunker, DEFAULT_SAFETY_MARGIN_PCT,
    MAX_UPLOAD_BYTES,
};
pub use record_encoder::{encode_records, BulkData, CsvHeader, Record, RowIter};
pub use result_merger::{
    fetch_and_merge, fetch_partitions, merge_job_results, JobResultPartitions, JobResultProvider,
};
