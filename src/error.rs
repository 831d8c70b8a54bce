//! Error taxonomy for the ingestion and query pipeline.
//!
//! Every fallible pipeline stage maps into one [`Error`] variant. The outer
//! boundary (HTTP server, CLI) translates variants into status codes and
//! user-safe messages; full detail is logged, not returned verbatim.

use std::fmt;

use thiserror::Error;

/// Pipeline error. Extraction and embedding failures abort an ingestion
/// before anything is persisted; store failures carry per-record detail.
#[derive(Error, Debug)]
pub enum Error {
    /// File extension the extractor does not handle.
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// Input that cannot be parsed into the expected shape (e.g. invalid
    /// JSON, or a document name that sanitizes to nothing).
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// Decoding a supported binary format failed.
    #[error("extraction failed: {0}")]
    Extract(String),

    /// The external embedding model call failed.
    #[error("embedding request failed: {0}")]
    Embedding(String),

    /// A vector-store operation failed.
    #[error(transparent)]
    Store(#[from] StoreFailure),

    /// Query against a document that was never ingested.
    #[error("document not found: {0}")]
    NotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A single rejected record within a bulk insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFailure {
    pub chunk_index: i64,
    pub message: String,
}

/// A failed vector-store operation, with the per-record failure list for
/// partial-batch inserts. All failed records are reported, not just the
/// first.
#[derive(Debug)]
pub struct StoreFailure {
    pub operation: &'static str,
    pub collection: String,
    pub message: String,
    pub failed_records: Vec<RecordFailure>,
}

impl StoreFailure {
    pub fn new(
        operation: &'static str,
        collection: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            collection: collection.into(),
            message: message.into(),
            failed_records: Vec::new(),
        }
    }

    pub fn with_records(mut self, failed_records: Vec<RecordFailure>) -> Self {
        self.failed_records = failed_records;
        self
    }
}

impl fmt::Display for StoreFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "store {} failed for collection {}: {}",
            self.operation, self.collection, self.message
        )?;
        if !self.failed_records.is_empty() {
            write!(f, " [")?;
            for (i, rec) in self.failed_records.iter().enumerate() {
                if i > 0 {
                    write!(f, "; ")?;
                }
                write!(f, "chunk {}: {}", rec.chunk_index, rec.message)?;
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}

impl std::error::Error for StoreFailure {}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;
