//! Vector-store abstraction.
//!
//! The [`VectorStore`] trait is the complete contract the pipeline has with
//! the storage backend: existence check, destructive delete, schema create,
//! batched insert, and grounded generation. The wire protocol behind those
//! operations is an implementation detail of each backend.
//!
//! Backends:
//! - [`WeaviateStore`] — REST/GraphQL client for a Weaviate-style server.
//! - [`MemoryStore`] — in-process store with brute-force similarity, the
//!   injectable test double.

pub mod memory;
pub mod weaviate;

use async_trait::async_trait;
use serde::Serialize;

use crate::chunk::ChunkBody;
use crate::error::{Error, RecordFailure, Result, StoreFailure};

pub use memory::MemoryStore;
pub use weaviate::WeaviateStore;

/// Shape of the `chunk` field in a collection's schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkShape {
    /// Plain text chunks.
    Text,
    /// Object chunks with nested `path`/`content` text fields.
    Structured,
}

/// Schema for a per-document collection: the chunk field (shaped by the
/// source format) plus an integer `chunk_index`. Vectors are externally
/// supplied, never computed by the store.
#[derive(Debug, Clone)]
pub struct CollectionSchema {
    pub name: String,
    pub chunk_shape: ChunkShape,
}

/// One persisted chunk: body, position, and its embedding vector.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkRecord {
    pub id: String,
    pub chunk_index: i64,
    pub body: ChunkBody,
    pub vector: Vec<f32>,
}

/// Outcome of a bulk insert. `failures` holds every rejected record, not
/// just the first.
#[derive(Debug, Default)]
pub struct BulkInsertReport {
    pub inserted: usize,
    pub failures: Vec<RecordFailure>,
}

/// A chunk the generator used as grounding evidence.
#[derive(Debug, Clone, Serialize)]
pub struct MatchedChunk {
    pub id: String,
    pub chunk_index: i64,
    #[serde(rename = "chunk")]
    pub body: ChunkBody,
}

/// A generated answer plus the chunks that grounded it.
#[derive(Debug, Clone)]
pub struct GroundedAnswer {
    pub answer: String,
    pub matches: Vec<MatchedChunk>,
}

/// Storage backend contract. All five operations the pipeline needs;
/// nothing about the wire protocol leaks through.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn collection_exists(&self, name: &str) -> Result<bool>;

    /// Delete a collection and everything in it. Deleting a collection
    /// that does not exist is not an error.
    async fn delete_collection(&self, name: &str) -> Result<()>;

    async fn create_collection(&self, schema: &CollectionSchema) -> Result<()>;

    /// Insert all records in one batch. Per-record rejections are reported
    /// in the returned [`BulkInsertReport`], not as an early error.
    async fn bulk_insert(&self, name: &str, records: &[ChunkRecord]) -> Result<BulkInsertReport>;

    /// Grounded generation: retrieve the `limit` chunks most relevant to
    /// the prompt and synthesize one answer from them. `None` when the
    /// collection has nothing to ground on.
    async fn generate(
        &self,
        name: &str,
        prompt: &str,
        limit: usize,
    ) -> Result<Option<GroundedAnswer>>;
}

/// Derive the collection identifier for a document name.
///
/// The extension is stripped, every non-alphanumeric character becomes an
/// underscore, and the first character is forced uppercase. Names that do
/// not begin with a letter after sanitizing are prefixed with `C` so the
/// result is always a valid collection class name. Applying the function
/// to its own output is a no-op, so callers may pass either the original
/// filename or an already-sanitized identifier.
pub fn collection_name(document: &str) -> Result<String> {
    let stem = match document.rsplit_once('.') {
        Some((stem, _ext)) => stem,
        None => document,
    };

    let sanitized: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();

    let mut chars = sanitized.chars();
    let first = match chars.next() {
        Some(c) => c,
        None => {
            return Err(Error::MalformedInput(format!(
                "document name sanitizes to nothing: {:?}",
                document
            )))
        }
    };

    if first.is_ascii_alphabetic() {
        Ok(first.to_ascii_uppercase().to_string() + chars.as_str())
    } else {
        Ok(format!("C{}", sanitized))
    }
}

/// Build a [`StoreFailure`] for a failed operation; the common constructor
/// backends use before attaching per-record detail.
pub(crate) fn store_failure(
    operation: &'static str,
    collection: &str,
    message: impl Into<String>,
) -> StoreFailure {
    StoreFailure::new(operation, collection, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_stripped_and_first_char_uppercased() {
        assert_eq!(collection_name("motive.pdf").unwrap(), "Motive");
        assert_eq!(collection_name("Report.docx").unwrap(), "Report");
    }

    #[test]
    fn non_alphanumerics_become_underscores() {
        assert_eq!(
            collection_name("my report v2.docx").unwrap(),
            "My_report_v2"
        );
        assert_eq!(collection_name("data.tar.gz").unwrap(), "Data_tar");
    }

    #[test]
    fn names_without_extension_are_used_whole() {
        assert_eq!(collection_name("notes").unwrap(), "Notes");
    }

    #[test]
    fn leading_non_letter_gets_a_prefix() {
        assert_eq!(collection_name("2024notes.txt").unwrap(), "C2024notes");
        assert_eq!(collection_name("_hidden.txt").unwrap(), "C_hidden");
    }

    #[test]
    fn sanitizing_is_idempotent() {
        for name in ["motive.pdf", "my report v2.docx", "2024notes.txt"] {
            let once = collection_name(name).unwrap();
            assert_eq!(collection_name(&once).unwrap(), once);
        }
    }

    #[test]
    fn empty_names_are_rejected() {
        assert!(collection_name("").is_err());
        assert!(collection_name(".pdf").is_err());
    }
}
