//! Ingestion pipeline orchestration.
//!
//! Coordinates the full ingest flow for one staged file: extract → chunk →
//! embed → replace collection → bulk insert → staging cleanup. Ingestions
//! for the same sanitized document id are serialized by a per-id lock so a
//! concurrent re-upload cannot interleave its delete with another's insert;
//! different documents share no mutable state and proceed in parallel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::chunk::{self, Chunk};
use crate::config::Config;
use crate::embedding::{self, EmbeddingClient};
use crate::error::{Error, Result};
use crate::extract::{self, ExtractedDocument};
use crate::staging::Staging;
use crate::store::{self, ChunkRecord, ChunkShape, CollectionSchema, VectorStore};

/// Per-document mutual exclusion, keyed by sanitized collection name.
/// Lock handles are created on first use and held for the whole ingest.
#[derive(Default)]
struct IngestLocks {
    inner: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl IngestLocks {
    async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.inner.lock().unwrap();
            locks.entry(key.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }
}

/// Summary of a successful ingestion.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub collection: String,
    pub chunks: usize,
}

/// The document pipeline: owns its collaborators explicitly instead of
/// reaching for process-wide handles, so callers (and tests) decide what
/// store and model back it.
pub struct Pipeline {
    config: Arc<Config>,
    staging: Staging,
    embedder: Arc<dyn EmbeddingClient>,
    store: Arc<dyn VectorStore>,
    locks: IngestLocks,
}

impl Pipeline {
    pub fn new(
        config: Arc<Config>,
        staging: Staging,
        embedder: Arc<dyn EmbeddingClient>,
        store: Arc<dyn VectorStore>,
    ) -> Self {
        Self {
            config,
            staging,
            embedder,
            store,
            locks: IngestLocks::default(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn staging(&self) -> &Staging {
        &self.staging
    }

    pub(crate) fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Ingest one staged file into its own collection, replacing any prior
    /// version of the same document. The staged file is deleted only after
    /// every record is persisted.
    pub async fn process_document(&self, file_name: &str) -> Result<IngestReport> {
        let collection = store::collection_name(file_name)?;
        let _guard = self.locks.acquire(&collection).await;

        let path = self.staging.resolve(file_name)?;
        let extracted = extract::extract(&path)?;
        let (chunks, shape) = match extracted {
            ExtractedDocument::Text(text) => (
                chunk::chunk_text(
                    &text,
                    self.config.chunking.chunk_size,
                    self.config.chunking.overlap,
                ),
                ChunkShape::Text,
            ),
            ExtractedDocument::Structured(value) => {
                (chunk::chunk_json(&value)?, ChunkShape::Structured)
            }
        };
        debug!(
            collection = %collection,
            chunks = chunks.len(),
            "document extracted and chunked"
        );

        // Embed everything before touching the store: an embedding failure
        // must leave no half-written collection behind.
        let vectors = embedding::embed_chunks(
            self.embedder.as_ref(),
            &chunks,
            self.config.embedding.batch_size,
        )
        .await?;
        let records = into_records(chunks, vectors);

        if self.store.collection_exists(&collection).await? {
            debug!(collection = %collection, "replacing existing collection");
            self.store.delete_collection(&collection).await?;
        }
        self.store
            .create_collection(&CollectionSchema {
                name: collection.clone(),
                chunk_shape: shape,
            })
            .await?;

        let report = self.store.bulk_insert(&collection, &records).await?;
        if !report.failures.is_empty() {
            warn!(
                collection = %collection,
                failed = report.failures.len(),
                "bulk insert rejected records"
            );
            return Err(Error::Store(
                crate::error::StoreFailure::new(
                    "insert",
                    collection,
                    format!(
                        "{} of {} records rejected",
                        report.failures.len(),
                        records.len()
                    ),
                )
                .with_records(report.failures),
            ));
        }

        self.staging.remove(file_name)?;
        info!(
            collection = %collection,
            chunks = records.len(),
            "document ingested"
        );
        Ok(IngestReport {
            collection,
            chunks: records.len(),
        })
    }
}

fn into_records(chunks: Vec<Chunk>, vectors: Vec<Vec<f32>>) -> Vec<ChunkRecord> {
    chunks
        .into_iter()
        .zip(vectors)
        .map(|(chunk, vector)| ChunkRecord {
            id: Uuid::new_v4().to_string(),
            chunk_index: chunk.index,
            body: chunk.body,
            vector,
        })
        .collect()
}
