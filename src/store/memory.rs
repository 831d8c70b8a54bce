//! In-memory [`VectorStore`] implementation.
//!
//! Collections live in a `HashMap` behind `std::sync::RwLock`; relevance is
//! brute-force cosine similarity over the stored vectors. Grounded
//! generation embeds the prompt through the injected [`EmbeddingClient`]
//! and synthesizes the answer through the injected [`GenerativeModel`],
//! so tests drive the whole pipeline without any external service.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tracing::debug;

use crate::chunk::ChunkBody;
use crate::embedding::EmbeddingClient;
use crate::error::{RecordFailure, Result};

use super::{
    store_failure, BulkInsertReport, ChunkRecord, ChunkShape, CollectionSchema, GroundedAnswer,
    MatchedChunk, VectorStore,
};

/// A `(prompt, context) -> answer` model. The in-memory store calls this
/// where a remote vector store would run its generative module.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    async fn generate(&self, prompt: &str, context: &[String]) -> anyhow::Result<String>;
}

/// Deterministic grounded synthesizer: restates the prompt and quotes the
/// retrieved passages. Good enough for tests and offline demos; a real
/// deployment uses the store-side generative module instead.
pub struct QuotingModel;

#[async_trait]
impl GenerativeModel for QuotingModel {
    async fn generate(&self, prompt: &str, context: &[String]) -> anyhow::Result<String> {
        if context.is_empty() {
            return Ok(String::new());
        }
        Ok(format!(
            "Answer to {:?} based on {} passage(s): {}",
            prompt,
            context.len(),
            context.join(" | ")
        ))
    }
}

struct StoredCollection {
    schema: CollectionSchema,
    records: Vec<ChunkRecord>,
}

pub struct MemoryStore {
    collections: RwLock<HashMap<String, StoredCollection>>,
    embedder: Arc<dyn EmbeddingClient>,
    model: Arc<dyn GenerativeModel>,
}

impl MemoryStore {
    pub fn new(embedder: Arc<dyn EmbeddingClient>, model: Arc<dyn GenerativeModel>) -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            embedder,
            model,
        }
    }

    /// Copy of a collection's records, for inspection in tests.
    pub fn snapshot(&self, name: &str) -> Option<Vec<ChunkRecord>> {
        self.collections
            .read()
            .unwrap()
            .get(name)
            .map(|c| c.records.clone())
    }
}

fn cosine_sim(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a < f32::EPSILON || mag_b < f32::EPSILON {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn collection_exists(&self, name: &str) -> Result<bool> {
        Ok(self.collections.read().unwrap().contains_key(name))
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.collections.write().unwrap().remove(name);
        Ok(())
    }

    async fn create_collection(&self, schema: &CollectionSchema) -> Result<()> {
        let mut collections = self.collections.write().unwrap();
        if collections.contains_key(&schema.name) {
            return Err(store_failure(
                "create",
                &schema.name,
                "collection already exists",
            )
            .into());
        }
        collections.insert(
            schema.name.clone(),
            StoredCollection {
                schema: schema.clone(),
                records: Vec::new(),
            },
        );
        Ok(())
    }

    async fn bulk_insert(&self, name: &str, records: &[ChunkRecord]) -> Result<BulkInsertReport> {
        let mut collections = self.collections.write().unwrap();
        let collection = collections
            .get_mut(name)
            .ok_or_else(|| store_failure("insert", name, "collection does not exist"))?;

        let mut report = BulkInsertReport::default();
        for record in records {
            // records must match the schema's chunk shape
            let matches_shape = match (&collection.schema.chunk_shape, &record.body) {
                (ChunkShape::Text, ChunkBody::Text(_)) => true,
                (ChunkShape::Structured, ChunkBody::Field { .. }) => true,
                _ => false,
            };
            if matches_shape {
                collection.records.push(record.clone());
                report.inserted += 1;
            } else {
                report.failures.push(RecordFailure {
                    chunk_index: record.chunk_index,
                    message: "chunk shape does not match collection schema".to_string(),
                });
            }
        }
        debug!(collection = name, inserted = report.inserted, "bulk insert");
        Ok(report)
    }

    async fn generate(
        &self,
        name: &str,
        prompt: &str,
        limit: usize,
    ) -> Result<Option<GroundedAnswer>> {
        // Clone the records out so the lock is not held across awaits.
        let records: Vec<ChunkRecord> = {
            let collections = self.collections.read().unwrap();
            match collections.get(name) {
                Some(c) => c.records.clone(),
                // mid-replacement race: treat as nothing to ground on
                None => return Ok(None),
            }
        };
        if records.is_empty() {
            return Ok(None);
        }

        let query = self
            .embedder
            .embed(&[prompt.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| store_failure("generate", name, "empty query embedding"))?;

        let mut scored: Vec<(f32, &ChunkRecord)> = records
            .iter()
            .map(|r| (cosine_sim(&query, &r.vector), r))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        let context: Vec<String> = scored
            .iter()
            .map(|(_, r)| r.body.embedding_text())
            .collect();
        let answer = self
            .model
            .generate(prompt, &context)
            .await
            .map_err(|e| store_failure("generate", name, e.to_string()))?;

        if answer.is_empty() {
            return Ok(None);
        }

        let matches = scored
            .into_iter()
            .map(|(_, r)| MatchedChunk {
                id: r.id.clone(),
                chunk_index: r.chunk_index,
                body: r.body.clone(),
            })
            .collect();

        Ok(Some(GroundedAnswer { answer, matches }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkBody;
    use crate::embedding::HashEmbedding;

    fn store() -> MemoryStore {
        MemoryStore::new(Arc::new(HashEmbedding::new(64)), Arc::new(QuotingModel))
    }

    fn record(index: i64, text: &str, vector: Vec<f32>) -> ChunkRecord {
        ChunkRecord {
            id: format!("id-{}", index),
            chunk_index: index,
            body: ChunkBody::Text(text.to_string()),
            vector,
        }
    }

    #[tokio::test]
    async fn create_insert_exists_delete_lifecycle() {
        let store = store();
        let schema = CollectionSchema {
            name: "Doc".to_string(),
            chunk_shape: super::super::ChunkShape::Text,
        };
        assert!(!store.collection_exists("Doc").await.unwrap());
        store.create_collection(&schema).await.unwrap();
        assert!(store.collection_exists("Doc").await.unwrap());

        let report = store
            .bulk_insert("Doc", &[record(0, "hello", vec![1.0, 0.0])])
            .await
            .unwrap();
        assert_eq!(report.inserted, 1);
        assert!(report.failures.is_empty());

        store.delete_collection("Doc").await.unwrap();
        assert!(!store.collection_exists("Doc").await.unwrap());
    }

    #[tokio::test]
    async fn mismatched_chunk_shapes_are_reported_per_record() {
        let store = store();
        let schema = CollectionSchema {
            name: "Doc".to_string(),
            chunk_shape: super::super::ChunkShape::Text,
        };
        store.create_collection(&schema).await.unwrap();

        let good = record(0, "fits", vec![1.0]);
        let bad = ChunkRecord {
            id: "id-1".to_string(),
            chunk_index: 1,
            body: ChunkBody::Field {
                path: "a".to_string(),
                content: "1".to_string(),
            },
            vector: vec![1.0],
        };
        let report = store.bulk_insert("Doc", &[good, bad]).await.unwrap();
        assert_eq!(report.inserted, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].chunk_index, 1);
    }

    #[tokio::test]
    async fn insert_into_missing_collection_fails() {
        let store = store();
        let err = store
            .bulk_insert("Nope", &[record(0, "x", vec![1.0])])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[tokio::test]
    async fn generate_returns_none_for_empty_or_missing_collections() {
        let store = store();
        assert!(store.generate("Ghost", "hi", 5).await.unwrap().is_none());

        let schema = CollectionSchema {
            name: "Empty".to_string(),
            chunk_shape: super::super::ChunkShape::Text,
        };
        store.create_collection(&schema).await.unwrap();
        assert!(store.generate("Empty", "hi", 5).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn generate_ranks_by_similarity_and_respects_limit() {
        let embedder = Arc::new(HashEmbedding::new(64));
        let store = MemoryStore::new(embedder.clone(), Arc::new(QuotingModel));
        let schema = CollectionSchema {
            name: "Doc".to_string(),
            chunk_shape: super::super::ChunkShape::Text,
        };
        store.create_collection(&schema).await.unwrap();

        let texts = [
            "rust borrow checker ownership",
            "cooking pasta with garlic",
            "rust lifetimes and ownership rules",
        ];
        let mut records = Vec::new();
        for (i, text) in texts.iter().enumerate() {
            let vector = embedder
                .embed(&[text.to_string()])
                .await
                .unwrap()
                .remove(0);
            records.push(record(i as i64, text, vector));
        }
        store.bulk_insert("Doc", &records).await.unwrap();

        let answer = store
            .generate("Doc", "how does rust ownership work", 2)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(answer.matches.len(), 2);
        let indices: Vec<i64> = answer.matches.iter().map(|m| m.chunk_index).collect();
        assert!(indices.contains(&0));
        assert!(indices.contains(&2));
        assert!(!answer.answer.is_empty());
    }
}
