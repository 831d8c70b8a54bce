//! Embedding client abstraction and implementations.
//!
//! Defines the [`EmbeddingClient`] trait and two backends:
//! - **[`OpenAiEmbedding`]** — calls the OpenAI embeddings API.
//! - **[`HashEmbedding`]** — deterministic token-hash vectors for tests and
//!   offline runs.
//!
//! Embedding is fail-fast: a failed call surfaces as
//! [`Error::Embedding`](crate::error::Error::Embedding) and aborts the
//! document's ingestion. Recovery is caller re-submission, which replaces
//! the collection wholesale.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::chunk::Chunk;
use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};

/// A text-to-vector model. Output order matches input order and every
/// vector has [`dims`](EmbeddingClient::dims) components.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;
    /// Vector dimensionality.
    fn dims(&self) -> usize;
    /// Embed a batch of texts.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Instantiate the client named by the configuration.
pub fn create_client(config: &EmbeddingConfig) -> AnyResult<Arc<dyn EmbeddingClient>> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiEmbedding::new(config)?)),
        "hash" => Ok(Arc::new(HashEmbedding::new(config.dims))),
        other => anyhow::bail!("Unknown embedding provider: {}", other),
    }
}

/// Embed a chunk sequence in batches, preserving chunk order.
///
/// Batching is an optimization only; any batch failure aborts the whole
/// sequence with nothing returned.
pub async fn embed_chunks(
    client: &dyn EmbeddingClient,
    chunks: &[Chunk],
    batch_size: usize,
) -> Result<Vec<Vec<f32>>> {
    let texts: Vec<String> = chunks.iter().map(|c| c.body.embedding_text()).collect();
    let mut vectors = Vec::with_capacity(texts.len());
    for batch in texts.chunks(batch_size.max(1)) {
        let mut batch_vectors = client.embed(batch).await?;
        if batch_vectors.len() != batch.len() {
            return Err(Error::Embedding(format!(
                "model returned {} vectors for {} inputs",
                batch_vectors.len(),
                batch.len()
            )));
        }
        vectors.append(&mut batch_vectors);
    }
    Ok(vectors)
}

// ============ OpenAI ============

/// Embedding client for the OpenAI `POST /v1/embeddings` endpoint.
///
/// The API key is read from the environment variable named in the config
/// at construction time, so a misconfigured deployment fails at startup
/// rather than mid-ingestion.
pub struct OpenAiEmbedding {
    model: String,
    dims: usize,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiEmbedding {
    pub fn new(config: &EmbeddingConfig) -> AnyResult<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| anyhow::anyhow!("{} environment variable not set", config.api_key_env))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model: config.model.clone(),
            dims: config.dims,
            api_key,
            client,
        })
    }
}

#[async_trait]
impl EmbeddingClient for OpenAiEmbedding {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let response = self
            .client
            .post("https://api.openai.com/v1/embeddings")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Embedding(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(Error::Embedding(format!(
                "OpenAI API error {}: {}",
                status, body_text
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::Embedding(e.to_string()))?;
        parse_embedding_response(&json)
    }
}

/// Extract the `data[].embedding` arrays, in order.
fn parse_embedding_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| Error::Embedding("invalid response: missing data array".to_string()))?;

    let mut embeddings = Vec::with_capacity(data.len());
    for item in data {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| Error::Embedding("invalid response: missing embedding".to_string()))?;
        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        embeddings.push(vec);
    }
    Ok(embeddings)
}

// ============ Hash ============

/// Deterministic bag-of-tokens embedding: each token is hashed into one of
/// `dims` buckets and the vector is normalized to unit length. No network,
/// no model weights; similar texts land near each other because they share
/// token buckets. Used by the test suite and the `hash` provider setting.
pub struct HashEmbedding {
    dims: usize,
}

impl HashEmbedding {
    pub fn new(dims: usize) -> Self {
        Self { dims }
    }
}

#[async_trait]
impl EmbeddingClient for HashEmbedding {
    fn model_name(&self) -> &str {
        "token-hash"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| hash_vector(t, self.dims)).collect())
    }
}

fn hash_vector(text: &str, dims: usize) -> Vec<f32> {
    let mut vector = vec![0.0f32; dims];
    for token in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        let digest = Sha256::digest(token.to_lowercase().as_bytes());
        let bucket = u64::from_le_bytes(digest[..8].try_into().unwrap_or([0; 8]));
        vector[(bucket % dims as u64) as usize] += 1.0;
    }
    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for v in &mut vector {
            *v /= norm;
        }
    }
    vector
}
