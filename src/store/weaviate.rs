//! Weaviate-backed [`VectorStore`] implementation.
//!
//! Talks to a Weaviate-style server over its REST schema/batch endpoints
//! and GraphQL `Get` queries. Collections are created with `vectorizer:
//! none` because vectors are computed by the pipeline's own embedding
//! client; grounded generation uses the server's generative module with a
//! grouped task.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::chunk::ChunkBody;
use crate::config::StoreConfig;
use crate::embedding::EmbeddingClient;
use crate::error::{RecordFailure, Result, StoreFailure};

use super::{
    store_failure, BulkInsertReport, ChunkRecord, ChunkShape, CollectionSchema, GroundedAnswer,
    MatchedChunk, VectorStore,
};

pub struct WeaviateStore {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
    embedder: Arc<dyn EmbeddingClient>,
}

impl WeaviateStore {
    pub fn new(config: &StoreConfig, embedder: Arc<dyn EmbeddingClient>) -> anyhow::Result<Self> {
        let api_key = match &config.api_key_env {
            Some(env) => Some(
                std::env::var(env)
                    .map_err(|_| anyhow::anyhow!("{} environment variable not set", env))?,
            ),
            None => None,
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key,
            client,
            embedder,
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        builder
    }

    async fn send(
        &self,
        operation: &'static str,
        collection: &str,
        builder: reqwest::RequestBuilder,
    ) -> std::result::Result<reqwest::Response, StoreFailure> {
        builder
            .send()
            .await
            .map_err(|e| store_failure(operation, collection, e.to_string()))
    }

    /// Inspect the stored class definition to learn whether the `chunk`
    /// property is plain text or a nested object. Needed to build the
    /// right GraphQL field selection at query time.
    async fn chunk_shape(&self, name: &str) -> Result<ChunkShape> {
        let response = self
            .send("schema", name, self.request(reqwest::Method::GET, &format!("/v1/schema/{}", name)))
            .await?;
        if !response.status().is_success() {
            return Err(store_failure(
                "schema",
                name,
                format!("status {}", response.status()),
            )
            .into());
        }
        let class: Value = response
            .json()
            .await
            .map_err(|e| store_failure("schema", name, e.to_string()))?;
        let is_object = class
            .get("properties")
            .and_then(|p| p.as_array())
            .and_then(|props| {
                props
                    .iter()
                    .find(|p| p.get("name").and_then(|n| n.as_str()) == Some("chunk"))
            })
            .and_then(|p| p.get("dataType"))
            .and_then(|d| d.as_array())
            .and_then(|d| d.first())
            .and_then(|d| d.as_str())
            == Some("object");
        Ok(if is_object {
            ChunkShape::Structured
        } else {
            ChunkShape::Text
        })
    }
}

fn record_properties(record: &ChunkRecord) -> Value {
    match &record.body {
        ChunkBody::Text(text) => json!({
            "chunk": text,
            "chunk_index": record.chunk_index,
        }),
        ChunkBody::Field { path, content } => json!({
            "chunk": { "path": path, "content": content },
            "chunk_index": record.chunk_index,
        }),
    }
}

fn schema_properties(shape: ChunkShape) -> Value {
    let chunk_property = match shape {
        ChunkShape::Text => json!({
            "name": "chunk",
            "dataType": ["text"],
        }),
        ChunkShape::Structured => json!({
            "name": "chunk",
            "dataType": ["object"],
            "nestedProperties": [
                { "name": "path", "dataType": ["text"] },
                { "name": "content", "dataType": ["text"] },
            ],
        }),
    };
    json!([
        chunk_property,
        { "name": "chunk_index", "dataType": ["int"] },
    ])
}

fn format_vector(vector: &[f32]) -> String {
    let parts: Vec<String> = vector.iter().map(|v| v.to_string()).collect();
    format!("[{}]", parts.join(", "))
}

#[async_trait]
impl VectorStore for WeaviateStore {
    async fn collection_exists(&self, name: &str) -> Result<bool> {
        let response = self
            .send(
                "exists",
                name,
                self.request(reqwest::Method::GET, &format!("/v1/schema/{}", name)),
            )
            .await?;
        let status = response.status();
        if status.is_success() {
            Ok(true)
        } else if status == reqwest::StatusCode::NOT_FOUND {
            Ok(false)
        } else {
            Err(store_failure("exists", name, format!("status {}", status)).into())
        }
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let response = self
            .send(
                "delete",
                name,
                self.request(reqwest::Method::DELETE, &format!("/v1/schema/{}", name)),
            )
            .await?;
        // deleting a class that is already gone is fine
        if response.status().is_success() || response.status() == reqwest::StatusCode::NOT_FOUND {
            debug!(collection = name, "collection deleted");
            Ok(())
        } else {
            Err(store_failure("delete", name, format!("status {}", response.status())).into())
        }
    }

    async fn create_collection(&self, schema: &CollectionSchema) -> Result<()> {
        let body = json!({
            "class": schema.name,
            "vectorizer": "none",
            "moduleConfig": { "generative-openai": {} },
            "properties": schema_properties(schema.chunk_shape),
        });
        let response = self
            .send(
                "create",
                &schema.name,
                self.request(reqwest::Method::POST, "/v1/schema").json(&body),
            )
            .await?;
        if response.status().is_success() {
            debug!(collection = %schema.name, "collection created");
            Ok(())
        } else {
            let detail = response.text().await.unwrap_or_default();
            Err(store_failure("create", &schema.name, detail).into())
        }
    }

    async fn bulk_insert(&self, name: &str, records: &[ChunkRecord]) -> Result<BulkInsertReport> {
        if records.is_empty() {
            return Ok(BulkInsertReport::default());
        }

        let objects: Vec<Value> = records
            .iter()
            .map(|record| {
                json!({
                    "class": name,
                    "id": record.id,
                    "properties": record_properties(record),
                    "vector": record.vector,
                })
            })
            .collect();

        let response = self
            .send(
                "insert",
                name,
                self.request(reqwest::Method::POST, "/v1/batch/objects")
                    .json(&json!({ "objects": objects })),
            )
            .await?;
        if !response.status().is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(store_failure("insert", name, detail).into());
        }

        // per-object results come back positionally
        let results: Vec<Value> = response
            .json()
            .await
            .map_err(|e| store_failure("insert", name, e.to_string()))?;

        let mut report = BulkInsertReport::default();
        for (pos, result) in results.iter().enumerate() {
            let messages: Vec<&str> = result
                .pointer("/result/errors/error")
                .and_then(|e| e.as_array())
                .map(|errors| {
                    errors
                        .iter()
                        .filter_map(|e| e.get("message").and_then(|m| m.as_str()))
                        .collect()
                })
                .unwrap_or_default();
            if messages.is_empty() {
                report.inserted += 1;
            } else {
                let chunk_index = records.get(pos).map(|r| r.chunk_index).unwrap_or(pos as i64);
                report.failures.push(RecordFailure {
                    chunk_index,
                    message: messages.join("; "),
                });
            }
        }
        Ok(report)
    }

    async fn generate(
        &self,
        name: &str,
        prompt: &str,
        limit: usize,
    ) -> Result<Option<GroundedAnswer>> {
        let shape = self.chunk_shape(name).await?;
        let chunk_selection = match shape {
            ChunkShape::Text => "chunk",
            ChunkShape::Structured => "chunk { path content }",
        };

        let query_vector = self
            .embedder
            .embed(&[prompt.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| store_failure("generate", name, "empty query embedding"))?;

        // serde_json string rendering doubles as GraphQL string escaping
        let task = serde_json::to_string(prompt)
            .map_err(|e| store_failure("generate", name, e.to_string()))?;
        let graphql = format!(
            "{{ Get {{ {class}(limit: {limit}, nearVector: {{vector: {vector}}}) {{ {chunk} chunk_index _additional {{ id generate(groupedResult: {{task: {task}}}) {{ groupedResult error }} }} }} }} }}",
            class = name,
            limit = limit,
            vector = format_vector(&query_vector),
            chunk = chunk_selection,
            task = task,
        );

        let response = self
            .send(
                "generate",
                name,
                self.request(reqwest::Method::POST, "/v1/graphql")
                    .json(&json!({ "query": graphql })),
            )
            .await?;
        if !response.status().is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(store_failure("generate", name, detail).into());
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| store_failure("generate", name, e.to_string()))?;

        if let Some(errors) = body.get("errors").and_then(|e| e.as_array()) {
            if !errors.is_empty() {
                let detail: Vec<&str> = errors
                    .iter()
                    .filter_map(|e| e.get("message").and_then(|m| m.as_str()))
                    .collect();
                return Err(store_failure("generate", name, detail.join("; ")).into());
            }
        }

        let objects = match body
            .pointer(&format!("/data/Get/{}", name))
            .and_then(|o| o.as_array())
        {
            Some(objects) if !objects.is_empty() => objects,
            _ => return Ok(None),
        };

        let answer = objects
            .first()
            .and_then(|o| o.pointer("/_additional/generate/groupedResult"))
            .and_then(|g| g.as_str())
            .unwrap_or_default()
            .to_string();
        if answer.is_empty() {
            return Ok(None);
        }

        let mut matches = Vec::with_capacity(objects.len());
        for object in objects {
            let id = object
                .pointer("/_additional/id")
                .and_then(|i| i.as_str())
                .unwrap_or_default()
                .to_string();
            let chunk_index = object
                .get("chunk_index")
                .and_then(|i| i.as_i64())
                .unwrap_or_default();
            let chunk_body = object
                .get("chunk")
                .cloned()
                .map(serde_json::from_value::<ChunkBody>)
                .transpose()
                .map_err(|e| store_failure("generate", name, e.to_string()))?
                .unwrap_or_else(|| ChunkBody::Text(String::new()));
            matches.push(MatchedChunk {
                id,
                chunk_index,
                body: chunk_body,
            });
        }

        Ok(Some(GroundedAnswer { answer, matches }))
    }
}
