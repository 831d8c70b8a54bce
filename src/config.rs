use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub staging: StagingConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StagingConfig {
    /// Directory uploaded files are written to and ingested from.
    #[serde(default = "default_staging_dir")]
    pub dir: PathBuf,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            dir: default_staging_dir(),
        }
    }
}

fn default_staging_dir() -> PathBuf {
    PathBuf::from("./staging")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Window stride in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Characters repeated from the previous window.
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    150
}
fn default_overlap() -> usize {
    25
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Maximum chunks handed to grounded generation per query.
    #[serde(default = "default_limit")]
    pub limit: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
        }
    }
}

fn default_limit() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `openai` or `hash` (deterministic, offline).
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    /// Texts per embedding request.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Environment variable holding the API key.
    #[serde(default = "default_embedding_key_env")]
    pub api_key_env: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            dims: default_dims(),
            batch_size: default_batch_size(),
            timeout_secs: default_timeout_secs(),
            api_key_env: default_embedding_key_env(),
        }
    }
}

fn default_embedding_provider() -> String {
    "openai".to_string()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_dims() -> usize {
    1536
}
fn default_batch_size() -> usize {
    64
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_embedding_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// Base URL of the vector store's REST endpoint.
    #[serde(default = "default_store_url")]
    pub url: String,
    /// Environment variable holding the store API key, if any.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: default_store_url(),
            api_key_env: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_store_url() -> String {
    "http://localhost:8080".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.overlap >= config.chunking.chunk_size {
        anyhow::bail!("chunking.overlap must be smaller than chunking.chunk_size");
    }
    if config.retrieval.limit == 0 {
        anyhow::bail!("retrieval.limit must be >= 1");
    }
    if config.embedding.dims == 0 {
        anyhow::bail!("embedding.dims must be > 0");
    }
    match config.embedding.provider.as_str() {
        "openai" | "hash" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be openai or hash.",
            other
        ),
    }
    Ok(())
}
