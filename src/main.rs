//! # Doc Anchor CLI (`docq`)
//!
//! The `docq` binary drives the document pipeline from the command line
//! and hosts the HTTP boundary.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docq serve` | Start the HTTP server (uploads + queries) |
//! | `docq ingest <path>` | Stage a local file and ingest it |
//! | `docq query <document> "<prompt>"` | Ask a question about an ingested document |
//!
//! All commands accept `--config` pointing to a TOML file; every setting
//! has a default, so a missing file only matters when the defaults do not
//! fit the deployment.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use doc_anchor::ingest::Pipeline;
use doc_anchor::staging::Staging;
use doc_anchor::store::WeaviateStore;
use doc_anchor::{config, embedding, server};

/// Doc Anchor: ingest documents into per-document vector collections and
/// answer prompts with grounded generation.
#[derive(Parser)]
#[command(
    name = "docq",
    about = "Document ingestion and grounded question answering",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docq.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    Serve,

    /// Copy a local file into staging and ingest it.
    Ingest {
        /// File to ingest; the filename determines the collection name.
        path: PathBuf,
    },

    /// Ask a question about an ingested document.
    Query {
        /// Document name (original filename or sanitized collection name).
        document: String,

        /// The natural-language prompt.
        prompt: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = if cli.config.exists() {
        config::load_config(&cli.config)?
    } else {
        config::Config::default()
    };
    let config = Arc::new(config);

    let embedder = embedding::create_client(&config.embedding)?;
    let store = Arc::new(WeaviateStore::new(&config.store, embedder.clone())?);
    let staging = Staging::new(config.staging.dir.clone());
    let pipeline = Arc::new(Pipeline::new(config.clone(), staging, embedder, store));

    match cli.command {
        Commands::Serve => server::run_server(pipeline).await?,
        Commands::Ingest { path } => {
            let file_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .context("path has no usable file name")?
                .to_string();
            let bytes =
                std::fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
            pipeline.staging().write(&file_name, &bytes)?;
            let report = pipeline.process_document(&file_name).await?;
            println!(
                "ingested {} as {} ({} chunks)",
                file_name, report.collection, report.chunks
            );
        }
        Commands::Query { document, prompt } => {
            let answer = pipeline.prompt_document(&document, &prompt).await?;
            if answer.relevant_chunks.is_empty() {
                println!("{}", answer.message);
            } else {
                println!("{}", answer.response);
                println!();
                println!("grounded on {} chunk(s):", answer.relevant_chunks.len());
                for chunk in &answer.relevant_chunks {
                    println!("  [{}] {}", chunk.chunk_index, chunk.body.embedding_text());
                }
            }
        }
    }

    Ok(())
}
