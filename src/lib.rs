//! # Doc Anchor
//!
//! Document ingestion and grounded question answering over a per-document
//! vector store.
//!
//! Doc Anchor takes heterogeneous documents (PDF, DOCX, JSON, plain text),
//! normalizes them into an overlap-consistent sequence of addressable
//! chunks, embeds each chunk, and persists the records in one vector-store
//! collection per document. Prompts are later answered by grounded
//! generation over the most relevant chunks of that document.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────┐   ┌─────────┐   ┌─────────┐   ┌──────────────┐
//! │ Staging │──▶│ Extract │──▶│  Chunk   │──▶│    Embed     │
//! │  (dir)  │   │ pdf/docx│   │ windows/ │   │  (external   │
//! └─────────┘   │ txt/json│   │ json leaf│   │   model)     │
//!               └─────────┘   └─────────┘   └──────┬───────┘
//!                                                  ▼
//!                 ┌──────────┐            ┌────────────────┐
//!                 │  Query    │◀──────────│  Vector store  │
//!                 │ (grounded │  generate │ (1 collection  │
//!                 │  answer)  │           │  per document) │
//!                 └──────────┘            └────────────────┘
//! ```
//!
//! Ingestion is destructive-replace: re-uploading a document deletes and
//! recreates its collection, which also makes failed ingests recoverable
//! by simple re-submission.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Pipeline error taxonomy |
//! | [`staging`] | Upload staging directory |
//! | [`extract`] | Per-format text/JSON extraction |
//! | [`chunk`] | Overlapping-window and JSON-leaf chunking |
//! | [`embedding`] | Embedding client abstraction |
//! | [`store`] | Vector-store contract and backends |
//! | [`ingest`] | Ingestion pipeline orchestration |
//! | [`query`] | Grounded query and answer reshaping |
//! | [`server`] | HTTP boundary |

pub mod chunk;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod query;
pub mod server;
pub mod staging;
pub mod store;
