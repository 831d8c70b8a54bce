//! Grounded query against an ingested document.
//!
//! Resolves the sanitized document id to its collection, asks the store
//! for a grounded generation over the most relevant chunks, and reshapes
//! the result so callers can show provenance alongside the answer.

use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::ingest::Pipeline;
use crate::store::{self, MatchedChunk};

/// Message returned when the store has nothing relevant to ground on.
pub const NO_RELEVANT_CONTENT: &str = "no relevant content";

/// The answer to a prompt plus the chunks it was grounded on. An empty
/// `relevant_chunks` with the [`NO_RELEVANT_CONTENT`] message is a valid
/// outcome, not an error.
#[derive(Debug, Clone, Serialize)]
pub struct PromptAnswer {
    pub message: String,
    pub response: String,
    pub relevant_chunks: Vec<MatchedChunk>,
}

impl Pipeline {
    /// Answer a prompt against a previously ingested document.
    ///
    /// The document id is sanitized with the same rule ingestion uses, so
    /// callers may pass the original filename or the collection name. A
    /// document that was never ingested fails with
    /// [`Error::NotFound`] before any generation call is made.
    pub async fn prompt_document(&self, document: &str, prompt: &str) -> Result<PromptAnswer> {
        let collection = store::collection_name(document)?;

        if !self.store().collection_exists(&collection).await? {
            return Err(Error::NotFound(collection));
        }

        let limit = self.config().retrieval.limit;
        debug!(collection = %collection, limit, "grounded generation");
        match self.store().generate(&collection, prompt, limit).await? {
            Some(answer) if !answer.answer.is_empty() => {
                info!(
                    collection = %collection,
                    grounded_on = answer.matches.len(),
                    "prompt answered"
                );
                Ok(PromptAnswer {
                    message: "ok".to_string(),
                    response: answer.answer,
                    relevant_chunks: answer.matches,
                })
            }
            _ => Ok(PromptAnswer {
                message: NO_RELEVANT_CONTENT.to_string(),
                response: String::new(),
                relevant_chunks: Vec::new(),
            }),
        }
    }
}
