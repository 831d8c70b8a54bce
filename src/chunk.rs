//! Overlapping-window text chunker and JSON leaf chunker.
//!
//! Text documents are normalized (whitespace runs collapsed to a single
//! space) and split into fixed-stride windows where every chunk after the
//! first repeats the previous `overlap` characters, so no boundary is lost
//! to a hard cut. JSON documents are flattened into one chunk per leaf
//! scalar, addressed by its dotted key-path from the root.
//!
//! Both algorithms are deterministic: identical input and parameters yield
//! an identical chunk sequence, and `chunk_index` is the chunk's position
//! in that sequence.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Bound on JSON nesting depth. Deeper input is rejected rather than
/// recursed into.
const MAX_JSON_DEPTH: usize = 128;

/// Path assigned to a bare scalar at the JSON root, which has no key of
/// its own.
const ROOT_PATH: &str = "$";

/// The textual payload of a chunk.
///
/// Serializes untagged: a text chunk is a plain JSON string, a structured
/// chunk is a `{path, content}` object, matching the stored record shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChunkBody {
    /// One leaf of a JSON document: dotted key-path plus stringified value.
    Field { path: String, content: String },
    /// A span of normalized document text.
    Text(String),
}

impl ChunkBody {
    /// The representation submitted to the embedding model. Structured
    /// chunks embed as a `{"path": …, "content": …}` JSON object so the
    /// key-path contributes to the vector.
    pub fn embedding_text(&self) -> String {
        match self {
            ChunkBody::Text(text) => text.clone(),
            ChunkBody::Field { path, content } => {
                serde_json::json!({ "path": path, "content": content }).to_string()
            }
        }
    }
}

/// An addressable unit of document content, positioned by `index`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub index: i64,
    pub body: ChunkBody,
}

/// Collapse every run of whitespace to a single space and trim the ends.
pub fn normalize_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_run = false;
    for ch in text.chars() {
        if ch.is_whitespace() {
            if !in_run && !out.is_empty() {
                out.push(' ');
            }
            in_run = true;
        } else {
            out.push(ch);
            in_run = false;
        }
    }
    if out.ends_with(' ') {
        out.pop();
    }
    out
}

/// Split normalized text into overlapping windows.
///
/// For text of length L (in characters), chunk size S, and overlap O, one
/// chunk is produced per stride position `i = 0, S, 2S, … < L`, covering
/// `[max(i - O, 0), min(i + S, L))`. Chunk count is `ceil(L / S)`; empty
/// text yields zero chunks.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<Chunk> {
    debug_assert!(chunk_size > 0);
    let normalized: Vec<char> = normalize_whitespace(text).chars().collect();

    let mut chunks = Vec::new();
    let mut pos = 0usize;
    while pos < normalized.len() {
        let start = pos.saturating_sub(overlap);
        let end = (pos + chunk_size).min(normalized.len());
        chunks.push(Chunk {
            index: chunks.len() as i64,
            body: ChunkBody::Text(normalized[start..end].iter().collect()),
        });
        pos += chunk_size;
    }
    chunks
}

/// Flatten a parsed JSON tree into one chunk per leaf scalar.
///
/// Traversal is depth-first in encountered key order; array elements use
/// their numeric index as a path segment, and a bare scalar root is
/// addressed as `$`. Null leaves are skipped. `chunk_index` is the leaf's
/// visit order.
pub fn chunk_json(root: &Value) -> Result<Vec<Chunk>> {
    let mut leaves = Vec::new();
    walk(root, "", 0, &mut leaves)?;
    Ok(leaves
        .into_iter()
        .enumerate()
        .map(|(i, (path, content))| Chunk {
            index: i as i64,
            body: ChunkBody::Field { path, content },
        })
        .collect())
}

fn walk(value: &Value, path: &str, depth: usize, out: &mut Vec<(String, String)>) -> Result<()> {
    if depth > MAX_JSON_DEPTH {
        return Err(Error::MalformedInput(format!(
            "JSON nesting exceeds {} levels",
            MAX_JSON_DEPTH
        )));
    }
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                walk(child, &join_path(path, key), depth + 1, out)?;
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                walk(child, &join_path(path, &i.to_string()), depth + 1, out)?;
            }
        }
        Value::Null => {}
        Value::String(s) => out.push((leaf_path(path), s.clone())),
        Value::Number(n) => out.push((leaf_path(path), n.to_string())),
        Value::Bool(b) => out.push((leaf_path(path), b.to_string())),
    }
    Ok(())
}

fn join_path(path: &str, segment: &str) -> String {
    if path.is_empty() {
        segment.to_string()
    } else {
        format!("{}.{}", path, segment)
    }
}

fn leaf_path(path: &str) -> String {
    if path.is_empty() {
        ROOT_PATH.to_string()
    } else {
        path.to_string()
    }
}
