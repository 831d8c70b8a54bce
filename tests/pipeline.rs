//! End-to-end pipeline tests against the in-memory store and the
//! deterministic hash embedder: ingest real staged files, then query them.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use doc_anchor::chunk::ChunkBody;
use doc_anchor::config::Config;
use doc_anchor::embedding::HashEmbedding;
use doc_anchor::error::Error;
use doc_anchor::ingest::Pipeline;
use doc_anchor::query::NO_RELEVANT_CONTENT;
use doc_anchor::staging::Staging;
use doc_anchor::store::memory::{GenerativeModel, MemoryStore, QuotingModel};

fn build_pipeline(
    dir: &tempfile::TempDir,
    model: Arc<dyn GenerativeModel>,
) -> (Pipeline, Arc<MemoryStore>) {
    let mut config = Config::default();
    config.staging.dir = dir.path().to_path_buf();
    let embedder = Arc::new(HashEmbedding::new(64));
    let store = Arc::new(MemoryStore::new(embedder.clone(), model));
    let pipeline = Pipeline::new(
        Arc::new(config),
        Staging::new(dir.path()),
        embedder,
        store.clone(),
    );
    (pipeline, store)
}

/// 500 characters, single spaces, no leading/trailing whitespace, so the
/// normalized length equals the raw length.
fn sample_text(len: usize) -> String {
    (0..len)
        .map(|i| {
            if i % 10 == 5 {
                ' '
            } else {
                char::from(b'a' + (i % 26) as u8)
            }
        })
        .collect()
}

fn record_text(body: &ChunkBody) -> &str {
    match body {
        ChunkBody::Text(t) => t,
        other => panic!("expected text chunk, got {:?}", other),
    }
}

#[tokio::test]
async fn text_document_ingests_and_answers_prompts() {
    let dir = tempfile::tempdir().unwrap();
    let (pipeline, store) = build_pipeline(&dir, Arc::new(QuotingModel));

    let text = sample_text(500);
    pipeline.staging().write("guide.txt", text.as_bytes()).unwrap();

    let report = pipeline.process_document("guide.txt").await.unwrap();
    assert_eq!(report.collection, "Guide");
    assert_eq!(report.chunks, 4);

    // the staged file is cleaned up once everything is persisted
    assert!(!pipeline.staging().contains("guide.txt"));

    let records = store.snapshot("Guide").unwrap();
    assert_eq!(records.len(), 4);
    let indices: Vec<i64> = records.iter().map(|r| r.chunk_index).collect();
    assert_eq!(indices, vec![0, 1, 2, 3]);

    // chunk 1 starts 25 characters before position 150
    let all: Vec<char> = text.chars().collect();
    let expected: String = all[125..300].iter().collect();
    assert_eq!(record_text(&records[1].body), expected);

    let answer = pipeline
        .prompt_document("guide.txt", "what is this text about")
        .await
        .unwrap();
    assert!(!answer.response.is_empty());
    assert!(answer.relevant_chunks.len() <= 5);
    assert!(!answer.relevant_chunks.is_empty());
    for chunk in &answer.relevant_chunks {
        assert!((0..=3).contains(&chunk.chunk_index));
    }
}

#[tokio::test]
async fn json_document_ingests_one_chunk_per_leaf() {
    let dir = tempfile::tempdir().unwrap();
    let (pipeline, store) = build_pipeline(&dir, Arc::new(QuotingModel));

    pipeline
        .staging()
        .write("data.json", br#"{"a": 1, "b": {"c": "x"}}"#)
        .unwrap();

    let report = pipeline.process_document("data.json").await.unwrap();
    assert_eq!(report.collection, "Data");
    assert_eq!(report.chunks, 2);

    let records = store.snapshot("Data").unwrap();
    assert_eq!(
        records[0].body,
        ChunkBody::Field {
            path: "a".to_string(),
            content: "1".to_string()
        }
    );
    assert_eq!(
        records[1].body,
        ChunkBody::Field {
            path: "b.c".to_string(),
            content: "x".to_string()
        }
    );

    let answer = pipeline
        .prompt_document("data.json", "what is b.c")
        .await
        .unwrap();
    assert!(!answer.response.is_empty());
    assert!(answer.relevant_chunks.len() <= 2);
}

#[tokio::test]
async fn reingesting_replaces_instead_of_accumulating() {
    let dir = tempfile::tempdir().unwrap();
    let (pipeline, store) = build_pipeline(&dir, Arc::new(QuotingModel));
    let text = sample_text(500);

    pipeline.staging().write("guide.txt", text.as_bytes()).unwrap();
    pipeline.process_document("guide.txt").await.unwrap();
    let first = store.snapshot("Guide").unwrap();

    // re-upload the identical document
    pipeline.staging().write("guide.txt", text.as_bytes()).unwrap();
    pipeline.process_document("guide.txt").await.unwrap();
    let second = store.snapshot("Guide").unwrap();

    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(second.iter()) {
        assert_eq!(a.chunk_index, b.chunk_index);
        assert_eq!(a.body, b.body);
    }
}

#[tokio::test]
async fn unsupported_extension_leaves_the_store_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let (pipeline, store) = build_pipeline(&dir, Arc::new(QuotingModel));

    pipeline.staging().write("data.xyz", b"payload").unwrap();
    let err = pipeline.process_document("data.xyz").await.unwrap_err();
    assert!(matches!(err, Error::UnsupportedFormat(_)));

    assert!(store.snapshot("Data").is_none());
    // failed ingests keep the staged file for re-submission
    assert!(pipeline.staging().contains("data.xyz"));
}

#[tokio::test]
async fn malformed_json_aborts_before_any_store_mutation() {
    let dir = tempfile::tempdir().unwrap();
    let (pipeline, store) = build_pipeline(&dir, Arc::new(QuotingModel));

    pipeline.staging().write("broken.json", b"{oops").unwrap();
    let err = pipeline.process_document("broken.json").await.unwrap_err();
    assert!(matches!(err, Error::MalformedInput(_)));
    assert!(store.snapshot("Broken").is_none());
    assert!(pipeline.staging().contains("broken.json"));
}

struct CountingModel {
    calls: AtomicUsize,
}

#[async_trait]
impl GenerativeModel for CountingModel {
    async fn generate(&self, _prompt: &str, context: &[String]) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("answer from {} passages", context.len()))
    }
}

#[tokio::test]
async fn querying_an_unknown_document_never_reaches_generation() {
    let dir = tempfile::tempdir().unwrap();
    let model = Arc::new(CountingModel {
        calls: AtomicUsize::new(0),
    });
    let (pipeline, _store) = build_pipeline(&dir, model.clone());

    let err = pipeline
        .prompt_document("never.txt", "anything there?")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn empty_document_yields_an_empty_collection_and_a_clear_answer() {
    let dir = tempfile::tempdir().unwrap();
    let (pipeline, store) = build_pipeline(&dir, Arc::new(QuotingModel));

    pipeline.staging().write("empty.txt", b"").unwrap();
    let report = pipeline.process_document("empty.txt").await.unwrap();
    assert_eq!(report.chunks, 0);
    assert!(store.snapshot("Empty").unwrap().is_empty());

    let answer = pipeline
        .prompt_document("empty.txt", "anything?")
        .await
        .unwrap();
    assert_eq!(answer.message, NO_RELEVANT_CONTENT);
    assert!(answer.response.is_empty());
    assert!(answer.relevant_chunks.is_empty());
}

#[tokio::test]
async fn document_ids_resolve_the_same_with_or_without_extension() {
    let dir = tempfile::tempdir().unwrap();
    let (pipeline, _store) = build_pipeline(&dir, Arc::new(QuotingModel));

    pipeline
        .staging()
        .write("my report.txt", sample_text(200).as_bytes())
        .unwrap();
    pipeline.process_document("my report.txt").await.unwrap();

    // original filename and sanitized collection name both resolve
    for id in ["my report.txt", "My_report"] {
        let answer = pipeline.prompt_document(id, "summary?").await.unwrap();
        assert!(!answer.response.is_empty());
    }
}
