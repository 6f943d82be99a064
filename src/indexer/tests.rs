use super::*;
use crate::database::CollectionOptions;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

const DIMENSION: usize = 4;

/// Deterministic bag-of-vowels embedder
struct VowelEmbedder;

impl Embedder for VowelEmbedder {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                ['a', 'e', 'i', 'o']
                    .iter()
                    .map(|vowel| text.matches(*vowel).count() as f32 + 1.0)
                    .collect()
            })
            .collect())
    }

    fn dimension(&self) -> usize {
        DIMENSION
    }

    fn model_name(&self) -> &str {
        "vowels"
    }
}

/// Succeeds for the first `healthy_calls` calls, then fails
struct FlakyEmbedder {
    healthy_calls: usize,
    calls: AtomicUsize,
}

impl Embedder for FlakyEmbedder {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if self.calls.fetch_add(1, Ordering::SeqCst) >= self.healthy_calls {
            return Err(RagError::Embedding("backend unavailable".to_string()));
        }
        VowelEmbedder.embed(texts)
    }

    fn dimension(&self) -> usize {
        DIMENSION
    }

    fn model_name(&self) -> &str {
        "flaky"
    }
}

fn small_chunks() -> ChunkingConfig {
    ChunkingConfig {
        chunk_size: 60,
        chunk_overlap: 10,
    }
}

fn corpus() -> Vec<Document> {
    vec![
        Document::new(
            "Overfitting",
            "Overfitting happens when a model learns noise in the training data. \
             It performs well on training examples and poorly on new ones.",
        ),
        Document::new("Empty", "   \n\n  "),
        Document::new(
            "Random forest",
            "A random forest is an ensemble of decision trees trained on bootstrap samples.",
        ),
    ]
}

async fn open_collection(path: &std::path::Path, delete_existing: bool) -> Collection {
    Collection::open_or_create(
        path,
        "wiki_pages",
        &CollectionOptions::new(DIMENSION),
        delete_existing,
    )
    .await
    .expect("should open collection")
}

async fn all_ids(collection: &Collection) -> HashSet<String> {
    collection
        .query(&[1.0; DIMENSION], 1000)
        .await
        .expect("query should succeed")
        .into_iter()
        .map(|hit| hit.id)
        .collect()
}

#[test]
fn invalid_chunking_is_rejected() {
    let config = ChunkingConfig {
        chunk_size: 10,
        chunk_overlap: 10,
    };
    assert!(matches!(
        Indexer::new(&VowelEmbedder, config),
        Err(RagError::Config(_))
    ));
}

#[tokio::test]
async fn ingest_stores_every_chunk() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut collection = open_collection(temp_dir.path(), false).await;
    let indexer = Indexer::new(&VowelEmbedder, small_chunks()).expect("should build indexer");

    let documents = corpus();
    let expected_chunks: usize = documents
        .iter()
        .map(|d| {
            chunk_document(d, &small_chunks())
                .expect("chunking should succeed")
                .len()
        })
        .sum();

    let stats = indexer
        .ingest(&mut collection, &documents)
        .await
        .expect("ingestion should succeed");

    assert_eq!(stats.documents_processed, 2);
    assert_eq!(stats.documents_skipped, 1);
    assert_eq!(stats.chunks_created, expected_chunks);
    assert_eq!(stats.total_records, expected_chunks);

    let ids = all_ids(&collection).await;
    assert_eq!(ids.len(), expected_chunks);
    for n in 0..expected_chunks {
        assert!(ids.contains(&format!("document_{}", n)));
    }

    let recorded = collection
        .ingested_documents()
        .await
        .expect("should list documents");
    let titles: Vec<&str> = recorded.iter().map(|d| d.title.as_str()).collect();
    assert_eq!(titles, vec!["Overfitting", "Random forest"]);
}

#[tokio::test]
async fn rebuild_yields_same_count() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let indexer = Indexer::new(&VowelEmbedder, small_chunks()).expect("should build indexer");

    let mut first = open_collection(temp_dir.path(), true).await;
    let first_stats = indexer
        .ingest(&mut first, &corpus())
        .await
        .expect("first ingestion should succeed");
    drop(first);

    let mut second = open_collection(temp_dir.path(), true).await;
    let second_stats = indexer
        .ingest(&mut second, &corpus())
        .await
        .expect("second ingestion should succeed");

    assert_eq!(first_stats.total_records, second_stats.total_records);
    assert_eq!(first_stats, second_stats);
}

#[tokio::test]
async fn appending_runs_never_reuse_ids() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let indexer = Indexer::new(&VowelEmbedder, small_chunks()).expect("should build indexer");

    let mut collection = open_collection(temp_dir.path(), false).await;
    let first = indexer
        .ingest(&mut collection, &corpus())
        .await
        .expect("first ingestion should succeed");
    drop(collection);

    let mut collection = open_collection(temp_dir.path(), false).await;
    let second = indexer
        .ingest(&mut collection, &corpus())
        .await
        .expect("second ingestion should succeed");

    assert_eq!(second.total_records, first.total_records * 2);
    assert_eq!(all_ids(&collection).await.len(), second.total_records);
}

#[tokio::test]
async fn embedding_failure_aborts_run() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut collection = open_collection(temp_dir.path(), false).await;
    let embedder = FlakyEmbedder {
        healthy_calls: 1,
        calls: AtomicUsize::new(0),
    };
    let indexer = Indexer::new(&embedder, small_chunks()).expect("should build indexer");

    let mut seen = Vec::new();
    let result = indexer
        .ingest_with_progress(&mut collection, &corpus(), |document, _| {
            seen.push(document.title.clone());
        })
        .await;

    assert!(matches!(result, Err(RagError::Embedding(_))));
    // The empty document never reaches the embedder, so the third one fails
    assert_eq!(seen, vec!["Overfitting", "Empty"]);

    let stored = collection.count().await.expect("should count");
    let first_chunks = chunk_document(&corpus()[0], &small_chunks())
        .expect("chunking should succeed")
        .len();
    assert_eq!(stored, first_chunks);
}

#[tokio::test]
async fn dimension_mismatch_is_rejected_up_front() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut collection = Collection::open_or_create(
        temp_dir.path(),
        "wiki_pages",
        &CollectionOptions::new(DIMENSION + 1),
        false,
    )
    .await
    .expect("should open collection");
    let indexer = Indexer::new(&VowelEmbedder, small_chunks()).expect("should build indexer");

    let result = indexer.ingest(&mut collection, &corpus()).await;
    assert!(matches!(result, Err(RagError::Config(_))));
    assert_eq!(collection.count().await.expect("should count"), 0);
}
