#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// End-to-end ingestion and question answering over an on-disk corpus,
// with in-process embedding and completion models

use rag_assistant::corpus::load_corpus;
use rag_assistant::database::{Collection, CollectionOptions};
use rag_assistant::embeddings::{ChunkingConfig, Embedder};
use rag_assistant::indexer::Indexer;
use rag_assistant::llm::CompletionModel;
use rag_assistant::prompt::{PromptBuilder, PromptLibrary};
use rag_assistant::response::{NO_DOCUMENTS_NOTICE, ResponseService};
use rag_assistant::retrieval::Retriever;
use rag_assistant::{RagError, Result};
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use tempfile::TempDir;

const KEYWORDS: [&str; 3] = ["gradient", "neuron", "paris"];
const COLLECTION: &str = "wiki_pages";

/// Counts keyword occurrences, one dimension per keyword
struct KeywordEmbedder;

impl Embedder for KeywordEmbedder {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let lower = text.to_lowercase();
                KEYWORDS
                    .iter()
                    .map(|keyword| lower.matches(keyword).count() as f32 + 0.01)
                    .collect()
            })
            .collect())
    }

    fn dimension(&self) -> usize {
        KEYWORDS.len()
    }

    fn model_name(&self) -> &str {
        "keywords"
    }
}

#[derive(Default)]
struct RecordingModel {
    prompts: Mutex<Vec<String>>,
}

impl CompletionModel for RecordingModel {
    fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts
            .lock()
            .map_err(|_| RagError::Llm("poisoned".to_string()))?
            .push(prompt.to_string());
        Ok("Gradient descent walks downhill.".to_string())
    }
}

fn write_corpus(dir: &Path) {
    fs::create_dir_all(dir).expect("should create corpus dir");
    fs::write(
        dir.join("Gradient_descent.txt"),
        "Gradient descent is an optimisation algorithm. The gradient points uphill.",
    )
    .expect("should write corpus file");
    fs::write(
        dir.join("Neural_network.txt"),
        "A neural network is built from neurons. Each neuron applies an activation.",
    )
    .expect("should write corpus file");
    fs::write(dir.join("Empty.txt"), "   \n").expect("should write corpus file");
    fs::write(dir.join("notes.md"), "gradient gradient").expect("should write other file");
}

async fn open(db_path: &Path, delete_existing: bool) -> Collection {
    Collection::open_or_create(
        db_path,
        COLLECTION,
        &CollectionOptions::new(KEYWORDS.len()),
        delete_existing,
    )
    .await
    .expect("should open collection")
}

#[tokio::test]
async fn ingest_then_answer() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let corpus_dir = temp_dir.path().join("data");
    let db_path = temp_dir.path().join("vector_db");
    write_corpus(&corpus_dir);

    let documents = load_corpus(&corpus_dir).expect("corpus should load");
    let titles: Vec<&str> = documents.iter().map(|d| d.title.as_str()).collect();
    assert_eq!(titles, vec!["Empty", "Gradient_descent", "Neural_network"]);

    let embedder = KeywordEmbedder;
    let indexer =
        Indexer::new(&embedder, ChunkingConfig::default()).expect("indexer should build");
    let mut collection = open(&db_path, true).await;

    let stats = indexer
        .ingest(&mut collection, &documents)
        .await
        .expect("ingestion should succeed");
    assert_eq!(stats.documents_processed, 2);
    assert_eq!(stats.documents_skipped, 1);
    assert_eq!(stats.chunks_created, 2);
    assert_eq!(stats.total_records, 2);

    let retrieval = Retriever::new(&collection, &embedder)
        .retrieve("How does gradient descent work?", 5, 0.5)
        .await
        .expect("retrieval should succeed");
    assert_eq!(retrieval.len(), 1);
    assert_eq!(retrieval.chunks[0].id, "document_0");
    assert_eq!(retrieval.chunks[0].source, "Gradient_descent");

    let library = PromptLibrary::builtin();
    let template = library
        .get("rag_wiki_assistant_prompt")
        .expect("built-in template should exist");
    let builder = PromptBuilder::default();
    let model = RecordingModel::default();
    let service = ResponseService::new(&collection, &embedder, &builder, &model);

    let context = service
        .answer_with_context(template, "How does gradient descent work?", 5, 0.5)
        .await
        .expect("answer should succeed");
    assert_eq!(context.answer, "Gradient descent walks downhill.");
    assert!(context.prompt.contains("Gradient descent is an optimisation algorithm."));
    assert!(!context.prompt.contains("neural network"));

    let fallback = service
        .answer_with_context(template, "Where is Paris?", 5, 0.5)
        .await
        .expect("answer should succeed");
    assert!(fallback.retrieval.is_empty());
    assert!(fallback.prompt.contains(NO_DOCUMENTS_NOTICE));
    assert!(fallback.prompt.contains("Where is Paris?"));
    assert!(!fallback.prompt.contains("<<<BEGIN CONTENT>>>"));

    let prompts = model.prompts.lock().expect("lock should not be poisoned");
    assert_eq!(prompts.len(), 2);
}

#[tokio::test]
async fn ids_survive_restarts_until_rebuild() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let corpus_dir = temp_dir.path().join("data");
    let db_path = temp_dir.path().join("vector_db");
    write_corpus(&corpus_dir);

    let documents = load_corpus(&corpus_dir).expect("corpus should load");
    let embedder = KeywordEmbedder;
    let indexer =
        Indexer::new(&embedder, ChunkingConfig::default()).expect("indexer should build");

    {
        let mut collection = open(&db_path, true).await;
        indexer
            .ingest(&mut collection, &documents)
            .await
            .expect("ingestion should succeed");
    }

    // Restart: the counter continues where the first run stopped
    {
        let reopened = Collection::open_existing(&db_path, COLLECTION)
            .await
            .expect("collection should reopen");
        assert_eq!(reopened.count().await.expect("should count"), 2);
        assert_eq!(reopened.next_record_id().await.expect("should read counter"), 2);

        let ingested = reopened
            .ingested_documents()
            .await
            .expect("should list documents");
        let titles: Vec<&str> = ingested.iter().map(|d| d.title.as_str()).collect();
        assert_eq!(titles, vec!["Gradient_descent", "Neural_network"]);
    }

    {
        let mut appended = open(&db_path, false).await;
        let stats = indexer
            .ingest(&mut appended, &documents)
            .await
            .expect("second ingestion should succeed");
        assert_eq!(stats.total_records, 4);
        assert_eq!(appended.next_record_id().await.expect("should read counter"), 4);

        let hits = appended
            .query(&[1.0, 0.01, 0.01], 10)
            .await
            .expect("query should succeed");
        let mut ids: Vec<String> = hits.into_iter().map(|hit| hit.id).collect();
        ids.sort();
        assert_eq!(
            ids,
            vec!["document_0", "document_1", "document_2", "document_3"]
        );
    }

    // Rebuilding destroys the counter together with the records
    let mut rebuilt = open(&db_path, true).await;
    let stats = indexer
        .ingest(&mut rebuilt, &documents)
        .await
        .expect("rebuild should succeed");
    assert_eq!(stats.total_records, 2);
    assert_eq!(rebuilt.next_record_id().await.expect("should read counter"), 2);
}

#[tokio::test]
async fn querying_missing_collection_is_not_found() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    let result = Collection::open_existing(&temp_dir.path().join("vector_db"), COLLECTION).await;
    assert!(matches!(result, Err(RagError::NotFound(_))));

    let missing_corpus = load_corpus(&temp_dir.path().join("data"));
    assert!(matches!(missing_corpus, Err(RagError::NotFound(_))));
}
