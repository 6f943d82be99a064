use anyhow::{Context, Result};
use console::style;
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tracing::{info, warn};

use crate::config::{Config, ConfigError, RetrievalConfig};
use crate::corpus::load_corpus;
use crate::database::{Collection, CollectionOptions};
use crate::embeddings::OllamaClient;
use crate::indexer::{Indexer, IngestionStats};
use crate::llm::ChatClient;
use crate::prompt::{PromptBuilder, PromptLibrary, PromptTemplate};
use crate::response::ResponseService;
use crate::retrieval::{RetrievalResult, Retriever};

const CHAT_EXIT_COMMAND: &str = "exit";
const CHAT_CONFIG_COMMAND: &str = "config";

/// Load the corpus and (re)build the collection from it
#[inline]
pub async fn ingest(
    config: &Config,
    corpus_dir: Option<PathBuf>,
    keep_existing: bool,
) -> Result<IngestionStats> {
    let corpus_dir = corpus_dir.unwrap_or_else(|| config.corpus_path());
    let documents = load_corpus(&corpus_dir)
        .with_context(|| format!("Failed to load corpus from {}", corpus_dir.display()))?;

    if documents.is_empty() {
        println!("No .txt files found in {}", corpus_dir.display());
        return Ok(IngestionStats::default());
    }

    let embedder = OllamaClient::new(&config.ollama)?;
    embedder
        .health_check()
        .context("Ollama is not ready for embedding")?;

    let options = CollectionOptions {
        distance: config.collection.distance,
        dimension: config.ollama.embedding_dimension as usize,
    };
    let mut collection = Collection::open_or_create(
        &config.vector_database_path(),
        &config.collection.name,
        &options,
        !keep_existing,
    )
    .await?;

    let indexer = Indexer::new(&embedder, config.chunking.clone())?;

    let bar = if console::user_attended_stderr() {
        ProgressBar::new(documents.len() as u64).with_style(
            ProgressStyle::with_template("{bar:40} [{pos}/{len}] Ingesting {msg}")
                .context("invalid progress template")?,
        )
    } else {
        ProgressBar::hidden()
    };

    let stats = indexer
        .ingest_with_progress(&mut collection, &documents, |document, _| {
            bar.set_message(document.title.clone());
            bar.inc(1);
        })
        .await?;
    bar.finish_and_clear();

    println!("{}", style("✓ Ingestion completed").green());
    println!("  Documents ingested: {}", stats.documents_processed);
    if stats.documents_skipped > 0 {
        println!("  Empty documents skipped: {}", stats.documents_skipped);
    }
    println!("  Chunks stored: {}", stats.chunks_created);
    println!(
        "  Records in '{}': {}",
        collection.name(),
        stats.total_records
    );

    Ok(stats)
}

/// Print the passages retrieved for a query, closest first
#[inline]
pub async fn retrieve(
    config: &Config,
    query: &str,
    n_results: Option<usize>,
    threshold: Option<f32>,
) -> Result<()> {
    let (n_results, threshold) = retrieval_settings(config, n_results, threshold)?;
    let embedder = OllamaClient::new(&config.ollama)?;
    let collection = open_collection(config).await?;

    let result = Retriever::new(&collection, &embedder)
        .retrieve(query, n_results, threshold)
        .await?;

    print_retrieval(&result, threshold);
    Ok(())
}

/// Answer a single question
#[inline]
pub async fn ask(
    config: &Config,
    query: &str,
    n_results: Option<usize>,
    threshold: Option<f32>,
) -> Result<()> {
    let (n_results, threshold) = retrieval_settings(config, n_results, threshold)?;
    let embedder = OllamaClient::new(&config.ollama)?;
    let model = ChatClient::new(&config.llm)?;
    let collection = open_collection(config).await?;
    let template = load_template(config)?;
    let builder = PromptBuilder::new(config.reasoning_strategies.clone());

    let service = ResponseService::new(&collection, &embedder, &builder, &model);
    let context = service
        .answer_with_context(&template, query, n_results, threshold)
        .await?;

    if context.retrieval.is_empty() {
        println!(
            "{}",
            style("No passages passed the distance threshold.").yellow()
        );
    }
    println!("{}", context.answer);
    Ok(())
}

/// Interactive question loop
///
/// `config` changes the number of results and the threshold for the session,
/// `exit` leaves the loop.
#[inline]
pub async fn chat(config: &Config) -> Result<()> {
    let mut retrieval = config.retrieval.clone();
    let embedder = OllamaClient::new(&config.ollama)?;
    let model = ChatClient::new(&config.llm)?;
    let collection = open_collection(config).await?;
    let template = load_template(config)?;
    let builder = PromptBuilder::new(config.reasoning_strategies.clone());
    let service = ResponseService::new(&collection, &embedder, &builder, &model);

    println!("{}", style("💬 RAG Assistant").bold().cyan());
    println!(
        "Type a question, '{}' to change retrieval settings or '{}' to quit.",
        CHAT_CONFIG_COMMAND, CHAT_EXIT_COMMAND
    );
    println!();

    loop {
        let line: String = Input::new()
            .with_prompt("You")
            .allow_empty(true)
            .interact_text()
            .context("Failed to read input")?;
        let line = line.trim();

        match line {
            "" => {}
            CHAT_EXIT_COMMAND => break,
            CHAT_CONFIG_COMMAND => {
                let n_results: usize = Input::new()
                    .with_prompt("Number of results")
                    .default(retrieval.n_results)
                    .interact_text()?;
                let threshold: f32 = Input::new()
                    .with_prompt("Distance threshold")
                    .default(retrieval.threshold)
                    .interact_text()?;

                match updated_retrieval(&retrieval, n_results, threshold) {
                    Ok(updated) => {
                        retrieval = updated;
                        println!(
                            "{}",
                            style(format!(
                                "✓ Using k = {}, threshold = {}",
                                retrieval.n_results, retrieval.threshold
                            ))
                            .green()
                        );
                    }
                    Err(e) => println!("{}", style(format!("✗ {}", e)).red()),
                }
            }
            question => {
                match service
                    .answer(&template, question, retrieval.n_results, retrieval.threshold)
                    .await
                {
                    Ok(answer) => println!("{} {}", style("Assistant:").bold().green(), answer),
                    Err(e) => {
                        warn!("Failed to answer question: {}", e);
                        println!("{}", style(format!("✗ {}", e)).red());
                    }
                }
            }
        }
        println!();
    }

    info!("Chat session ended");
    Ok(())
}

/// Print the prompt template used for answers
#[inline]
pub fn show_prompt(config: &Config) -> Result<()> {
    let template = load_template(config)?;

    eprintln!(
        "{}",
        style("⚠ Warning: exposing system prompts is unsafe in production; use this for debugging only.")
            .yellow()
            .bold()
    );
    println!(
        "{}",
        style(format!("Template '{}'", config.prompt.template)).bold()
    );
    println!();
    println!(
        "{}",
        toml::to_string_pretty(&template).context("Failed to render prompt template")?
    );
    Ok(())
}

/// Show collection size, id counter and ingested documents
#[inline]
pub async fn show_status(config: &Config) -> Result<()> {
    println!("📊 RAG Assistant Status");
    println!("{}", "=".repeat(50));
    println!();

    println!("🗄️  Collection:");
    match Collection::open_existing(&config.vector_database_path(), &config.collection.name).await
    {
        Ok(collection) => {
            println!("   Name: {}", collection.name());
            println!("   Path: {}", collection.path().display());
            println!("   Distance: {}", collection.distance());
            println!("   Dimension: {}", collection.dimension());
            println!("   Records: {}", collection.count().await?);
            println!("   Next record id: {}", collection.next_record_id().await?);

            let documents = collection.ingested_documents().await?;
            println!("   Ingested documents: {}", documents.len());
            for document in &documents {
                let range = document.record_range();
                println!(
                    "     - {} ({} chunks, ids {}..{}, {})",
                    document.title,
                    document.chunk_count,
                    range.start,
                    range.end,
                    document.ingested_at.format("%Y-%m-%d %H:%M:%S")
                );
            }
        }
        Err(e) => {
            println!("   ❌ Not available - {}", e);
            println!("   Run 'rag-assistant ingest' to build it.");
        }
    }
    println!();

    println!("🤖 Ollama:");
    match OllamaClient::new(&config.ollama).and_then(|client| client.health_check()) {
        Ok(()) => {
            println!("   ✅ Connected ({})", config.ollama.ollama_url()?);
            println!("   📋 Model: {}", config.ollama.model);
        }
        Err(e) => println!("   ❌ Unavailable - {}", e),
    }
    println!();

    println!("💬 Language model:");
    println!("   Model: {}", config.llm.model);
    match config.llm.api_key() {
        Ok(_) => println!("   ✅ {} is set", config.llm.api_key_env),
        Err(_) => println!("   ⚠️  {} is not set", config.llm.api_key_env),
    }

    Ok(())
}

fn updated_retrieval(
    current: &RetrievalConfig,
    n_results: usize,
    threshold: f32,
) -> std::result::Result<RetrievalConfig, ConfigError> {
    let mut updated = current.clone();
    updated.set_n_results(n_results)?;
    updated.set_threshold(threshold)?;
    Ok(updated)
}

fn retrieval_settings(
    config: &Config,
    n_results: Option<usize>,
    threshold: Option<f32>,
) -> Result<(usize, f32)> {
    let mut retrieval = config.retrieval.clone();
    if let Some(n_results) = n_results {
        retrieval.set_n_results(n_results)?;
    }
    if let Some(threshold) = threshold {
        retrieval.set_threshold(threshold)?;
    }
    Ok((retrieval.n_results, retrieval.threshold))
}

async fn open_collection(config: &Config) -> Result<Collection> {
    Collection::open_existing(&config.vector_database_path(), &config.collection.name)
        .await
        .context("Collection is not available; run 'rag-assistant ingest' first")
}

fn load_template(config: &Config) -> Result<PromptTemplate> {
    let library = PromptLibrary::load_or_default(&config.prompts_file_path())?;
    Ok(library.get(&config.prompt.template)?.clone())
}

fn print_retrieval(result: &RetrievalResult, threshold: f32) {
    if result.is_empty() {
        println!("No passages found below distance {}", threshold);
        return;
    }

    println!(
        "{}",
        style(format!("Retrieved {} passages:", result.len())).bold()
    );
    for (rank, chunk) in result.sorted_by_distance().iter().enumerate() {
        println!();
        println!(
            "{}. {} [{}] distance {:.4}",
            rank + 1,
            style(&chunk.source).cyan(),
            chunk.id,
            chunk.distance
        );
        println!("{}", chunk.text);
    }
}
