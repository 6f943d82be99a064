use clap::{Parser, Subcommand};
use rag_assistant::Result;
use rag_assistant::commands::{ask, chat, ingest, retrieve, show_prompt, show_status};
use rag_assistant::config::settings::LOG_DIR_NAME;
use rag_assistant::config::{Config, resolve_data_dir, run_interactive_config, show_config};
use rag_assistant::logging;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rag-assistant")]
#[command(about = "Retrieval-augmented question answering over a local text corpus")]
#[command(version)]
struct Cli {
    /// Directory holding configuration, corpus, vector database and logs
    #[arg(long, global = true, env = "RAG_ASSISTANT_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure Ollama, the language model and retrieval settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Chunk, embed and store the corpus
    Ingest {
        /// Directory of .txt files; defaults to <data-dir>/data
        #[arg(long)]
        corpus: Option<PathBuf>,
        /// Append to the existing collection instead of rebuilding it
        #[arg(long)]
        keep_existing: bool,
    },
    /// Show the passages retrieved for a query
    Retrieve {
        query: String,
        /// Number of nearest neighbours to request
        #[arg(short = 'k', long)]
        n_results: Option<usize>,
        /// Keep only passages with a distance strictly below this value
        #[arg(long)]
        threshold: Option<f32>,
    },
    /// Answer a single question
    Ask {
        query: String,
        #[arg(short = 'k', long)]
        n_results: Option<usize>,
        #[arg(long)]
        threshold: Option<f32>,
    },
    /// Start an interactive question session
    Chat,
    /// Print the prompt template used for answers
    Prompt,
    /// Show the state of the collection and external services
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let data_dir = resolve_data_dir(cli.data_dir)?;

    logging::init(&data_dir.join(LOG_DIR_NAME));

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&data_dir)?;
            } else {
                run_interactive_config(&data_dir)?;
            }
        }
        Commands::Ingest {
            corpus,
            keep_existing,
        } => {
            let config = Config::load(&data_dir)?;
            ingest(&config, corpus, keep_existing).await?;
        }
        Commands::Retrieve {
            query,
            n_results,
            threshold,
        } => {
            let config = Config::load(&data_dir)?;
            retrieve(&config, &query, n_results, threshold).await?;
        }
        Commands::Ask {
            query,
            n_results,
            threshold,
        } => {
            let config = Config::load(&data_dir)?;
            ask(&config, &query, n_results, threshold).await?;
        }
        Commands::Chat => {
            let config = Config::load(&data_dir)?;
            chat(&config).await?;
        }
        Commands::Prompt => {
            let config = Config::load(&data_dir)?;
            show_prompt(&config)?;
        }
        Commands::Status => {
            let config = Config::load(&data_dir)?;
            show_status(&config).await?;
        }
    }

    Ok(())
}
