// Embeddings module
// Text chunking and the embedding backends that turn chunks into vectors

pub mod chunking;
pub mod ollama;

pub use chunking::{ChunkingConfig, ContentChunk, chunk_document, chunk_text};
pub use ollama::OllamaClient;

use crate::{RagError, Result};

/// Maps text to fixed-dimension vectors.
///
/// The same embedder must be used for ingestion and for queries, otherwise
/// distances between corpus and query vectors are meaningless.
pub trait Embedder: Send + Sync {
    /// Embed each text, preserving input order. An empty input yields an empty output.
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Length of every vector this embedder produces
    fn dimension(&self) -> usize;

    fn model_name(&self) -> &str;

    /// Embed a single text
    #[inline]
    fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(&[text.to_string()])?
            .pop()
            .ok_or_else(|| RagError::Embedding("Embedder returned no vector".to_string()))
    }
}
