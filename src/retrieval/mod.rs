// Retrieval module
// Query embedding, nearest-neighbour search and distance threshold filtering


use tracing::debug;

use crate::database::{Collection, SearchHit};
use crate::embeddings::Embedder;
use crate::{RagError, Result};

/// A retrieved passage
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub id: String,
    pub text: String,
    pub source: String,
    /// Distance to the query, lower is more similar
    pub distance: f32,
}

/// Passages that survived the threshold, in store order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievalResult {
    pub chunks: Vec<RetrievedChunk>,
}

impl RetrievalResult {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Passage texts, one per chunk
    #[inline]
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.chunks.iter().map(|chunk| chunk.text.as_str())
    }

    /// Copy of the chunks ordered by ascending distance, for display
    #[inline]
    pub fn sorted_by_distance(&self) -> Vec<RetrievedChunk> {
        let mut chunks = self.chunks.clone();
        chunks.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        chunks
    }
}

impl From<SearchHit> for RetrievedChunk {
    #[inline]
    fn from(hit: SearchHit) -> Self {
        Self {
            id: hit.id,
            text: hit.text,
            source: hit.source,
            distance: hit.distance,
        }
    }
}

/// Finds passages close to a query in one collection
pub struct Retriever<'a> {
    collection: &'a Collection,
    embedder: &'a dyn Embedder,
}

impl<'a> Retriever<'a> {
    #[inline]
    pub fn new(collection: &'a Collection, embedder: &'a dyn Embedder) -> Self {
        Self {
            collection,
            embedder,
        }
    }

    /// Return up to `n_results` passages whose distance is strictly below `threshold`
    #[inline]
    pub async fn retrieve(
        &self,
        query: &str,
        n_results: usize,
        threshold: f32,
    ) -> Result<RetrievalResult> {
        if n_results == 0 {
            return Err(RagError::Config(
                "n_results must be greater than 0".to_string(),
            ));
        }
        if threshold.is_nan() || threshold < 0.0 {
            return Err(RagError::Config(format!(
                "threshold must be non-negative, got {}",
                threshold
            )));
        }

        let embedding = self.embedder.embed_one(query)?;
        let hits = self.collection.query(&embedding, n_results).await?;
        let candidates = hits.len();

        let chunks: Vec<RetrievedChunk> = hits
            .into_iter()
            .filter(|hit| hit.distance < threshold)
            .map(RetrievedChunk::from)
            .collect();

        debug!(
            "Retrieved {} of {} candidates below distance {}",
            chunks.len(),
            candidates,
            threshold
        );
        Ok(RetrievalResult { chunks })
    }
}
