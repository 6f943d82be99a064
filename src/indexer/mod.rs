// Indexer module
// Turns documents into chunk embeddings stored in a collection

#[cfg(test)]
mod tests;

use tracing::{debug, info, warn};

use crate::corpus::Document;
use crate::database::{Collection, VectorRecord};
use crate::embeddings::{ChunkingConfig, Embedder, chunk_document};
use crate::{RagError, Result};

/// Ingestion pipeline: chunk, embed, reserve ids, store, record
pub struct Indexer<'a> {
    embedder: &'a dyn Embedder,
    chunking_config: ChunkingConfig,
}

/// Statistics about one ingestion run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestionStats {
    pub documents_processed: usize,
    /// Documents with no text left after trimming
    pub documents_skipped: usize,
    pub chunks_created: usize,
    /// Records in the collection once the run finished
    pub total_records: usize,
}

impl<'a> Indexer<'a> {
    #[inline]
    pub fn new(embedder: &'a dyn Embedder, chunking_config: ChunkingConfig) -> Result<Self> {
        chunking_config.validate()?;
        Ok(Self {
            embedder,
            chunking_config,
        })
    }

    #[inline]
    pub fn chunking_config(&self) -> &ChunkingConfig {
        &self.chunking_config
    }

    /// Ingest documents in order; the first failure aborts the run
    #[inline]
    pub async fn ingest(
        &self,
        collection: &mut Collection,
        documents: &[Document],
    ) -> Result<IngestionStats> {
        self.ingest_with_progress(collection, documents, |_, _| {})
            .await
    }

    /// Like [`Indexer::ingest`], calling `on_document` after each document is stored
    #[inline]
    pub async fn ingest_with_progress<F>(
        &self,
        collection: &mut Collection,
        documents: &[Document],
        mut on_document: F,
    ) -> Result<IngestionStats>
    where
        F: FnMut(&Document, usize),
    {
        if self.embedder.dimension() != collection.dimension() {
            return Err(RagError::Config(format!(
                "Embedding model '{}' produces {} dimensions but collection '{}' stores {}",
                self.embedder.model_name(),
                self.embedder.dimension(),
                collection.name(),
                collection.dimension()
            )));
        }

        info!(
            "Ingesting {} documents into collection '{}'",
            documents.len(),
            collection.name()
        );

        let mut stats = IngestionStats::default();

        for document in documents {
            let stored = self.ingest_document(collection, document).await?;
            if stored == 0 {
                stats.documents_skipped += 1;
            } else {
                stats.documents_processed += 1;
                stats.chunks_created += stored;
            }
            on_document(document, stored);
        }

        stats.total_records = collection.count().await?;

        info!(
            "Ingestion finished: {} documents, {} chunks, {} records in '{}'",
            stats.documents_processed,
            stats.chunks_created,
            stats.total_records,
            collection.name()
        );
        Ok(stats)
    }

    async fn ingest_document(
        &self,
        collection: &mut Collection,
        document: &Document,
    ) -> Result<usize> {
        let chunks = chunk_document(document, &self.chunking_config)?;
        if chunks.is_empty() {
            warn!("Document '{}' has no text, skipping", document.title);
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.content.clone()).collect();
        let embeddings = self.embedder.embed(&texts)?;
        if embeddings.len() != chunks.len() {
            return Err(RagError::Embedding(format!(
                "Expected {} embeddings for '{}', got {}",
                chunks.len(),
                document.title,
                embeddings.len()
            )));
        }

        // Ids are taken before the write so a failed insert never leads to reuse
        let reserved = collection.reserve_ids(chunks.len()).await?;

        let records: Vec<VectorRecord> = reserved
            .ids()
            .zip(chunks)
            .zip(embeddings)
            .map(|((id, chunk), embedding)| -> Result<VectorRecord> {
                Ok(VectorRecord {
                    id,
                    embedding,
                    text: chunk.content,
                    source: chunk.source,
                    chunk_index: u32::try_from(chunk.chunk_index).map_err(|_| {
                        RagError::Config(format!(
                            "Document '{}' has too many chunks",
                            document.title
                        ))
                    })?,
                })
            })
            .collect::<Result<_>>()?;

        collection.insert(&records).await?;
        collection.record_document(&document.title, reserved).await?;

        debug!(
            "Stored {} chunks for '{}' starting at id {}",
            records.len(),
            document.title,
            reserved.first
        );
        Ok(records.len())
    }
}
