
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::lancedb::vector_store::VectorStore;
use super::lancedb::{DistanceMetric, SearchHit, VectorRecord, record_id};
use super::sqlite::Catalog;
use super::sqlite::models::{CollectionEntry, IngestedDocument, NewCollection, NewIngestedDocument};
use crate::{RagError, Result};

/// Settings applied when a collection is first created
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionOptions {
    pub distance: DistanceMetric,
    pub dimension: usize,
}

impl CollectionOptions {
    #[inline]
    pub fn new(dimension: usize) -> Self {
        Self {
            distance: DistanceMetric::Cosine,
            dimension,
        }
    }
}

/// A contiguous block of counter values handed out by the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservedIds {
    pub first: u64,
    pub count: u64,
}

impl ReservedIds {
    /// Record ids in reservation order
    #[inline]
    pub fn ids(&self) -> impl Iterator<Item = String> + use<> {
        (self.first..self.first + self.count).map(record_id)
    }
}

/// Named persistent set of vector records plus its catalog entry
pub struct Collection {
    name: String,
    path: PathBuf,
    store: VectorStore,
    catalog: Catalog,
}

impl Collection {
    /// Open the collection, creating it when absent
    ///
    /// With `delete_existing` the whole directory at `path` is removed first, which destroys
    /// every collection stored there together with its id counter.
    #[inline]
    pub async fn open_or_create(
        path: &Path,
        name: &str,
        options: &CollectionOptions,
        delete_existing: bool,
    ) -> Result<Self> {
        if delete_existing && path.exists() {
            info!("Deleting existing vector database at {}", path.display());
            std::fs::remove_dir_all(path).map_err(|e| {
                RagError::Database(format!(
                    "Failed to delete vector database at {}: {}",
                    path.display(),
                    e
                ))
            })?;
        }

        let connection = VectorStore::connect(path).await?;
        let catalog = open_catalog(path, name).await?;
        let entry = catalog
            .get_collection(name)
            .await
            .map_err(|e| located(path, name, &format!("{:#}", e)))?;

        let store = if VectorStore::table_exists(&connection, name).await? {
            let distance = entry.as_ref().map_or(options.distance, |e| e.distance_metric);
            let store = VectorStore::open(&connection, name, distance).await?;
            if store.dimension() != options.dimension {
                warn!(
                    "Collection '{}' stores {}-dimensional vectors but {} were requested; keeping the existing collection",
                    name,
                    store.dimension(),
                    options.dimension
                );
            }
            debug!("Reusing existing collection '{}'", name);
            store
        } else {
            let distance = entry.as_ref().map_or(options.distance, |e| e.distance_metric);
            let dimension = entry.as_ref().map_or(options.dimension, CollectionEntry::dimension);
            VectorStore::create(&connection, name, dimension, distance).await?
        };

        let collection = Self {
            name: name.to_string(),
            path: path.to_path_buf(),
            store,
            catalog,
        };
        collection.sync_catalog(entry).await?;

        info!(
            "Collection '{}' ready at {} ({} records)",
            name,
            path.display(),
            collection.count().await?
        );
        Ok(collection)
    }

    /// Open a collection that must already exist
    #[inline]
    pub async fn open_existing(path: &Path, name: &str) -> Result<Self> {
        if !path.exists() {
            return Err(RagError::NotFound(format!(
                "Vector database directory {} does not exist",
                path.display()
            )));
        }

        let connection = VectorStore::connect(path).await?;
        if !VectorStore::table_exists(&connection, name).await? {
            return Err(RagError::NotFound(format!(
                "Collection '{}' does not exist at {}",
                name,
                path.display()
            )));
        }

        let catalog = open_catalog(path, name).await?;
        let entry = catalog
            .get_collection(name)
            .await
            .map_err(|e| located(path, name, &format!("{:#}", e)))?;

        let distance = match &entry {
            Some(entry) => entry.distance_metric,
            None => {
                warn!(
                    "Collection '{}' has no catalog entry, assuming {} distance",
                    name,
                    DistanceMetric::default()
                );
                DistanceMetric::default()
            }
        };

        let store = VectorStore::open(&connection, name, distance).await?;
        let collection = Self {
            name: name.to_string(),
            path: path.to_path_buf(),
            store,
            catalog,
        };
        collection.sync_catalog(entry).await?;

        Ok(collection)
    }

    /// Make sure the catalog has an entry whose counter is at least the row count
    async fn sync_catalog(&self, entry: Option<CollectionEntry>) -> Result<()> {
        let rows = u64::try_from(self.count().await?).unwrap_or(u64::MAX);

        match entry {
            Some(_) => {
                self.catalog
                    .raise_counter(&self.name, rows)
                    .await
                    .map_err(|e| self.database_error(&format!("{:#}", e)))?;
            }
            None => {
                let dimension = u32::try_from(self.store.dimension()).map_err(|_| {
                    RagError::Config(format!(
                        "Embedding dimension {} is too large",
                        self.store.dimension()
                    ))
                })?;
                self.catalog
                    .create_collection(NewCollection {
                        name: self.name.clone(),
                        distance_metric: self.store.distance(),
                        dimension,
                        next_record_id: rows,
                    })
                    .await
                    .map_err(|e| self.database_error(&format!("{:#}", e)))?;
            }
        }

        Ok(())
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.store.dimension()
    }

    #[inline]
    pub fn distance(&self) -> DistanceMetric {
        self.store.distance()
    }

    /// Append records in one store write
    #[inline]
    pub async fn insert(&mut self, records: &[VectorRecord]) -> Result<()> {
        self.store
            .insert(records)
            .await
            .map_err(|e| self.locate(e))
    }

    /// Up to `k` nearest records, in store order
    #[inline]
    pub async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        self.store
            .search(embedding, k)
            .await
            .map_err(|e| self.locate(e))
    }

    #[inline]
    pub async fn count(&self) -> Result<usize> {
        self.store.count().await.map_err(|e| self.locate(e))
    }

    /// Reserve `n` never-used record ids from the persisted counter
    #[inline]
    pub async fn reserve_ids(&mut self, n: usize) -> Result<ReservedIds> {
        let count = u64::try_from(n).unwrap_or(u64::MAX);
        let first = self
            .catalog
            .reserve_ids(&self.name, count)
            .await
            .map_err(|e| self.database_error(&format!("{:#}", e)))?;

        Ok(ReservedIds { first, count })
    }

    /// Counter value the next reservation will start from
    #[inline]
    pub async fn next_record_id(&self) -> Result<u64> {
        let entry = self
            .catalog
            .get_collection(&self.name)
            .await
            .map_err(|e| self.database_error(&format!("{:#}", e)))?
            .ok_or_else(|| self.database_error("catalog entry disappeared"))?;

        Ok(entry.next_record_id())
    }

    #[inline]
    pub async fn record_document(
        &self,
        title: &str,
        reserved: ReservedIds,
    ) -> Result<IngestedDocument> {
        self.catalog
            .record_document(NewIngestedDocument {
                collection: self.name.clone(),
                title: title.to_string(),
                chunk_count: reserved.count,
                first_record_id: reserved.first,
            })
            .await
            .map_err(|e| self.database_error(&format!("{:#}", e)))
    }

    #[inline]
    pub async fn ingested_documents(&self) -> Result<Vec<IngestedDocument>> {
        self.catalog
            .list_documents(&self.name)
            .await
            .map_err(|e| self.database_error(&format!("{:#}", e)))
    }

    fn database_error(&self, message: &str) -> RagError {
        located(&self.path, &self.name, message)
    }

    fn locate(&self, error: RagError) -> RagError {
        match error {
            RagError::Database(message) => self.database_error(&message),
            other => other,
        }
    }
}

async fn open_catalog(path: &Path, name: &str) -> Result<Catalog> {
    Catalog::open_in_dir(path)
        .await
        .map_err(|e| located(path, name, &format!("{:#}", e)))
}

fn located(path: &Path, name: &str, message: &str) -> RagError {
    RagError::Database(format!(
        "collection '{}' at {}: {}",
        name,
        path.display(),
        message
    ))
}
