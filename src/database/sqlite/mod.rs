use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use tracing::{debug, info};

use crate::database::sqlite::models::{
    CollectionEntry, IngestedDocument, NewCollection, NewIngestedDocument,
};
use crate::database::sqlite::queries::{CollectionQueries, IngestedDocumentQueries};

#[cfg(test)]
mod tests;

pub mod models;
pub mod queries;

pub type DbPool = Pool<Sqlite>;

pub const CATALOG_FILE_NAME: &str = "catalog.db";

/// SQLite catalog of collections, their id counters and ingested documents
#[derive(Debug, Clone)]
pub struct Catalog {
    pool: DbPool,
}

impl Catalog {
    pub async fn new<P: AsRef<Path>>(database_path: P) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .context("Failed to create catalog connection pool")?;

        let catalog = Self { pool };
        catalog.run_migrations().await?;

        Ok(catalog)
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<()> {
        debug!("Running catalog migrations");

        sqlx::migrate!("src/database/sqlite/migrations")
            .run(&self.pool)
            .await
            .context("Failed to run catalog migration")?;

        Ok(())
    }

    /// Open `catalog.db` inside the vector database directory
    pub async fn open_in_dir(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir).with_context(|| {
            format!("Failed to create catalog directory: {}", dir.display())
        })?;

        let catalog = Self::new(dir.join(CATALOG_FILE_NAME)).await?;
        info!("Opened collection catalog in {}", dir.display());
        Ok(catalog)
    }

    // Collection operations
    pub async fn get_collection(&self, name: &str) -> Result<Option<CollectionEntry>> {
        CollectionQueries::get_by_name(&self.pool, name).await
    }

    pub async fn create_collection(&self, collection: NewCollection) -> Result<CollectionEntry> {
        CollectionQueries::create(&self.pool, collection).await
    }

    pub async fn list_collections(&self) -> Result<Vec<CollectionEntry>> {
        CollectionQueries::list_all(&self.pool).await
    }

    pub async fn raise_counter(&self, name: &str, floor: u64) -> Result<u64> {
        CollectionQueries::raise_counter(&self.pool, name, floor).await
    }

    pub async fn reserve_ids(&self, name: &str, count: u64) -> Result<u64> {
        CollectionQueries::reserve_ids(&self.pool, name, count).await
    }

    // Ingested document operations
    pub async fn record_document(&self, document: NewIngestedDocument) -> Result<IngestedDocument> {
        IngestedDocumentQueries::create(&self.pool, document).await
    }

    pub async fn list_documents(&self, collection: &str) -> Result<Vec<IngestedDocument>> {
        IngestedDocumentQueries::list_by_collection(&self.pool, collection).await
    }

    pub async fn count_documents(&self, collection: &str) -> Result<u64> {
        IngestedDocumentQueries::count_by_collection(&self.pool, collection).await
    }

    /// Close the pool so the database file can be removed
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
