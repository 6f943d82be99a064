
use super::models::*;
use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

const COLLECTION_COLUMNS: &str =
    "name, distance_metric, dimension, next_record_id, created_at, updated_at";
const DOCUMENT_COLUMNS: &str =
    "id, collection, title, chunk_count, first_record_id, ingested_at";

fn to_i64(value: u64, what: &str) -> Result<i64> {
    i64::try_from(value).with_context(|| format!("{} {} does not fit in SQLite INTEGER", what, value))
}

pub struct CollectionQueries;

impl CollectionQueries {
    #[inline]
    pub async fn create(pool: &SqlitePool, new_collection: NewCollection) -> Result<CollectionEntry> {
        let now = Utc::now().naive_utc();
        sqlx::query(
            "INSERT INTO collections (name, distance_metric, dimension, next_record_id, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&new_collection.name)
        .bind(new_collection.distance_metric)
        .bind(i64::from(new_collection.dimension))
        .bind(to_i64(new_collection.next_record_id, "Record counter")?)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to create collection '{}'", new_collection.name))?;

        Self::get_by_name(pool, &new_collection.name)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve created collection"))
    }

    #[inline]
    pub async fn get_by_name(pool: &SqlitePool, name: &str) -> Result<Option<CollectionEntry>> {
        let entry = sqlx::query_as::<_, CollectionEntry>(&format!(
            "SELECT {} FROM collections WHERE name = ?",
            COLLECTION_COLUMNS
        ))
        .bind(name)
        .fetch_optional(pool)
        .await
        .context("Failed to get collection by name")?;

        Ok(entry)
    }

    #[inline]
    pub async fn list_all(pool: &SqlitePool) -> Result<Vec<CollectionEntry>> {
        let entries = sqlx::query_as::<_, CollectionEntry>(&format!(
            "SELECT {} FROM collections ORDER BY name",
            COLLECTION_COLUMNS
        ))
        .fetch_all(pool)
        .await
        .context("Failed to list collections")?;

        Ok(entries)
    }

    /// Raise the counter to at least `floor`, never lowering it
    #[inline]
    pub async fn raise_counter(pool: &SqlitePool, name: &str, floor: u64) -> Result<u64> {
        let next: i64 = sqlx::query_scalar(
            "UPDATE collections SET next_record_id = MAX(next_record_id, ?), updated_at = ? \
             WHERE name = ? RETURNING next_record_id",
        )
        .bind(to_i64(floor, "Record counter")?)
        .bind(Utc::now().naive_utc())
        .bind(name)
        .fetch_optional(pool)
        .await
        .context("Failed to raise record counter")?
        .ok_or_else(|| anyhow::anyhow!("Collection '{}' is not in the catalog", name))?;

        Ok(u64::try_from(next).unwrap_or(0))
    }

    /// Atomically reserve `count` counter values, returning the first one
    #[inline]
    pub async fn reserve_ids(pool: &SqlitePool, name: &str, count: u64) -> Result<u64> {
        let count = to_i64(count, "Reservation size")?;
        let next: i64 = sqlx::query_scalar(
            "UPDATE collections SET next_record_id = next_record_id + ?, updated_at = ? \
             WHERE name = ? RETURNING next_record_id",
        )
        .bind(count)
        .bind(Utc::now().naive_utc())
        .bind(name)
        .fetch_optional(pool)
        .await
        .context("Failed to reserve record ids")?
        .ok_or_else(|| anyhow::anyhow!("Collection '{}' is not in the catalog", name))?;

        let first = next - count;
        debug!(
            "Reserved record ids {}..{} for collection '{}'",
            first, next, name
        );
        u64::try_from(first).context("Record counter went negative")
    }

    #[inline]
    pub async fn delete(pool: &SqlitePool, name: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM collections WHERE name = ?")
            .bind(name)
            .execute(pool)
            .await
            .context("Failed to delete collection")?;

        Ok(result.rows_affected() > 0)
    }
}

pub struct IngestedDocumentQueries;

impl IngestedDocumentQueries {
    #[inline]
    pub async fn create(
        pool: &SqlitePool,
        new_document: NewIngestedDocument,
    ) -> Result<IngestedDocument> {
        let id = sqlx::query(
            "INSERT INTO ingested_documents (collection, title, chunk_count, first_record_id, ingested_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&new_document.collection)
        .bind(&new_document.title)
        .bind(to_i64(new_document.chunk_count, "Chunk count")?)
        .bind(to_i64(new_document.first_record_id, "Record counter")?)
        .bind(Utc::now().naive_utc())
        .execute(pool)
        .await
        .with_context(|| format!("Failed to record document '{}'", new_document.title))?
        .last_insert_rowid();

        let document = sqlx::query_as::<_, IngestedDocument>(&format!(
            "SELECT {} FROM ingested_documents WHERE id = ?",
            DOCUMENT_COLUMNS
        ))
        .bind(id)
        .fetch_one(pool)
        .await
        .context("Failed to retrieve recorded document")?;

        Ok(document)
    }

    #[inline]
    pub async fn list_by_collection(
        pool: &SqlitePool,
        collection: &str,
    ) -> Result<Vec<IngestedDocument>> {
        let documents = sqlx::query_as::<_, IngestedDocument>(&format!(
            "SELECT {} FROM ingested_documents WHERE collection = ? ORDER BY id",
            DOCUMENT_COLUMNS
        ))
        .bind(collection)
        .fetch_all(pool)
        .await
        .context("Failed to list ingested documents")?;

        Ok(documents)
    }

    #[inline]
    pub async fn count_by_collection(pool: &SqlitePool, collection: &str) -> Result<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM ingested_documents WHERE collection = ?")
                .bind(collection)
                .fetch_one(pool)
                .await
                .context("Failed to count ingested documents")?;

        Ok(u64::try_from(count).unwrap_or(0))
    }
}
