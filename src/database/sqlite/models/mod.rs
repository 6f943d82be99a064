
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::database::lancedb::DistanceMetric;

/// Catalog row for one vector collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct CollectionEntry {
    pub name: String,
    pub distance_metric: DistanceMetric,
    pub dimension: i64,
    /// Counter value the next reserved record id will use
    pub next_record_id: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCollection {
    pub name: String,
    pub distance_metric: DistanceMetric,
    pub dimension: u32,
    /// Starting counter value, normally the row count of an existing table
    pub next_record_id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct IngestedDocument {
    pub id: i64,
    pub collection: String,
    pub title: String,
    pub chunk_count: i64,
    pub first_record_id: i64,
    pub ingested_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewIngestedDocument {
    pub collection: String,
    pub title: String,
    pub chunk_count: u64,
    pub first_record_id: u64,
}

impl CollectionEntry {
    #[inline]
    pub fn dimension(&self) -> usize {
        usize::try_from(self.dimension).unwrap_or(0)
    }

    #[inline]
    pub fn next_record_id(&self) -> u64 {
        u64::try_from(self.next_record_id).unwrap_or(0)
    }
}

impl IngestedDocument {
    /// Counter values covered by this document's records
    #[inline]
    pub fn record_range(&self) -> std::ops::Range<i64> {
        self.first_record_id..self.first_record_id + self.chunk_count
    }
}
