// LanceDB vector database module
// Handles vector storage and similarity search for chunk embeddings

#[cfg(test)]
mod tests;

pub mod vector_store;

use serde::{Deserialize, Serialize};
use sqlx::Type;
use std::fmt;
use std::str::FromStr;

use crate::RagError;

/// Chunk embedding stored in a collection table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    /// `document_<n>`, unique for the lifetime of the collection
    pub id: String,
    pub embedding: Vec<f32>,
    /// The chunk text, returned verbatim by searches
    pub text: String,
    /// Title of the document the chunk was cut from
    pub source: String,
    /// Position of the chunk within its document
    pub chunk_index: u32,
}

/// A stored record matched by a similarity search
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub id: String,
    pub text: String,
    pub source: String,
    pub chunk_index: u32,
    /// Distance under the collection metric, lower is closer
    pub distance: f32,
}

/// Distance metric fixed when a collection is created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum DistanceMetric {
    #[default]
    Cosine,
    L2,
    Dot,
}

impl DistanceMetric {
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "cosine",
            DistanceMetric::L2 => "l2",
            DistanceMetric::Dot => "dot",
        }
    }

    #[inline]
    pub fn distance_type(self) -> lancedb::DistanceType {
        match self {
            DistanceMetric::Cosine => lancedb::DistanceType::Cosine,
            DistanceMetric::L2 => lancedb::DistanceType::L2,
            DistanceMetric::Dot => lancedb::DistanceType::Dot,
        }
    }
}

impl fmt::Display for DistanceMetric {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistanceMetric {
    type Err = RagError;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cosine" => Ok(DistanceMetric::Cosine),
            "l2" => Ok(DistanceMetric::L2),
            "dot" => Ok(DistanceMetric::Dot),
            other => Err(RagError::Config(format!(
                "Unknown distance metric '{}' (expected cosine, l2 or dot)",
                other
            ))),
        }
    }
}

/// Render a record id from its counter value
#[inline]
pub fn record_id(n: u64) -> String {
    format!("document_{}", n)
}
