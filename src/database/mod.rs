// Database module
// Vector tables live in LanceDB; the collection catalog and id counters live in SQLite

pub mod collection;
pub mod lancedb;
pub mod sqlite;

pub use collection::{Collection, CollectionOptions, ReservedIds};
pub use self::lancedb::{DistanceMetric, SearchHit, VectorRecord, record_id};
pub use sqlite::Catalog;
