
use super::{DistanceMetric, SearchHit, VectorRecord};
use crate::{RagError, Result};
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::{
    Connection, Table,
    query::{ExecutableQuery, QueryBase},
};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

const VECTOR_COLUMN: &str = "vector";

/// One LanceDB table holding the records of a collection
#[derive(Clone)]
pub struct VectorStore {
    table: Table,
    table_name: String,
    dimension: usize,
    distance: DistanceMetric,
}

impl VectorStore {
    /// Connect to the LanceDB database rooted at `path`, creating the directory
    #[inline]
    pub async fn connect(path: &Path) -> Result<Connection> {
        std::fs::create_dir_all(path).map_err(|e| {
            RagError::Database(format!(
                "Failed to create vector database directory {}: {}",
                path.display(),
                e
            ))
        })?;

        let uri = path.to_string_lossy();
        debug!("Connecting to LanceDB at {}", uri);

        lancedb::connect(&uri).execute().await.map_err(|e| {
            RagError::Database(format!(
                "Failed to connect to LanceDB at {}: {}",
                path.display(),
                e
            ))
        })
    }

    #[inline]
    pub async fn table_exists(connection: &Connection, table_name: &str) -> Result<bool> {
        let table_names = connection
            .table_names()
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to list tables: {}", e)))?;

        Ok(table_names.iter().any(|name| name == table_name))
    }

    /// Create an empty table with a fixed vector dimension
    #[inline]
    pub async fn create(
        connection: &Connection,
        table_name: &str,
        dimension: usize,
        distance: DistanceMetric,
    ) -> Result<Self> {
        if dimension == 0 {
            return Err(RagError::Config(
                "Embedding dimension must be greater than 0".to_string(),
            ));
        }

        info!(
            "Creating table '{}' with {} dimensions ({} distance)",
            table_name, dimension, distance
        );

        let schema = create_schema(vector_dimension_i32(dimension)?);
        let table = connection
            .create_empty_table(table_name, schema)
            .execute()
            .await
            .map_err(|e| {
                RagError::Database(format!("Failed to create table '{}': {}", table_name, e))
            })?;

        Ok(Self {
            table,
            table_name: table_name.to_string(),
            dimension,
            distance,
        })
    }

    /// Open an existing table, reading its dimension from the schema
    #[inline]
    pub async fn open(
        connection: &Connection,
        table_name: &str,
        distance: DistanceMetric,
    ) -> Result<Self> {
        if !Self::table_exists(connection, table_name).await? {
            return Err(RagError::NotFound(format!(
                "Vector table '{}' does not exist",
                table_name
            )));
        }

        let table = connection
            .open_table(table_name)
            .execute()
            .await
            .map_err(|e| {
                RagError::Database(format!("Failed to open table '{}': {}", table_name, e))
            })?;

        let dimension = detect_vector_dimension(&table).await?;
        debug!(
            "Opened table '{}' with {} dimensions",
            table_name, dimension
        );

        Ok(Self {
            table,
            table_name: table_name.to_string(),
            dimension,
            distance,
        })
    }

    #[inline]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn distance(&self) -> DistanceMetric {
        self.distance
    }

    /// Append records in a single write
    ///
    /// The whole batch is rejected when two records share an id or a vector has the wrong
    /// dimension; nothing is written in that case.
    #[inline]
    pub async fn insert(&mut self, records: &[VectorRecord]) -> Result<()> {
        if records.is_empty() {
            debug!("No records to store");
            return Ok(());
        }

        let mut seen = HashSet::with_capacity(records.len());
        for record in records {
            if !seen.insert(record.id.as_str()) {
                return Err(RagError::Database(format!(
                    "Duplicate record id '{}' in insert batch for table '{}'",
                    record.id, self.table_name
                )));
            }
            if record.embedding.len() != self.dimension {
                return Err(RagError::Database(format!(
                    "Record '{}' has {} dimensions, table '{}' expects {}",
                    record.id,
                    record.embedding.len(),
                    self.table_name,
                    self.dimension
                )));
            }
        }

        let record_batch = self.create_record_batch(records)?;
        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);

        self.table.add(reader).execute().await.map_err(|e| {
            RagError::Database(format!(
                "Failed to insert records into '{}': {}",
                self.table_name, e
            ))
        })?;

        debug!(
            "Stored {} records in '{}'",
            records.len(),
            self.table_name
        );
        Ok(())
    }

    fn create_record_batch(&self, records: &[VectorRecord]) -> Result<RecordBatch> {
        let len = records.len();

        let mut ids = Vec::with_capacity(len);
        let mut texts = Vec::with_capacity(len);
        let mut sources = Vec::with_capacity(len);
        let mut chunk_indices = Vec::with_capacity(len);
        let mut flat_values = Vec::with_capacity(len * self.dimension);

        for record in records {
            ids.push(record.id.as_str());
            texts.push(record.text.as_str());
            sources.push(record.source.as_str());
            chunk_indices.push(record.chunk_index);
            flat_values.extend_from_slice(&record.embedding);
        }

        let size = vector_dimension_i32(self.dimension)?;
        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let vector_array = FixedSizeListArray::try_new(
            field,
            size,
            Arc::new(Float32Array::from(flat_values)),
            None,
        )
        .map_err(|e| RagError::Database(format!("Failed to create vector array: {}", e)))?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(vector_array),
            Arc::new(StringArray::from(texts)),
            Arc::new(StringArray::from(sources)),
            Arc::new(UInt32Array::from(chunk_indices)),
        ];

        RecordBatch::try_new(create_schema(size), arrays)
            .map_err(|e| RagError::Database(format!("Failed to create record batch: {}", e)))
    }

    /// Up to `limit` nearest records, closest first
    #[inline]
    pub async fn search(&self, query_vector: &[f32], limit: usize) -> Result<Vec<SearchHit>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        if query_vector.len() != self.dimension {
            return Err(RagError::Database(format!(
                "Query vector has {} dimensions, table '{}' expects {}",
                query_vector.len(),
                self.table_name,
                self.dimension
            )));
        }

        if self.count().await? == 0 {
            debug!("Table '{}' is empty, skipping search", self.table_name);
            return Ok(Vec::new());
        }

        debug!(
            "Searching '{}' for {} nearest records",
            self.table_name, limit
        );

        let results = self
            .table
            .vector_search(query_vector)
            .map_err(|e| RagError::Database(format!("Failed to create vector search: {}", e)))?
            .column(VECTOR_COLUMN)
            .distance_type(self.distance.distance_type())
            .limit(limit)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to execute search: {}", e)))?;

        let batches: Vec<RecordBatch> = results
            .try_collect()
            .await
            .map_err(|e| RagError::Database(format!("Failed to read result stream: {}", e)))?;

        let mut hits = Vec::new();
        for batch in &batches {
            hits.extend(parse_search_batch(batch)?);
        }

        debug!("Search returned {} records", hits.len());
        Ok(hits)
    }

    #[inline]
    pub async fn count(&self) -> Result<usize> {
        self.table.count_rows(None).await.map_err(|e| {
            RagError::Database(format!(
                "Failed to count rows in '{}': {}",
                self.table_name, e
            ))
        })
    }
}

fn vector_dimension_i32(dimension: usize) -> Result<i32> {
    i32::try_from(dimension).map_err(|_| {
        RagError::Config(format!("Embedding dimension {} is too large", dimension))
    })
}

fn create_schema(size: i32) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new(
            VECTOR_COLUMN,
            DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), size),
            false,
        ),
        Field::new("text", DataType::Utf8, false),
        Field::new("source", DataType::Utf8, false),
        Field::new("chunk_index", DataType::UInt32, false),
    ]))
}

async fn detect_vector_dimension(table: &Table) -> Result<usize> {
    let schema = table
        .schema()
        .await
        .map_err(|e| RagError::Database(format!("Failed to get table schema: {}", e)))?;

    schema
        .fields()
        .iter()
        .find(|field| field.name() == VECTOR_COLUMN)
        .and_then(|field| match field.data_type() {
            DataType::FixedSizeList(_, size) => usize::try_from(*size).ok(),
            _ => None,
        })
        .ok_or_else(|| {
            RagError::Database("Could not find vector column or determine dimension".to_string())
        })
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| RagError::Database(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| RagError::Database(format!("Invalid {} column type", name)))
}

fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<SearchHit>> {
    let ids = string_column(batch, "id")?;
    let texts = string_column(batch, "text")?;
    let sources = string_column(batch, "source")?;

    let chunk_indices = batch
        .column_by_name("chunk_index")
        .ok_or_else(|| RagError::Database("Missing chunk_index column".to_string()))?
        .as_any()
        .downcast_ref::<UInt32Array>()
        .ok_or_else(|| RagError::Database("Invalid chunk_index column type".to_string()))?;

    let distances = batch
        .column_by_name("_distance")
        .ok_or_else(|| RagError::Database("Missing _distance column".to_string()))?
        .as_any()
        .downcast_ref::<Float32Array>()
        .ok_or_else(|| RagError::Database("Invalid _distance column type".to_string()))?;

    Ok((0..batch.num_rows())
        .map(|row| SearchHit {
            id: ids.value(row).to_string(),
            text: texts.value(row).to_string(),
            source: sources.value(row).to_string(),
            chunk_index: chunk_indices.value(row),
            distance: distances.value(row),
        })
        .collect())
}
