#[cfg(test)]
mod tests;

use ::lancedb::Connection;
use ::lancedb::query::{ExecutableQuery, QueryBase};
use arrow::array::{
    Array, ArrayRef, FixedSizeListArray, Float32Array, Int64Array, RecordBatchIterator,
};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{
    ROW_ID_COLUMN, VECTOR_COLUMN, WRITE_BATCH_ROWS, index_table_schema, schema_dimension,
    vector_item_field, vector_length,
};
use crate::AssistantError;
use crate::retrieval::manifest::MANIFEST_FILE_NAME;
use crate::retrieval::{
    BuiltIndexes, EmbeddedField, FlatIndex, IndexManifest, RetrievalError, VectorIndex,
    VectorIndexSet,
};

/// On-disk home of the vector indexes and their build manifest
pub struct IndexStore {
    connection: Connection,
    directory: PathBuf,
}

impl IndexStore {
    /// Open (creating if needed) the index directory
    #[inline]
    pub async fn open(directory: &Path) -> Result<Self, AssistantError> {
        std::fs::create_dir_all(directory).map_err(|e| {
            AssistantError::Database(format!(
                "Failed to create index directory {}: {}",
                directory.display(),
                e
            ))
        })?;

        let uri = format!("file://{}", directory.display());
        debug!("Connecting to LanceDB at {}", uri);

        let connection = ::lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| AssistantError::Database(format!("Failed to connect to LanceDB: {}", e)))?;

        Ok(Self {
            connection,
            directory: directory.to_path_buf(),
        })
    }

    #[inline]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    #[inline]
    pub fn manifest_path(&self) -> PathBuf {
        self.directory.join(MANIFEST_FILE_NAME)
    }

    /// Write every built index and then the manifest.
    ///
    /// The manifest goes last so an interrupted write leaves no manifest
    /// describing tables that were never completed.
    #[inline]
    pub async fn persist(&self, built: &BuiltIndexes) -> Result<(), AssistantError> {
        let manifest_path = self.manifest_path();
        if manifest_path.exists() {
            std::fs::remove_file(&manifest_path).map_err(|e| {
                AssistantError::Database(format!("Failed to remove stale manifest: {}", e))
            })?;
        }

        for (&field, index) in &built.indexes {
            self.write_index(field, index).await?;
        }
        self.write_manifest(&built.manifest)?;

        info!(
            "Persisted {} indexes to {}",
            built.indexes.len(),
            self.directory.display()
        );
        Ok(())
    }

    /// Replace the table for `field` with the contents of `index`
    #[inline]
    pub async fn write_index(
        &self,
        field: EmbeddedField,
        index: &FlatIndex,
    ) -> Result<(), AssistantError> {
        let table_name = field.table_name();
        self.drop_table_if_exists(table_name).await?;

        let schema = index_table_schema(index.dimension());
        let table = self
            .connection
            .create_empty_table(table_name, Arc::clone(&schema))
            .execute()
            .await
            .map_err(|e| {
                AssistantError::Database(format!("Failed to create table {}: {}", table_name, e))
            })?;

        if index.is_empty() {
            warn!("Index for {} is empty, table left without rows", field);
            return Ok(());
        }

        let dimension = index.dimension();
        let batches = index
            .row_ids()
            .chunks(WRITE_BATCH_ROWS)
            .zip(index.flat_vectors().chunks(WRITE_BATCH_ROWS * dimension.max(1)))
            .map(|(row_ids, vectors)| Self::record_batch(row_ids, vectors, dimension))
            .collect::<Result<Vec<_>, _>>()?;

        let reader = RecordBatchIterator::new(batches.into_iter().map(Ok), schema);
        table.add(reader).execute().await.map_err(|e| {
            AssistantError::Database(format!("Failed to write vectors for {}: {}", field, e))
        })?;

        debug!("Wrote {} vectors to {}", index.len(), table_name);
        Ok(())
    }

    fn record_batch(
        row_ids: &[i64],
        vectors: &[f32],
        dimension: usize,
    ) -> Result<RecordBatch, AssistantError> {
        let values = Float32Array::from(vectors.to_vec());
        let vector_array = FixedSizeListArray::try_new(
            vector_item_field(),
            vector_length(dimension),
            Arc::new(values),
            None,
        )
        .map_err(|e| AssistantError::Database(format!("Failed to create vector array: {}", e)))?;

        let arrays: Vec<ArrayRef> = vec![
            Arc::new(Int64Array::from(row_ids.to_vec())),
            Arc::new(vector_array),
        ];

        RecordBatch::try_new(index_table_schema(dimension), arrays)
            .map_err(|e| AssistantError::Database(format!("Failed to create record batch: {}", e)))
    }

    /// Load the requested fields and the manifest, verifying nothing is missing
    #[inline]
    pub async fn load(
        &self,
        fields: &[EmbeddedField],
    ) -> Result<(VectorIndexSet, IndexManifest), AssistantError> {
        let manifest = self.read_manifest()?;

        let mut set = VectorIndexSet::new();
        for &field in fields {
            let index = self.read_index(field).await?;
            set.insert(field, Box::new(index));
        }

        info!(
            "Loaded {} indexes from {}",
            set.len(),
            self.directory.display()
        );
        Ok((set, manifest))
    }

    /// Read one field's table back into a flat index, ordered by row id
    #[inline]
    pub async fn read_index(&self, field: EmbeddedField) -> Result<FlatIndex, AssistantError> {
        let table_name = field.table_name();
        if !self.table_exists(table_name).await? {
            return Err(RetrievalError::MissingIndex { field }.into());
        }

        let table = self
            .connection
            .open_table(table_name)
            .execute()
            .await
            .map_err(|e| {
                AssistantError::Database(format!("Failed to open table {}: {}", table_name, e))
            })?;

        let schema = table.schema().await.map_err(|e| {
            AssistantError::Database(format!("Failed to read schema of {}: {}", table_name, e))
        })?;
        let dimension = schema_dimension(&schema).ok_or_else(|| {
            AssistantError::Database(format!("Table {} has no vector column", table_name))
        })?;

        let count = table.count_rows(None).await.map_err(|e| {
            AssistantError::Database(format!("Failed to count rows in {}: {}", table_name, e))
        })?;
        if count == 0 {
            return Ok(FlatIndex::new(dimension));
        }

        let batches: Vec<RecordBatch> = table
            .query()
            .limit(count)
            .execute()
            .await
            .map_err(|e| {
                AssistantError::Database(format!("Failed to query {}: {}", table_name, e))
            })?
            .try_collect()
            .await
            .map_err(|e| {
                AssistantError::Database(format!("Failed to read {}: {}", table_name, e))
            })?;

        let mut rows: Vec<(i64, Vec<f32>)> = Vec::with_capacity(count);
        for batch in &batches {
            Self::collect_rows(batch, table_name, &mut rows)?;
        }
        rows.sort_by_key(|(row_id, _)| *row_id);

        let mut index = FlatIndex::with_capacity(dimension, rows.len());
        for (row_id, vector) in rows {
            index.add(row_id, &vector).map_err(|actual| {
                AssistantError::from(RetrievalError::DimensionMismatch {
                    field,
                    expected: dimension,
                    actual,
                })
            })?;
        }

        debug!("Read {} vectors from {}", count, table_name);
        Ok(index)
    }

    fn collect_rows(
        batch: &RecordBatch,
        table_name: &str,
        rows: &mut Vec<(i64, Vec<f32>)>,
    ) -> Result<(), AssistantError> {
        let row_ids = batch
            .column_by_name(ROW_ID_COLUMN)
            .and_then(|column| column.as_any().downcast_ref::<Int64Array>())
            .ok_or_else(|| {
                AssistantError::Database(format!("Invalid row_id column in {}", table_name))
            })?;
        let vectors = batch
            .column_by_name(VECTOR_COLUMN)
            .and_then(|column| column.as_any().downcast_ref::<FixedSizeListArray>())
            .ok_or_else(|| {
                AssistantError::Database(format!("Invalid vector column in {}", table_name))
            })?;

        for row in 0..batch.num_rows() {
            let values = vectors.value(row);
            let floats = values
                .as_any()
                .downcast_ref::<Float32Array>()
                .ok_or_else(|| {
                    AssistantError::Database(format!("Vector values in {} are not f32", table_name))
                })?;
            rows.push((row_ids.value(row), floats.values().to_vec()));
        }
        Ok(())
    }

    #[inline]
    pub fn write_manifest(&self, manifest: &IndexManifest) -> Result<(), AssistantError> {
        let json = serde_json::to_string_pretty(manifest)
            .map_err(|e| AssistantError::Database(format!("Failed to encode manifest: {}", e)))?;
        std::fs::write(self.manifest_path(), json)?;
        Ok(())
    }

    /// Read the build manifest. A missing manifest means the indexes cannot be trusted.
    #[inline]
    pub fn read_manifest(&self) -> Result<IndexManifest, AssistantError> {
        let path = self.manifest_path();
        if !path.exists() {
            return Err(RetrievalError::manifest_mismatch(format!(
                "no manifest at {}; run `prepare` to build the indexes",
                path.display()
            ))
            .into());
        }

        let contents = std::fs::read_to_string(&path)?;
        serde_json::from_str(&contents).map_err(|e| {
            RetrievalError::manifest_mismatch(format!("unreadable manifest: {}", e)).into()
        })
    }

    #[inline]
    pub async fn table_exists(&self, table_name: &str) -> Result<bool, AssistantError> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| AssistantError::Database(format!("Failed to list tables: {}", e)))?;

        Ok(table_names.iter().any(|name| name == table_name))
    }

    /// Number of stored vectors per field, `None` where the table is absent
    #[inline]
    pub async fn vector_counts(
        &self,
    ) -> Result<BTreeMap<EmbeddedField, Option<usize>>, AssistantError> {
        let mut counts = BTreeMap::new();
        for field in EmbeddedField::ALL {
            let table_name = field.table_name();
            let count = if self.table_exists(table_name).await? {
                let table = self
                    .connection
                    .open_table(table_name)
                    .execute()
                    .await
                    .map_err(|e| {
                        AssistantError::Database(format!("Failed to open table: {}", e))
                    })?;
                Some(table.count_rows(None).await.map_err(|e| {
                    AssistantError::Database(format!("Failed to count rows: {}", e))
                })?)
            } else {
                None
            };
            counts.insert(field, count);
        }
        Ok(counts)
    }

    async fn drop_table_if_exists(&self, table_name: &str) -> Result<(), AssistantError> {
        if self.table_exists(table_name).await? {
            info!("Dropping existing table {}", table_name);
            self.connection
                .drop_table(table_name)
                .await
                .map_err(|e| AssistantError::Database(format!("Failed to drop table: {}", e)))?;
        }
        Ok(())
    }
}
