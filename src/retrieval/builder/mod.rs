// Index builder
// Embeds each recipe text field in batches and builds one flat index per field


use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::embeddings::Embedder;
use crate::recipes::Recipe;
use crate::retrieval::{
    EmbeddedField, FieldManifest, FlatIndex, IndexManifest, RetrievalError, VectorIndex,
    VectorIndexSet,
};

pub const DEFAULT_BATCH_SIZE: usize = 32;

/// Freshly built indexes plus the manifest describing them
#[derive(Debug, Clone)]
pub struct BuiltIndexes {
    pub indexes: BTreeMap<EmbeddedField, FlatIndex>,
    pub manifest: IndexManifest,
}

impl BuiltIndexes {
    #[inline]
    pub fn into_index_set(self) -> VectorIndexSet {
        self.indexes
            .into_iter()
            .fold(VectorIndexSet::new(), |set, (field, index)| {
                set.with_index(field, Box::new(index))
            })
    }
}

pub struct IndexBuilder<'a> {
    embedder: &'a dyn Embedder,
    batch_size: usize,
    expected_dimension: Option<usize>,
    show_progress: bool,
}

impl<'a> IndexBuilder<'a> {
    #[inline]
    pub fn new(embedder: &'a dyn Embedder, batch_size: usize) -> Self {
        Self {
            embedder,
            batch_size: batch_size.max(1),
            expected_dimension: None,
            show_progress: false,
        }
    }

    /// Reject vectors whose length differs from `dimension`
    #[inline]
    pub fn with_expected_dimension(mut self, dimension: usize) -> Self {
        self.expected_dimension = Some(dimension);
        self
    }

    /// Draw a progress bar on an attended terminal
    #[inline]
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Build one index per field over `rows`. Row ids are positions in `rows`.
    #[inline]
    pub fn build(
        &self,
        rows: &[Recipe],
        fields: &[EmbeddedField],
    ) -> Result<BuiltIndexes, RetrievalError> {
        if rows.is_empty() {
            return Err(RetrievalError::EmptyInput);
        }

        let mut indexes = BTreeMap::new();
        let mut field_manifests = BTreeMap::new();
        let mut dimension = self.expected_dimension;

        for &field in fields {
            if indexes.contains_key(&field) {
                continue;
            }
            info!("Building index for {} over {} rows", field, rows.len());

            let index = self.build_field(rows, field, &mut dimension)?;
            field_manifests.insert(
                field,
                FieldManifest {
                    dimension: index.dimension(),
                    size: index.len(),
                },
            );
            indexes.insert(field, index);
        }

        let manifest = IndexManifest::new(rows, self.embedder.model_name(), field_manifests);
        info!(
            "Built {} indexes with dimension {}",
            indexes.len(),
            dimension.unwrap_or_default()
        );

        Ok(BuiltIndexes { indexes, manifest })
    }

    fn build_field(
        &self,
        rows: &[Recipe],
        field: EmbeddedField,
        dimension: &mut Option<usize>,
    ) -> Result<FlatIndex, RetrievalError> {
        let texts: Vec<String> = rows.iter().map(|recipe| field.text(recipe)).collect();
        let bar = self.progress_bar(field, texts.len());
        let mut index: Option<FlatIndex> = None;

        for (batch_number, batch) in texts.chunks(self.batch_size).enumerate() {
            debug!(
                "Embedding batch {} ({} texts) for {}",
                batch_number + 1,
                batch.len(),
                field
            );

            let vectors =
                self.embedder
                    .embed_batch(batch)
                    .map_err(|e| RetrievalError::Embedding {
                        message: format!("{e:#}"),
                    })?;

            if vectors.len() != batch.len() {
                return Err(RetrievalError::EmbeddingCount {
                    expected: batch.len(),
                    actual: vectors.len(),
                });
            }

            let first_row = batch_number * self.batch_size;
            for (offset, vector) in vectors.iter().enumerate() {
                let expected = *dimension.get_or_insert(vector.len());
                let index = index
                    .get_or_insert_with(|| FlatIndex::with_capacity(expected, rows.len()));
                let row_id = (first_row + offset) as i64;

                index
                    .add(row_id, vector)
                    .map_err(|actual| RetrievalError::DimensionMismatch {
                        field,
                        expected,
                        actual,
                    })?;
            }
            bar.inc(batch.len() as u64);
        }

        bar.finish_and_clear();
        index.ok_or(RetrievalError::EmptyInput)
    }

    fn progress_bar(&self, field: EmbeddedField, len: usize) -> ProgressBar {
        if self.show_progress && console::user_attended_stderr() {
            ProgressBar::new(len as u64).with_style(
                ProgressStyle::with_template("{spinner} [{pos}/{len}] Embedding {msg}")
                    .expect("style template is valid"),
            )
            .with_message(field.to_string())
        } else {
            ProgressBar::hidden()
        }
    }
}
