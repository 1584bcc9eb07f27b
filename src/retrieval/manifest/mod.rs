// Index build manifest
// Records what an index set was built from so a stale or mismatched set is rejected at load


use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use tracing::debug;

use crate::recipes::Recipe;
use crate::retrieval::{EmbeddedField, MetadataStore, RetrievalError, VectorIndexSet};

pub const MANIFEST_FILE_NAME: &str = "manifest.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldManifest {
    pub dimension: usize,
    pub size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub row_count: usize,
    /// SHA-256 over the embedded text of every row, in row order
    pub fingerprint: String,
    pub embedding_model: String,
    pub fields: BTreeMap<EmbeddedField, FieldManifest>,
    pub created_at: DateTime<Utc>,
}

/// Hash the row order and every embedded text of `recipes`
#[inline]
pub fn fingerprint_recipes(recipes: &[Recipe]) -> String {
    let mut hasher = Sha256::new();
    for (row_id, recipe) in recipes.iter().enumerate() {
        hasher.update(row_id.to_le_bytes());
        for field in EmbeddedField::ALL {
            hasher.update(field.column_name().as_bytes());
            hasher.update([0]);
            hasher.update(field.text(recipe).as_bytes());
            hasher.update([0]);
        }
    }
    format!("{:x}", hasher.finalize())
}

impl IndexManifest {
    #[inline]
    pub fn new(
        recipes: &[Recipe],
        embedding_model: impl Into<String>,
        fields: BTreeMap<EmbeddedField, FieldManifest>,
    ) -> Self {
        Self {
            row_count: recipes.len(),
            fingerprint: fingerprint_recipes(recipes),
            embedding_model: embedding_model.into(),
            fields,
            created_at: Utc::now(),
        }
    }

    /// Dimension shared by every field, if the manifest records one
    #[inline]
    pub fn dimension(&self) -> Option<usize> {
        self.fields.values().map(|field| field.dimension).next()
    }

    /// Check the loaded metadata and indexes against what this manifest recorded
    #[inline]
    pub fn verify(
        &self,
        metadata: &MetadataStore,
        indexes: &VectorIndexSet,
        embedding_model: &str,
    ) -> Result<(), RetrievalError> {
        if self.embedding_model != embedding_model {
            return Err(RetrievalError::manifest_mismatch(format!(
                "indexes were built with embedding model '{}' but '{}' is configured",
                self.embedding_model, embedding_model
            )));
        }

        if metadata.len() != self.row_count {
            return Err(RetrievalError::manifest_mismatch(format!(
                "metadata store has {} rows, manifest recorded {}",
                metadata.len(),
                self.row_count
            )));
        }

        let fingerprint = fingerprint_recipes(metadata.recipes());
        if fingerprint != self.fingerprint {
            return Err(RetrievalError::manifest_mismatch(
                "metadata content fingerprint differs from the one the indexes were built from",
            ));
        }

        for (&field, recorded) in &self.fields {
            let index = indexes
                .get(field)
                .ok_or(RetrievalError::MissingIndex { field })?;

            if index.dimension() != recorded.dimension {
                return Err(RetrievalError::DimensionMismatch {
                    field,
                    expected: recorded.dimension,
                    actual: index.dimension(),
                });
            }
            if index.len() != recorded.size {
                return Err(RetrievalError::manifest_mismatch(format!(
                    "index {} has {} vectors, manifest recorded {}",
                    field,
                    index.len(),
                    recorded.size
                )));
            }
        }

        debug!(
            "Manifest verified: {} rows across {} indexes",
            self.row_count,
            self.fields.len()
        );
        Ok(())
    }
}
