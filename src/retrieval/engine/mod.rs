// Retrieval engine
// Intent-conditioned index selection, cross-index fusion and the metadata join


use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info};

use crate::intent::Intent;
use crate::recipes::{MinimalRecipe, Recipe, RecipeView, View};
use crate::retrieval::{
    EmbeddedField, IndexManifest, MetadataStore, RetrievalError, VectorIndexSet,
};

/// Rescales one field's distances before they are compared with other fields'
pub trait DistanceNormalizer: Send + Sync {
    fn normalize(&self, field: EmbeddedField, distance: f32) -> f32;
}

/// Leaves raw squared L2 distances untouched
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityNormalizer;

impl DistanceNormalizer for IdentityNormalizer {
    #[inline]
    fn normalize(&self, _field: EmbeddedField, distance: f32) -> f32 {
        distance
    }
}

/// One ranked search result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedRecipe {
    pub row_id: i64,
    pub distance: f32,
    /// The index this record was found through
    pub field: EmbeddedField,
    pub recipe: MinimalRecipe,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    row_id: i64,
    distance: f32,
    field: EmbeddedField,
}

/// Read-only search over the loaded indexes and metadata, shared across requests
pub struct RetrievalEngine {
    indexes: VectorIndexSet,
    metadata: MetadataStore,
    normalizer: Box<dyn DistanceNormalizer>,
    manifest: Option<IndexManifest>,
}

impl RetrievalEngine {
    #[inline]
    pub fn new(indexes: VectorIndexSet, metadata: MetadataStore) -> Self {
        Self {
            indexes,
            metadata,
            normalizer: Box::new(IdentityNormalizer),
            manifest: None,
        }
    }

    #[inline]
    pub fn with_normalizer(mut self, normalizer: Box<dyn DistanceNormalizer>) -> Self {
        self.normalizer = normalizer;
        self
    }

    #[inline]
    pub fn with_manifest(mut self, manifest: IndexManifest) -> Self {
        self.manifest = Some(manifest);
        self
    }

    #[inline]
    pub fn indexes(&self) -> &VectorIndexSet {
        &self.indexes
    }

    #[inline]
    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    #[inline]
    pub fn manifest(&self) -> Option<&IndexManifest> {
        self.manifest.as_ref()
    }

    /// Dimension query vectors must have, taken from any loaded index
    #[inline]
    pub fn dimension(&self) -> Option<usize> {
        self.indexes
            .fields()
            .next()
            .and_then(|field| self.indexes.get(field))
            .map(|index| index.dimension())
    }

    /// Search the index an intent maps to, or every index when it maps to none.
    ///
    /// Results are distinct records in ascending distance order, ties broken
    /// by row id and then field. Hits without metadata are dropped, so fewer
    /// than `top_k` records may come back.
    #[inline]
    pub fn search_by_intent(
        &self,
        query: &[f32],
        intent: Intent,
        top_k: usize,
    ) -> Result<Vec<RetrievedRecipe>, RetrievalError> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let candidates = match intent.target_field() {
            Some(field) => self.field_candidates(field, query, top_k)?,
            None => {
                debug!("Intent {} has no dedicated index, searching all", intent);
                let mut fused = Vec::new();
                for field in self.indexes.fields() {
                    fused.extend(self.field_candidates(field, query, top_k)?);
                }
                fused
            }
        };

        let results = self.rank(candidates, top_k);
        info!(
            "Retrieved {} recipes for intent {} (top_k {})",
            results.len(),
            intent,
            top_k
        );
        Ok(results)
    }

    /// Full record at `row_id`, bypassing search
    #[inline]
    pub fn get_recipe_by_row_id(&self, row_id: i64) -> Option<Recipe> {
        match self.metadata.get(row_id, View::Full)? {
            RecipeView::Full(recipe) => Some(*recipe),
            RecipeView::Minimal(_) => None,
        }
    }

    fn field_candidates(
        &self,
        field: EmbeddedField,
        query: &[f32],
        top_k: usize,
    ) -> Result<Vec<Candidate>, RetrievalError> {
        Ok(self
            .indexes
            .search(field, query, top_k)?
            .into_iter()
            .map(|hit| Candidate {
                row_id: hit.row_id,
                distance: self.normalizer.normalize(field, hit.distance),
                field,
            })
            .collect())
    }

    fn rank(&self, mut candidates: Vec<Candidate>, top_k: usize) -> Vec<RetrievedRecipe> {
        candidates.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.row_id.cmp(&b.row_id))
                .then_with(|| a.field.cmp(&b.field))
        });

        let mut seen = HashSet::with_capacity(candidates.len());
        candidates
            .into_iter()
            .filter(|candidate| seen.insert(candidate.row_id))
            .filter_map(|candidate| {
                let Some(RecipeView::Minimal(recipe)) =
                    self.metadata.get(candidate.row_id, View::Minimal)
                else {
                    debug!(
                        "Dropping hit for row {} from {}: no metadata",
                        candidate.row_id, candidate.field
                    );
                    return None;
                };
                Some(RetrievedRecipe {
                    row_id: candidate.row_id,
                    distance: candidate.distance,
                    field: candidate.field,
                    recipe,
                })
            })
            .take(top_k)
            .collect()
    }
}

impl std::fmt::Debug for RetrievalEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalEngine")
            .field("indexes", &self.indexes)
            .field("rows", &self.metadata.len())
            .field("manifest", &self.manifest)
            .finish_non_exhaustive()
    }
}
