// Exact vector indexes
// One flat L2 index per embedded field, searched by squared Euclidean distance


use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::debug;

use crate::retrieval::{EmbeddedField, RetrievalError};

/// Row id reported for unfilled result slots. Never returned from [`VectorIndexSet::search`].
pub const NOT_FOUND_ROW_ID: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexHit {
    pub row_id: i64,
    /// Squared Euclidean distance to the query
    pub distance: f32,
}

/// A k-nearest-neighbour index over fixed-dimension vectors
pub trait VectorIndex: Send + Sync {
    fn dimension(&self) -> usize;

    fn len(&self) -> usize;

    #[inline]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return up to `k` nearest entries ordered by ascending distance.
    ///
    /// Implementations may pad the result with [`NOT_FOUND_ROW_ID`] entries
    /// when fewer than `k` vectors exist.
    fn search(&self, query: &[f32], k: usize) -> Vec<IndexHit>;
}

/// Brute-force index holding every vector in one contiguous buffer
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FlatIndex {
    dimension: usize,
    row_ids: Vec<i64>,
    vectors: Vec<f32>,
}

impl FlatIndex {
    #[inline]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            row_ids: Vec::new(),
            vectors: Vec::new(),
        }
    }

    #[inline]
    pub fn with_capacity(dimension: usize, capacity: usize) -> Self {
        Self {
            dimension,
            row_ids: Vec::with_capacity(capacity),
            vectors: Vec::with_capacity(capacity * dimension),
        }
    }

    /// Append one vector. Fails when its length differs from the index dimension.
    #[inline]
    pub fn add(&mut self, row_id: i64, vector: &[f32]) -> Result<(), usize> {
        if vector.len() != self.dimension {
            return Err(vector.len());
        }
        self.row_ids.push(row_id);
        self.vectors.extend_from_slice(vector);
        Ok(())
    }

    #[inline]
    pub fn row_ids(&self) -> &[i64] {
        &self.row_ids
    }

    /// All stored vectors, concatenated in row order
    #[inline]
    pub fn flat_vectors(&self) -> &[f32] {
        &self.vectors
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (i64, &[f32])> {
        self.row_ids
            .iter()
            .copied()
            .zip(self.vectors.chunks_exact(self.dimension.max(1)))
    }
}

impl VectorIndex for FlatIndex {
    #[inline]
    fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    fn len(&self) -> usize {
        self.row_ids.len()
    }

    #[inline]
    fn search(&self, query: &[f32], k: usize) -> Vec<IndexHit> {
        if k == 0 || self.row_ids.is_empty() {
            return Vec::new();
        }

        let mut hits: Vec<IndexHit> = self
            .iter()
            .map(|(row_id, vector)| IndexHit {
                row_id,
                distance: squared_l2(query, vector),
            })
            .collect();

        if k < hits.len() {
            hits.select_nth_unstable_by(k - 1, compare_hits);
            hits.truncate(k);
        }
        hits.sort_by(compare_hits);
        hits
    }
}

#[inline]
fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let diff = x - y;
            diff * diff
        })
        .sum()
}

/// Ascending distance, ties broken by row id
#[inline]
pub fn compare_hits(a: &IndexHit, b: &IndexHit) -> Ordering {
    a.distance
        .total_cmp(&b.distance)
        .then_with(|| a.row_id.cmp(&b.row_id))
}

/// The loaded indexes, one per embedded field
#[derive(Default)]
pub struct VectorIndexSet {
    indexes: BTreeMap<EmbeddedField, Box<dyn VectorIndex>>,
}

impl VectorIndexSet {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn insert(&mut self, field: EmbeddedField, index: Box<dyn VectorIndex>) {
        self.indexes.insert(field, index);
    }

    #[inline]
    pub fn with_index(mut self, field: EmbeddedField, index: Box<dyn VectorIndex>) -> Self {
        self.insert(field, index);
        self
    }

    #[inline]
    pub fn get(&self, field: EmbeddedField) -> Option<&dyn VectorIndex> {
        self.indexes.get(&field).map(|index| &**index)
    }

    #[inline]
    pub fn contains(&self, field: EmbeddedField) -> bool {
        self.indexes.contains_key(&field)
    }

    /// Fields with a loaded index, in stable order
    #[inline]
    pub fn fields(&self) -> impl Iterator<Item = EmbeddedField> + '_ {
        self.indexes.keys().copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    /// Search one field's index.
    ///
    /// `k` is capped at the index size, sentinel entries are dropped and
    /// the hits come back in ascending distance order.
    #[inline]
    pub fn search(
        &self,
        field: EmbeddedField,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<IndexHit>, RetrievalError> {
        let index = self
            .get(field)
            .ok_or(RetrievalError::MissingIndex { field })?;

        if query.len() != index.dimension() {
            return Err(RetrievalError::DimensionMismatch {
                field,
                expected: index.dimension(),
                actual: query.len(),
            });
        }

        let k = k.min(index.len());
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut hits: Vec<IndexHit> = index
            .search(query, k)
            .into_iter()
            .filter(|hit| hit.row_id != NOT_FOUND_ROW_ID)
            .collect();
        hits.sort_by(compare_hits);
        hits.truncate(k);

        debug!("Index {} returned {} hits", field, hits.len());
        Ok(hits)
    }
}

impl std::fmt::Debug for VectorIndexSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(
                self.indexes
                    .iter()
                    .map(|(field, index)| (field, (index.dimension(), index.len()))),
            )
            .finish()
    }
}
