//! Retrieval errors
//!
//! Failures raised while building, loading or querying the vector indexes.
//! Everything here except [`RetrievalError::Embedding`] is a configuration
//! problem and is fatal at startup.

use thiserror::Error;

use crate::retrieval::EmbeddedField;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RetrievalError {
    #[error("No vector index available for field: {field}")]
    MissingIndex { field: EmbeddedField },

    #[error("Vector dimension mismatch for {field}: expected {expected}, got {actual}")]
    DimensionMismatch {
        field: EmbeddedField,
        expected: usize,
        actual: usize,
    },

    #[error("Embedder returned {actual} vectors for {expected} texts")]
    EmbeddingCount { expected: usize, actual: usize },

    #[error("Cannot build indexes from an empty recipe set")]
    EmptyInput,

    #[error("Index manifest does not match loaded data: {message}")]
    ManifestMismatch { message: String },

    #[error("Embedding failed: {message}")]
    Embedding { message: String },
}

impl RetrievalError {
    #[inline]
    pub fn manifest_mismatch(message: impl Into<String>) -> Self {
        Self::ManifestMismatch {
            message: message.into(),
        }
    }

    /// Whether the error indicates broken on-disk state rather than a transient failure
    #[inline]
    pub fn is_configuration_error(&self) -> bool {
        !matches!(self, Self::Embedding { .. })
    }
}
