// Embeddings module
// Text → vector collaborator used by both the index builder and query path

pub mod ollama;

pub use ollama::{DEFAULT_EMBEDDING_DIMENSION, OllamaClient, RetryPolicy};

use anyhow::Result;

/// Turns text into fixed-length vectors.
///
/// The dimensionality must be constant for a given model; callers treat a
/// mismatch against the persisted indexes as a fatal configuration error.
pub trait Embedder: Send + Sync {
    /// Embed a single input.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several inputs in one call. Output order matches input order.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Identifier recorded in the build manifest.
    fn model_name(&self) -> &str;
}
