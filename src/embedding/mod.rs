//! Text embedding backends.
//!
//! The index and the retriever only see the [`Embedder`] trait. Two
//! backends exist:
//!
//! - [`FastEmbedEmbedder`] (feature `fastembed-embeddings`): local ONNX
//!   inference with all-MiniLM-L6-v2, 384 dimensions.
//! - [`HashEmbedder`]: deterministic feature hashing. No model download,
//!   used when the model is unavailable and in tests.
//!
//! Vectors from different backends are not comparable, so the index
//! records which backend built it.

mod hash;
#[cfg(feature = "fastembed-embeddings")]
mod onnx;

#[cfg(feature = "fastembed-embeddings")]
pub use onnx::FastEmbedEmbedder;
pub use hash::HashEmbedder;

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::EmbeddingError;

/// Default embedding dimensionality (all-MiniLM-L6-v2).
pub const DEFAULT_DIMENSIONS: usize = 384;

/// Default number of texts embedded per backend call during index builds.
pub const DEFAULT_BATCH_SIZE: usize = 20;

/// A text embedding backend.
///
/// Implementations must be deterministic for a given model and return
/// one vector of [`Embedder::dimensions`] floats per input.
pub trait Embedder: Send + Sync {
    /// Short backend name for logs and status output.
    fn name(&self) -> &str;

    /// Output vector length.
    fn dimensions(&self) -> usize;

    /// Embeds a batch of texts, preserving input order.
    ///
    /// # Errors
    ///
    /// Returns [`EmbeddingError`] if inference fails or the backend
    /// returns the wrong number of vectors.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Embeds a single text.
    ///
    /// # Errors
    ///
    /// Returns [`EmbeddingError`] if inference fails.
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self.embed_batch(&[text.to_string()])?;
        if vectors.len() != 1 {
            return Err(EmbeddingError::CountMismatch {
                expected: 1,
                actual: vectors.len(),
            });
        }
        Ok(vectors.swap_remove(0))
    }
}

/// Environment variable selecting the embedding backend (`hash` forces
/// [`HashEmbedder`]).
pub const EMBEDDER_ENV: &str = "NEXUS_EMBEDDER";

/// Creates the configured embedder, failing if it cannot be loaded.
///
/// Setting [`EMBEDDER_ENV`] to `hash` selects [`HashEmbedder`]. Otherwise
/// the ONNX model is loaded when the `fastembed-embeddings` feature is
/// enabled, and the hash embedder is used when it is not. Index builds use
/// this so a model failure aborts the build.
///
/// # Errors
///
/// Returns [`EmbeddingError::Init`] if the ONNX model cannot be loaded.
pub fn try_create_embedder() -> Result<Arc<dyn Embedder>, EmbeddingError> {
    if std::env::var(EMBEDDER_ENV).is_ok_and(|v| v.eq_ignore_ascii_case("hash")) {
        debug!("hash embeddings selected via {EMBEDDER_ENV}");
        return Ok(Arc::new(HashEmbedder::default()));
    }

    #[cfg(feature = "fastembed-embeddings")]
    {
        Ok(Arc::new(FastEmbedEmbedder::new()?))
    }
    #[cfg(not(feature = "fastembed-embeddings"))]
    {
        debug!("built without fastembed-embeddings, using hash embeddings");
        Ok(Arc::new(HashEmbedder::default()))
    }
}

/// Creates the best available embedder for queries.
///
/// Like [`try_create_embedder`], but a model that fails to load is
/// replaced by [`HashEmbedder`] with a warning. The retriever refuses to
/// query an index recorded under a different backend, so the fallback
/// degrades retrieval instead of returning unrelated chunks.
#[must_use]
pub fn create_embedder() -> Arc<dyn Embedder> {
    try_create_embedder().unwrap_or_else(|e| {
        warn!(error = %e, "embedding model unavailable, falling back to hash embeddings");
        Arc::new(HashEmbedder::default())
    })
}

/// Encodes a vector as little-endian `f32` bytes.
#[must_use]
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Decodes a blob written by [`vec_to_blob`]. Trailing partial bytes are ignored.
#[must_use]
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

/// Cosine similarity in `[-1, 1]`; `0.0` for empty, mismatched or zero vectors.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }
    dot / denom
}

/// Cosine distance, `1 - cosine_similarity`. Lower is closer.
#[must_use]
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_blob_roundtrip() {
        let v = vec![1.0f32, -2.5, 3.125, 0.0];
        let blob = vec_to_blob(&v);
        assert_eq!(blob.len(), 16);
        assert_eq!(blob_to_vec(&blob), v);
    }

    #[test]
    fn test_cosine_identical_and_orthogonal() {
        let v = [1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!(cosine_distance(&v, &v).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_degenerate_inputs() {
        assert!(cosine_similarity(&[], &[]).abs() < f32::EPSILON);
        assert!(cosine_similarity(&[1.0], &[1.0, 2.0]).abs() < f32::EPSILON);
        assert!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]).abs() < f32::EPSILON);
    }

    #[test]
    fn test_default_embed_uses_batch() {
        let embedder = HashEmbedder::default();
        let single = embedder.embed("export controls").unwrap_or_default();
        let batch = embedder
            .embed_batch(&["export controls".to_string()])
            .unwrap_or_default();
        assert_eq!(batch.first(), Some(&single));
    }
}
