//! Retrieval hit: a chunk annotated with its query distance.

use serde::{Deserialize, Serialize};

use super::chunk::Metadata;

/// A chunk returned by a similarity query.
///
/// Produced per query and never persisted. Lower `distance` means more
/// similar (cosine distance, `1 - cosine_similarity`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    /// ID of the matched chunk.
    pub chunk_id: String,
    /// Chunk text.
    pub text: String,
    /// Chunk metadata.
    pub metadata: Metadata,
    /// Cosine distance to the query vector.
    pub distance: f32,
}

impl Hit {
    /// Returns the `source_type` metadata value, or `"unknown"`.
    #[must_use]
    pub fn source_type(&self) -> &str {
        self.metadata
            .get("source_type")
            .map_or("unknown", String::as_str)
    }
}
