//! Chunk type: the atomic retrieval unit.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Document- and chunk-level metadata.
///
/// Ordered so that serialised metadata is stable across index rebuilds.
pub type Metadata = BTreeMap<String, String>;

/// A bounded-size segment of a knowledge document.
///
/// Chunk IDs have the form `{doc_id}:chunk_{n}` and are assigned once
/// when the index is built. Chunks are never mutated afterwards; a
/// re-index replaces the whole set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Globally unique chunk identifier.
    pub chunk_id: String,
    /// Chunk text.
    pub text: String,
    /// Inherited document metadata plus chunk-specific fields.
    pub metadata: Metadata,
}

impl Chunk {
    /// Builds the canonical chunk ID for a document and position.
    #[must_use]
    pub fn make_id(doc_id: &str, index: usize) -> String {
        format!("{doc_id}:chunk_{index}")
    }

    /// Returns the `source_type` metadata value, or `"unknown"`.
    #[must_use]
    pub fn source_type(&self) -> &str {
        self.metadata
            .get("source_type")
            .map_or("unknown", String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_id() {
        assert_eq!(Chunk::make_id("bis_2022_10_07", 3), "bis_2022_10_07:chunk_3");
    }

    #[test]
    fn test_source_type_default() {
        let chunk = Chunk {
            chunk_id: "a:chunk_0".to_string(),
            text: "text".to_string(),
            metadata: Metadata::new(),
        };
        assert_eq!(chunk.source_type(), "unknown");
    }
}
