//! Persistent vector index for knowledge chunks.
//!
//! The index is a cache over the knowledge directory: it can be rebuilt
//! at any time and every rebuild replaces the whole chunk set.

mod schema;
mod sqlite;

pub use sqlite::{IndexStats, SqliteVectorStore};

use serde_json::{Value, json};

use crate::core::{Chunk, Hit, Metadata};
use crate::error::StorageError;

/// Default location of the index database.
pub const DEFAULT_DB_PATH: &str = ".nexus/index.db";

/// Equality filter over chunk metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataFilter {
    /// `metadata[key] == value`.
    Eq {
        /// Metadata key.
        key: String,
        /// Required value.
        value: String,
    },
    /// Every inner filter must match.
    And(Vec<MetadataFilter>),
}

impl MetadataFilter {
    /// Single equality condition.
    #[must_use]
    pub fn eq(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Eq {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Builds a filter from equality pairs.
    ///
    /// No pairs gives `None`, one pair a bare [`MetadataFilter::Eq`], more
    /// than one a conjunction.
    #[must_use]
    pub fn from_pairs<I, K, V>(pairs: I) -> Option<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut conditions: Vec<Self> = pairs.into_iter().map(|(k, v)| Self::eq(k, v)).collect();
        match conditions.len() {
            0 => None,
            1 => conditions.pop(),
            _ => Some(Self::And(conditions)),
        }
    }

    /// Returns true if `metadata` satisfies the filter.
    #[must_use]
    pub fn matches(&self, metadata: &Metadata) -> bool {
        match self {
            Self::Eq { key, value } => metadata.get(key) == Some(value),
            Self::And(filters) => filters.iter().all(|f| f.matches(metadata)),
        }
    }

    /// JSON rendering (`{"k": "v"}` or `{"$and": [...]}`), used in logs.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Eq { key, value } => {
                let mut object = serde_json::Map::new();
                object.insert(key.clone(), Value::String(value.clone()));
                Value::Object(object)
            }
            Self::And(filters) => json!({ "$and": filters.iter().map(Self::to_json).collect::<Vec<_>>() }),
        }
    }
}

/// Nearest-neighbour index over chunk embeddings.
///
/// Implementations must allow concurrent `query` calls and must never
/// expose a partially rebuilt chunk set to readers.
pub trait VectorStore: Send + Sync {
    /// Replaces the entire index with `chunks` and their `vectors`,
    /// recording `embedder` as the backend that produced them.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if counts or dimensions disagree, or if
    /// persisting fails. On error the previous contents remain visible.
    fn upsert(&self, chunks: &[Chunk], vectors: Vec<Vec<f32>>, embedder: &str) -> Result<(), StorageError>;

    /// Name of the embedder that built the current index, if recorded.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::LockPoisoned`] if the index lock is poisoned.
    fn embedder(&self) -> Result<Option<String>, StorageError>;

    /// Returns up to `k` hits ordered by ascending cosine distance.
    ///
    /// An empty index yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::DimensionMismatch`] if `vector` does not
    /// match the indexed dimensionality.
    fn query(
        &self,
        vector: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Hit>, StorageError>;

    /// Number of indexed chunks.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::LockPoisoned`] if the index lock is poisoned.
    fn count(&self) -> Result<usize, StorageError>;

    /// IDs of all indexed chunks, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::LockPoisoned`] if the index lock is poisoned.
    fn chunk_ids(&self) -> Result<Vec<String>, StorageError>;
}
