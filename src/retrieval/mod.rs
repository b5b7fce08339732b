//! Query-time retrieval over the vector index.
//!
//! [`Retriever`] turns a question plus optional metadata constraints into
//! ranked [`Hit`]s; [`format_for_prompt`] renders them as a citable
//! context block for the model.

mod index;

pub use index::{IndexReport, build_index, build_index_with_batch};

use std::sync::Arc;

use tracing::debug;

use crate::core::Hit;
use crate::embedding::Embedder;
use crate::error::RetrievalError;
use crate::storage::{MetadataFilter, VectorStore};

/// Default number of hits returned per query.
pub const DEFAULT_TOP_K: usize = 4;

/// Context text used when a query matches nothing.
pub const NO_DOCUMENTS_FOUND: &str = "No relevant documents found in the knowledge base.";

/// Context text used when retrieval itself fails.
pub const KNOWLEDGE_UNAVAILABLE: &str = "Knowledge base not available. Answer using tools only.";

/// Separator between rendered hits.
pub const HIT_SEPARATOR: &str = "\n\n---\n\n";

/// Optional per-query constraints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetrievalFilters {
    /// Restrict to one `source_type` (e.g. `event_db`).
    pub source_type: Option<String>,
    /// Restrict to one `severity` (e.g. `Critical`).
    pub severity: Option<String>,
    /// Override the retriever's default `top_k`.
    pub top_k: Option<usize>,
}

impl RetrievalFilters {
    /// Builds the metadata filter: source type first, then severity.
    #[must_use]
    pub fn metadata_filter(&self) -> Option<MetadataFilter> {
        let pairs = [
            ("source_type", self.source_type.as_deref()),
            ("severity", self.severity.as_deref()),
        ];
        MetadataFilter::from_pairs(
            pairs
                .into_iter()
                .filter_map(|(k, v)| v.filter(|v| !v.is_empty()).map(|v| (k, v))),
        )
    }
}

/// Embeds queries and searches the vector index.
#[derive(Clone)]
pub struct Retriever {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    top_k: usize,
}

impl Retriever {
    /// Creates a retriever returning [`DEFAULT_TOP_K`] hits per query.
    #[must_use]
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            store,
            embedder,
            top_k: DEFAULT_TOP_K,
        }
    }

    /// Sets the default number of hits.
    #[must_use]
    pub const fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// The index this retriever searches.
    #[must_use]
    pub const fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Default number of hits per query.
    #[must_use]
    pub const fn top_k(&self) -> usize {
        self.top_k
    }

    /// Retrieves the nearest chunks for `query`.
    ///
    /// An empty index returns an empty list without embedding the query.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::EmbedderMismatch`] if the index records a
    /// different embedder than this retriever's, and [`RetrievalError`] if
    /// embedding or the index query fails. Callers decide how to degrade.
    pub fn retrieve(&self, query: &str, filters: &RetrievalFilters) -> Result<Vec<Hit>, RetrievalError> {
        if self.store.count()? == 0 {
            debug!("retrieval skipped: index is empty");
            return Ok(Vec::new());
        }
        if let Some(built_with) = self.store.embedder()?
            && built_with != self.embedder.name()
        {
            return Err(RetrievalError::EmbedderMismatch {
                index: built_with,
                query: self.embedder.name().to_string(),
            });
        }

        let top_k = filters.top_k.unwrap_or(self.top_k);
        let filter = filters.metadata_filter();
        let vector = self.embedder.embed(query)?;
        let hits = self.store.query(&vector, top_k, filter.as_ref())?;
        debug!(top_k, hits = hits.len(), "retrieved context");
        Ok(hits)
    }
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("embedder", &self.embedder.name())
            .field("top_k", &self.top_k)
            .finish_non_exhaustive()
    }
}

/// Renders hits as `[chunk_id] (source: source_type)\n{text}` blocks.
///
/// Returns [`NO_DOCUMENTS_FOUND`] for an empty slice so the model is told
/// explicitly that there is nothing to cite.
#[must_use]
pub fn format_for_prompt(hits: &[Hit]) -> String {
    if hits.is_empty() {
        return NO_DOCUMENTS_FOUND.to_string();
    }
    hits.iter()
        .map(|h| format!("[{}] (source: {})\n{}", h.chunk_id, h.source_type(), h.text))
        .collect::<Vec<_>>()
        .join(HIT_SEPARATOR)
}

/// Chunk IDs of `hits`, in retrieval order.
#[must_use]
pub fn citations(hits: &[Hit]) -> Vec<String> {
    hits.iter().map(|h| h.chunk_id.clone()).collect()
}
