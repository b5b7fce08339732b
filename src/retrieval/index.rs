//! Full rebuild of the vector index from a knowledge directory.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info};

use crate::chunking::load_and_chunk_directory;
use crate::embedding::{DEFAULT_BATCH_SIZE, Embedder};
use crate::error::{EmbeddingError, Result};
use crate::storage::VectorStore;

/// Outcome of an index build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexReport {
    /// Chunks written to the index.
    pub chunks: usize,
    /// Distinct source files indexed.
    pub documents: usize,
    /// Chunk count per `source_type`.
    pub source_types: BTreeMap<String, usize>,
}

/// Rebuilds the index from `knowledge_dir` using the default batch size.
///
/// # Errors
///
/// See [`build_index_with_batch`].
pub fn build_index(
    knowledge_dir: &Path,
    store: &dyn VectorStore,
    embedder: &dyn Embedder,
) -> Result<IndexReport> {
    build_index_with_batch(knowledge_dir, store, embedder, DEFAULT_BATCH_SIZE)
}

/// Rebuilds the index from `knowledge_dir`, embedding `batch_size` chunks
/// per backend call.
///
/// When the directory yields no chunks the index is left untouched and an
/// empty report is returned. Otherwise every chunk is embedded first and
/// the store is replaced in one step; an embedding failure aborts the
/// build without modifying the index.
///
/// # Errors
///
/// Returns an error if the directory cannot be read, embedding fails, or
/// the store rejects the write.
pub fn build_index_with_batch(
    knowledge_dir: &Path,
    store: &dyn VectorStore,
    embedder: &dyn Embedder,
    batch_size: usize,
) -> Result<IndexReport> {
    let chunks = load_and_chunk_directory(knowledge_dir)?;
    if chunks.is_empty() {
        info!(dir = %knowledge_dir.display(), "no documents found to index");
        return Ok(IndexReport::default());
    }

    let mut vectors = Vec::with_capacity(chunks.len());
    for (i, batch) in chunks.chunks(batch_size.max(1)).enumerate() {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let embedded = embedder.embed_batch(&texts)?;
        if embedded.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: texts.len(),
                actual: embedded.len(),
            }
            .into());
        }
        debug!(batch = i, size = texts.len(), "embedded batch");
        vectors.extend(embedded);
    }

    store.upsert(&chunks, vectors, embedder.name())?;

    let mut source_types = BTreeMap::new();
    let mut documents = BTreeSet::new();
    for chunk in &chunks {
        *source_types
            .entry(chunk.source_type().to_string())
            .or_insert(0) += 1;
        if let Some(file) = chunk.metadata.get("source_file") {
            documents.insert(file.as_str());
        }
    }

    let report = IndexReport {
        chunks: chunks.len(),
        documents: documents.len(),
        source_types,
    };
    info!(
        chunks = report.chunks,
        documents = report.documents,
        embedder = embedder.name(),
        dir = %knowledge_dir.display(),
        "index built"
    );
    Ok(report)
}
