//! SQLite-persisted vector index with an in-memory snapshot.
//!
//! Vectors are persisted as little-endian `f32` blobs. Queries never touch
//! SQLite: they scan an immutable [`Snapshot`] held behind an
//! `RwLock<Arc<_>>`. A rebuild writes the new chunk set in a single
//! transaction, then swaps in a fresh snapshot, so a reader sees either the
//! old set or the new one in full.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};

use rayon::prelude::*;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use tracing::{debug, info};

use super::schema::{SCHEMA_SQL, SCHEMA_VERSION};
use super::{MetadataFilter, VectorStore};
use crate::core::{Chunk, Hit, Metadata};
use crate::embedding::{blob_to_vec, cosine_distance, vec_to_blob};
use crate::error::StorageError;

/// One indexed chunk with its vector.
#[derive(Debug)]
struct Entry {
    chunk: Chunk,
    vector: Vec<f32>,
}

/// Immutable view of the index used by readers.
#[derive(Debug, Default)]
struct Snapshot {
    dimensions: Option<usize>,
    embedder: Option<String>,
    entries: Vec<Entry>,
}

/// Summary of the current index contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    /// Number of chunks.
    pub chunks: usize,
    /// Number of distinct source documents (by `doc_id`).
    pub documents: usize,
    /// Vector dimensionality, if the index is non-empty.
    pub dimensions: Option<usize>,
    /// Embedder that built the index, if recorded.
    pub embedder: Option<String>,
    /// Chunk counts per `source_type`.
    pub source_types: BTreeMap<String, usize>,
}

/// Vector index persisted in a single SQLite file.
pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
    snapshot: RwLock<Arc<Snapshot>>,
}

impl SqliteVectorStore {
    /// Opens (creating if needed) the index at `path` and loads it.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the directory cannot be created or the
    /// database cannot be opened or read.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|source| StorageError::Io {
                path: parent.display().to_string(),
                source,
            })?;
        }
        let conn = Connection::open(path)?;
        debug!(path = %path.display(), "opened index database");
        Self::from_connection(conn)
    }

    /// Creates a transient in-memory index.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Database`] if SQLite cannot initialise.
    pub fn in_memory() -> Result<Self, StorageError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(SCHEMA_SQL)?;
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        let snapshot = Self::load_snapshot(&conn)?;
        debug!(chunks = snapshot.entries.len(), "loaded index snapshot");
        Ok(Self {
            conn: Mutex::new(conn),
            snapshot: RwLock::new(Arc::new(snapshot)),
        })
    }

    fn meta_value(conn: &Connection, key: &str) -> Result<Option<String>, StorageError> {
        Ok(conn
            .query_row(
                "SELECT value FROM index_meta WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn load_snapshot(conn: &Connection) -> Result<Snapshot, StorageError> {
        let dimensions = Self::meta_value(conn, "dimensions")?.and_then(|d| d.parse::<usize>().ok());
        let embedder = Self::meta_value(conn, "embedder")?;

        let mut stmt = conn.prepare(
            "SELECT chunk_id, text, metadata, embedding FROM chunks ORDER BY position",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Vec<u8>>(3)?,
            ))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (chunk_id, text, metadata, blob) = row?;
            let metadata: Metadata = serde_json::from_str(&metadata)?;
            entries.push(Entry {
                chunk: Chunk {
                    chunk_id,
                    text,
                    metadata,
                },
                vector: blob_to_vec(&blob),
            });
        }

        Ok(Snapshot {
            dimensions,
            embedder,
            entries,
        })
    }

    fn current(&self) -> Result<Arc<Snapshot>, StorageError> {
        self.snapshot
            .read()
            .map(|guard| Arc::clone(&guard))
            .map_err(|_| StorageError::LockPoisoned)
    }

    /// Summarises the current index contents.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::LockPoisoned`] if the snapshot lock is poisoned.
    pub fn stats(&self) -> Result<IndexStats, StorageError> {
        let snapshot = self.current()?;
        let mut source_types = BTreeMap::new();
        let mut documents = std::collections::BTreeSet::new();
        for entry in &snapshot.entries {
            *source_types
                .entry(entry.chunk.source_type().to_string())
                .or_insert(0) += 1;
            if let Some(doc_id) = entry.chunk.metadata.get("doc_id") {
                documents.insert(doc_id.as_str());
            }
        }
        Ok(IndexStats {
            chunks: snapshot.entries.len(),
            documents: documents.len(),
            dimensions: snapshot.dimensions,
            embedder: snapshot.embedder.clone(),
            source_types,
        })
    }
}

impl std::fmt::Debug for SqliteVectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteVectorStore")
            .field("chunks", &self.current().map(|s| s.entries.len()).ok())
            .finish_non_exhaustive()
    }
}

impl VectorStore for SqliteVectorStore {
    fn upsert(&self, chunks: &[Chunk], vectors: Vec<Vec<f32>>, embedder: &str) -> Result<(), StorageError> {
        if chunks.len() != vectors.len() {
            return Err(StorageError::VectorCountMismatch {
                chunks: chunks.len(),
                vectors: vectors.len(),
            });
        }
        let dimensions = vectors.first().map(Vec::len);
        if let Some(expected) = dimensions
            && let Some(bad) = vectors.iter().find(|v| v.len() != expected)
        {
            return Err(StorageError::DimensionMismatch {
                expected,
                actual: bad.len(),
            });
        }

        // The connection guard is held until the snapshot swap so concurrent
        // rebuilds publish in commit order.
        let mut conn = self.conn.lock().map_err(|_| StorageError::LockPoisoned)?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM chunks", [])?;
        tx.execute("DELETE FROM index_meta", [])?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO chunks (chunk_id, position, text, metadata, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for (position, (chunk, vector)) in chunks.iter().zip(&vectors).enumerate() {
                let metadata = serde_json::to_string(&chunk.metadata)?;
                let position = i64::try_from(position).unwrap_or(i64::MAX);
                insert.execute(params![
                    chunk.chunk_id,
                    position,
                    chunk.text,
                    metadata,
                    vec_to_blob(vector)
                ])?;
            }
        }
        if let Some(dims) = dimensions {
            tx.execute(
                "INSERT INTO index_meta (key, value) VALUES ('dimensions', ?1)",
                params![dims.to_string()],
            )?;
        }
        tx.execute(
            "INSERT INTO index_meta (key, value) VALUES ('embedder', ?1)",
            params![embedder],
        )?;
        tx.commit()?;

        let entries = chunks
            .iter()
            .cloned()
            .zip(vectors)
            .map(|(chunk, vector)| Entry { chunk, vector })
            .collect();
        let fresh = Arc::new(Snapshot {
            dimensions,
            embedder: Some(embedder.to_string()),
            entries,
        });

        let mut guard = self
            .snapshot
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;
        *guard = fresh;
        drop(guard);
        drop(conn);
        info!(chunks = chunks.len(), ?dimensions, embedder, "index replaced");
        Ok(())
    }

    fn embedder(&self) -> Result<Option<String>, StorageError> {
        Ok(self.current()?.embedder.clone())
    }

    fn query(
        &self,
        vector: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Hit>, StorageError> {
        let snapshot = self.current()?;
        if snapshot.entries.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if let Some(expected) = snapshot.dimensions
            && expected != vector.len()
        {
            return Err(StorageError::DimensionMismatch {
                expected,
                actual: vector.len(),
            });
        }

        let mut scored: Vec<(f32, &Entry)> = snapshot
            .entries
            .par_iter()
            .filter(|e| filter.is_none_or(|f| f.matches(&e.chunk.metadata)))
            .map(|e| (cosine_distance(vector, &e.vector), e))
            .collect();

        scored.sort_by(|(da, a), (db, b)| {
            da.total_cmp(db)
                .then_with(|| a.chunk.chunk_id.cmp(&b.chunk.chunk_id))
        });
        scored.truncate(k);

        debug!(
            hits = scored.len(),
            k,
            filter = ?filter.map(MetadataFilter::to_json),
            "index query"
        );

        Ok(scored
            .into_iter()
            .map(|(distance, e)| Hit {
                chunk_id: e.chunk.chunk_id.clone(),
                text: e.chunk.text.clone(),
                metadata: e.chunk.metadata.clone(),
                distance,
            })
            .collect())
    }

    fn count(&self) -> Result<usize, StorageError> {
        Ok(self.current()?.entries.len())
    }

    fn chunk_ids(&self) -> Result<Vec<String>, StorageError> {
        let mut ids: Vec<String> = self
            .current()?
            .entries
            .iter()
            .map(|e| e.chunk.chunk_id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn chunk(id: &str, source_type: &str, severity: &str) -> Chunk {
        let mut metadata = Metadata::new();
        metadata.insert("source_type".to_string(), source_type.to_string());
        metadata.insert("severity".to_string(), severity.to_string());
        metadata.insert("doc_id".to_string(), id.split(':').next().unwrap().to_string());
        Chunk {
            chunk_id: id.to_string(),
            text: format!("text of {id}"),
            metadata,
        }
    }

    fn seeded() -> SqliteVectorStore {
        let store = SqliteVectorStore::in_memory().unwrap();
        let chunks = vec![
            chunk("a:chunk_0", "event_db", "Critical"),
            chunk("a:chunk_1", "event_db", "High"),
            chunk("b:chunk_0", "methodology", "High"),
        ];
        let vectors = vec![vec![1.0, 0.0], vec![0.7, 0.7], vec![0.0, 1.0]];
        store.upsert(&chunks, vectors, "test").unwrap();
        store
    }

    #[test]
    fn test_empty_index_query_returns_nothing() {
        let store = SqliteVectorStore::in_memory().unwrap();
        assert!(store.query(&[1.0, 0.0, 0.0], 4, None).unwrap().is_empty());
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_query_orders_by_distance() {
        let store = seeded();
        let hits = store.query(&[1.0, 0.0], 2, None).unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.chunk_id.as_str()).collect();
        assert_eq!(ids, ["a:chunk_0", "a:chunk_1"]);
        assert!(hits[0].distance <= hits[1].distance);
    }

    #[test]
    fn test_query_applies_conjunctive_filter() {
        let store = seeded();
        let filter =
            MetadataFilter::from_pairs([("source_type", "event_db"), ("severity", "High")]).unwrap();
        let hits = store.query(&[0.0, 1.0], 5, Some(&filter)).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk_id, "a:chunk_1");
    }

    #[test]
    fn test_upsert_replaces_previous_contents() {
        let store = seeded();
        store
            .upsert(&[chunk("c:chunk_0", "other", "Low")], vec![vec![0.5, 0.5]], "test")
            .unwrap();
        assert_eq!(store.chunk_ids().unwrap(), ["c:chunk_0"]);
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        let store = seeded();
        let before = store.chunk_ids().unwrap();
        let chunks = vec![
            chunk("a:chunk_0", "event_db", "Critical"),
            chunk("a:chunk_1", "event_db", "High"),
            chunk("b:chunk_0", "methodology", "High"),
        ];
        store
            .upsert(&chunks, vec![vec![1.0, 0.0], vec![0.7, 0.7], vec![0.0, 1.0]], "test")
            .unwrap();
        assert_eq!(store.chunk_ids().unwrap(), before);
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let store = seeded();
        assert!(matches!(
            store.query(&[1.0, 0.0, 0.0], 1, None),
            Err(StorageError::DimensionMismatch { expected: 2, actual: 3 })
        ));
        let err = store.upsert(
            &[chunk("x:chunk_0", "other", "Low"), chunk("x:chunk_1", "other", "Low")],
            vec![vec![1.0], vec![1.0, 2.0]],
            "test",
        );
        assert!(matches!(err, Err(StorageError::DimensionMismatch { .. })));
        assert_eq!(store.count().unwrap(), 3);
    }

    #[test]
    fn test_count_mismatch_rejected() {
        let store = SqliteVectorStore::in_memory().unwrap();
        let err = store.upsert(&[chunk("x:chunk_0", "other", "Low")], Vec::new(), "test");
        assert!(matches!(err, Err(StorageError::VectorCountMismatch { chunks: 1, vectors: 0 })));
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("index.db");
        {
            let store = SqliteVectorStore::open(&path).unwrap();
            store
                .upsert(&[chunk("p:chunk_0", "case_study", "High")], vec![vec![0.0, 1.0]], "test")
                .unwrap();
        }
        let store = SqliteVectorStore::open(&path).unwrap();
        let stats = store.stats().unwrap();
        assert_eq!(stats.chunks, 1);
        assert_eq!(stats.dimensions, Some(2));
        assert_eq!(stats.embedder.as_deref(), Some("test"));
        assert_eq!(store.embedder().unwrap().as_deref(), Some("test"));
        assert_eq!(stats.source_types.get("case_study"), Some(&1));
        let hits = store.query(&[0.0, 1.0], 1, None).unwrap();
        assert_eq!(hits[0].metadata["severity"], "High");
    }

    #[test]
    fn test_empty_index_has_no_embedder() {
        let store = SqliteVectorStore::in_memory().unwrap();
        assert_eq!(store.embedder().unwrap(), None);
        assert_eq!(store.stats().unwrap().embedder, None);
    }

    #[test]
    fn test_concurrent_rebuilds_publish_committed_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.db");
        let store = SqliteVectorStore::open(&path).unwrap();

        std::thread::scope(|scope| {
            for worker in 0..4 {
                let store = &store;
                scope.spawn(move || {
                    for round in 0..10 {
                        let id = format!("w{worker}r{round}:chunk_0");
                        store
                            .upsert(&[chunk(&id, "other", "Low")], vec![vec![1.0, 0.0]], "test")
                            .unwrap();
                    }
                });
            }
        });

        let published = store.chunk_ids().unwrap();
        drop(store);
        let committed = SqliteVectorStore::open(&path).unwrap().chunk_ids().unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published, committed);
    }

    #[test]
    fn test_stats_counts_documents() {
        let stats = seeded().stats().unwrap();
        assert_eq!(stats.chunks, 3);
        assert_eq!(stats.documents, 2);
        assert_eq!(stats.source_types.get("event_db"), Some(&2));
    }
}
