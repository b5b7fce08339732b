//! fastembed (ONNX) backend.

use std::sync::Mutex;

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use tracing::{debug, info};

use super::{DEFAULT_BATCH_SIZE, DEFAULT_DIMENSIONS, Embedder};
use crate::error::EmbeddingError;

/// Local all-MiniLM-L6-v2 embedder.
///
/// `TextEmbedding::embed` needs `&mut self`, so the model sits behind a
/// mutex; concurrent callers serialise on inference.
pub struct FastEmbedEmbedder {
    model: Mutex<TextEmbedding>,
}

impl FastEmbedEmbedder {
    /// Loads (downloading on first use) the embedding model.
    ///
    /// # Errors
    ///
    /// Returns [`EmbeddingError::Init`] if the model cannot be loaded.
    pub fn new() -> Result<Self, EmbeddingError> {
        let model = TextEmbedding::try_new(
            InitOptions::new(EmbeddingModel::AllMiniLML6V2).with_show_download_progress(false),
        )
        .map_err(|e| EmbeddingError::Init {
            message: e.to_string(),
        })?;
        info!(model = "all-minilm-l6-v2", dims = DEFAULT_DIMENSIONS, "loaded fastembed model");
        Ok(Self {
            model: Mutex::new(model),
        })
    }
}

impl std::fmt::Debug for FastEmbedEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedEmbedder")
            .field("model", &"all-minilm-l6-v2")
            .finish()
    }
}

impl Embedder for FastEmbedEmbedder {
    fn name(&self) -> &str {
        "fastembed:all-minilm-l6-v2"
    }

    fn dimensions(&self) -> usize {
        DEFAULT_DIMENSIONS
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let mut model = self.model.lock().map_err(|_| EmbeddingError::Inference {
            message: "embedding model lock poisoned".to_string(),
        })?;
        debug!(count = texts.len(), "embedding batch");
        let vectors = model
            .embed(texts.to_vec(), Some(DEFAULT_BATCH_SIZE))
            .map_err(|e| EmbeddingError::Inference {
                message: e.to_string(),
            })?;
        if vectors.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: texts.len(),
                actual: vectors.len(),
            });
        }
        Ok(vectors)
    }
}
