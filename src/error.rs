//! Error types for nexus-rs.
//!
//! Each layer owns its error enum; the top-level [`Error`] composes them
//! so library callers can use a single [`Result`] alias.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Document loading or chunking failure.
    #[error(transparent)]
    Chunking(#[from] ChunkingError),

    /// Embedding model failure.
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    /// Vector index failure.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Query-time retrieval failure.
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    /// Model provider or orchestration failure.
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// CLI command failure.
    #[error(transparent)]
    Command(#[from] CommandError),
}

/// Errors raised while loading and chunking knowledge documents.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// Reading a directory or file failed.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path that could not be read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised by embedding backends.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// The model could not be loaded.
    #[error("embedding model initialisation failed: {message}")]
    Init {
        /// Backend-provided detail.
        message: String,
    },

    /// Inference failed for a batch.
    #[error("embedding failed: {message}")]
    Inference {
        /// Backend-provided detail.
        message: String,
    },

    /// The backend returned a different number of vectors than inputs.
    #[error("embedding backend returned {actual} vectors for {expected} inputs")]
    CountMismatch {
        /// Number of inputs submitted.
        expected: usize,
        /// Number of vectors returned.
        actual: usize,
    },
}

/// Errors raised by the vector index.
#[derive(Debug, Error)]
pub enum StorageError {
    /// SQLite returned an error.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Metadata or vector (de)serialisation failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Creating the database directory failed.
    #[error("failed to prepare index directory {path}: {source}")]
    Io {
        /// Directory path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A query or upsert vector had the wrong dimensionality.
    #[error("vector dimension mismatch: index has {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimensionality stored in the index.
        expected: usize,
        /// Dimensionality supplied.
        actual: usize,
    },

    /// Number of vectors and chunks supplied to an upsert differ.
    #[error("upsert received {vectors} vectors for {chunks} chunks")]
    VectorCountMismatch {
        /// Chunk count.
        chunks: usize,
        /// Vector count.
        vectors: usize,
    },

    /// A lock guarding the in-memory snapshot was poisoned.
    #[error("index lock poisoned")]
    LockPoisoned,
}

/// Errors raised while answering a retrieval query.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// The query text could not be embedded.
    #[error("query embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    /// The index could not be queried.
    #[error("index query failed: {0}")]
    Storage(#[from] StorageError),

    /// The index was built by a different embedding backend than the one
    /// embedding the query.
    #[error("index was built with embedder '{index}' but queries use '{query}'; rebuild the index")]
    EmbedderMismatch {
        /// Backend recorded in the index.
        index: String,
        /// Backend embedding the query.
        query: String,
    },
}

/// Errors raised by model providers and the orchestration loop.
#[derive(Debug, Error)]
pub enum AgentError {
    /// No API key is configured for any provider.
    #[error("no API key configured (set OPENAI_API_KEY, GOOGLE_API_KEY or ANTHROPIC_API_KEY)")]
    ApiKeyMissing,

    /// The provider for a model has no credentials or client registered.
    #[error("provider '{provider}' is not available for model '{model}'")]
    ProviderUnavailable {
        /// Provider name.
        provider: String,
        /// Model that was requested.
        model: String,
    },

    /// An unknown provider name was supplied.
    #[error("unsupported provider: {name}")]
    UnsupportedProvider {
        /// The unrecognised name.
        name: String,
    },

    /// The provider request failed (network, auth, rate limit, server error).
    #[error("{provider} request failed{}: {message}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    ApiRequest {
        /// Provider name.
        provider: String,
        /// Error detail.
        message: String,
        /// HTTP status when known.
        status: Option<u16>,
    },

    /// The provider response could not be interpreted.
    #[error("failed to parse {provider} response: {message}")]
    ResponseParse {
        /// Provider name.
        provider: String,
        /// Parse failure detail.
        message: String,
    },

    /// Invalid input to the orchestrator.
    #[error("orchestration error: {message}")]
    Orchestration {
        /// Failure detail.
        message: String,
    },
}

impl AgentError {
    /// Renders the error for end users, bounded to `max_chars` characters.
    ///
    /// Raw provider messages can be long or contain request echoes, so the
    /// display form is always truncated.
    #[must_use]
    pub fn user_message(&self, max_chars: usize) -> String {
        truncate_chars(&self.to_string(), max_chars)
    }
}

/// Errors raised inside analysis tools.
///
/// These never escape the tool registry: they are rendered into a JSON
/// `{"error": ...}` payload for the model.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Arguments did not match the tool's schema.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// Required market data is missing or malformed.
    #[error("data unavailable: {0}")]
    Data(String),

    /// The tool panicked while running.
    #[error("tool panicked: {0}")]
    Panicked(String),
}

/// Errors raised by CLI commands.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Command failed to run.
    #[error("{0}")]
    ExecutionFailed(String),

    /// An argument was rejected.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Output could not be rendered.
    #[error("output formatting failed: {0}")]
    OutputFormat(String),
}

/// Truncates `text` to at most `max_chars` characters (not bytes).
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars_multibyte() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn test_api_request_display_with_status() {
        let err = AgentError::ApiRequest {
            provider: "anthropic".to_string(),
            message: "overloaded".to_string(),
            status: Some(529),
        };
        assert_eq!(
            err.to_string(),
            "anthropic request failed (HTTP 529): overloaded"
        );
    }

    #[test]
    fn test_user_message_is_bounded() {
        let err = AgentError::ApiRequest {
            provider: "openai".to_string(),
            message: "x".repeat(1000),
            status: None,
        };
        assert_eq!(err.user_message(300).chars().count(), 300);
    }

    #[test]
    fn test_error_from_layers() {
        let err: Error = StorageError::LockPoisoned.into();
        assert!(matches!(err, Error::Storage(_)));
        let err: Error = CommandError::InvalidArgument("k".to_string()).into();
        assert_eq!(err.to_string(), "invalid argument: k");
    }
}
