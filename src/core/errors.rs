//! Error types for the memory engine.

use thiserror::Error;

use crate::core::ids::TopicId;

/// Memory engine error type.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// Invalid configuration or unsupported values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Invalid memory entry content or ordering.
    #[error("invalid memory entry: {0}")]
    InvalidEntry(String),
    /// Referenced topic does not exist in storage.
    #[error("topic not found: {0}")]
    TopicNotFound(TopicId),
    /// Embedding or oracle backend unreachable; callers degrade locally.
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Oracle reply did not match the expected contract.
    #[error("malformed oracle response: {0}")]
    MalformedOracleResponse(String),
    /// `SQLite` storage error (sync).
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// `SQLite` storage error (async).
    #[error("tokio-rusqlite error: {0}")]
    TokioSqlite(#[from] tokio_rusqlite::Error),
    /// Embedding error.
    #[error("embedding error: {0}")]
    Embedding(#[from] rig::embeddings::EmbeddingError),
    /// HTTP client error from Rig.
    #[error("http client error: {0}")]
    HttpClient(#[from] rig::http_client::Error),
    /// Completion error.
    #[error("completion error: {0}")]
    Completion(#[from] rig::completion::CompletionError),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// URL parse error.
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Required `SQLite` extension not available.
    #[error("sqlite-vec extension is not available; load it before initializing the vector backend")]
    SqliteVecUnavailable,
}

/// Convenience result alias for memory operations.
pub type MemoryResult<T> = Result<T, MemoryError>;
