//! Long-term semantic memory for conversational agents.
//!
//! Dialogue turns are embedded, clustered into evolving topics, and served
//! back through recall queries that blend semantic similarity, recency,
//! topic salience, and affective resonance. The crate is organized into:
//! - `core`: configuration, errors, ids, entries, topics, affect vectors
//! - `emotion`: lexicon-based affect inference
//! - `embedding`: embedding providers (hashing fallback, Ollama)
//! - `oracle`: optional reasoning oracle boundary
//! - `storage`: ephemeral and sqlite-vec backends behind one contract
//! - `topics`: per-turn topic assignment and reversible consolidation
//! - `retrieval`: composite-scored recall and filtered exploration
//! - `maintenance`: background consolidation worker
//! - `engine`: the `MemoryCore` orchestrator

// Unsafe code is confined to the sqlite-vec extension loader.
#![deny(unsafe_code)]
#![forbid(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod core;
pub mod embedding;
pub mod emotion;
pub mod engine;
pub mod maintenance;
pub mod oracle;
pub mod retrieval;
pub mod storage;
pub mod topics;

pub use crate::core::{
    ConversationId, EmbeddingConfig, EmbeddingProviderKind, EmotionVector, EntryId, MemoryConfig,
    MemoryEntry, MemoryError, MemoryResult, OracleConfig, OrganizerConfig, RetrievalConfig,
    ScoringConfig, StorageBackendKind, StorageConfig, Topic, TopicConfig, TopicId,
};
pub use crate::embedding::{EmbedFuture, Embedder, HashEmbedder, OllamaEmbedder, build_embedder};
pub use crate::emotion::EmotionAnalyzer;
pub use crate::engine::{ExploreResponse, MemoryBackends, MemoryCore, RecallResponse};
pub use crate::maintenance::{BackgroundConsolidation, MaintenanceConfig};
pub use crate::oracle::{OllamaOracle, Oracle, OracleFuture};
pub use crate::retrieval::{ExploreQuery, RecalledEntry, RetrievalEngine};
pub use crate::storage::{
    EphemeralBackend, ScoredEntry, SearchFilters, SqliteVectorBackend, StorageBackend, StoreFuture,
    init_sqlite_vec_extension,
};
pub use crate::topics::{
    MergeOutcome, MergeParams, MergeSkip, RollbackOutcome, TopicAssigner, TopicDecision,
    TopicOrganizer,
};

/// Initialize tracing with a basic subscriber.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_env_filter("info").try_init();
}
