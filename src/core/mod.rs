//! Core data model: configuration, errors, ids, entries, topics, affect.

pub mod affect;
pub mod config;
pub mod entry;
pub mod errors;
pub mod ids;
pub mod topic;
pub mod vector;

pub use affect::EmotionVector;
pub use config::{
    EmbeddingConfig, EmbeddingProviderKind, MemoryConfig, OracleConfig, OrganizerConfig,
    RetrievalConfig, ScoringConfig, StorageBackendKind, StorageConfig, TopicConfig,
};
pub use entry::MemoryEntry;
pub use errors::{MemoryError, MemoryResult};
pub use ids::{ConversationId, EntryId, TopicId};
pub use topic::Topic;
