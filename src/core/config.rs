//! Configuration for the memory engine.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::core::errors::{MemoryError, MemoryResult};

/// Top-level configuration for the memory engine.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Embedding provider settings.
    pub embedding: EmbeddingConfig,
    /// Composite recall scoring settings.
    pub scoring: ScoringConfig,
    /// Topic assignment and update settings.
    pub topics: TopicConfig,
    /// Topic consolidation settings.
    pub organizer: OrganizerConfig,
    /// Storage backend settings.
    pub storage: StorageConfig,
    /// Retrieval candidate settings.
    pub retrieval: RetrievalConfig,
    /// Optional reasoning oracle settings.
    pub oracle: OracleConfig,
}

impl MemoryConfig {
    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> MemoryResult<()> {
        if self.embedding.ndims == 0 {
            return Err(MemoryError::InvalidConfig(
                "embedding.ndims must be > 0".to_string(),
            ));
        }

        if let Some(base_url) = &self.embedding.base_url {
            Url::parse(base_url)?;
        }

        if let Some(base_url) = &self.oracle.base_url {
            Url::parse(base_url)?;
        }

        if !(self.scoring.time_decay_seconds > 0.0) {
            return Err(MemoryError::InvalidConfig(
                "scoring.time_decay_seconds must be > 0".to_string(),
            ));
        }

        for (name, weight) in [
            ("w_similarity", self.scoring.w_similarity),
            ("w_time", self.scoring.w_time),
            ("w_topic", self.scoring.w_topic),
            ("w_emotion", self.scoring.w_emotion),
            ("w_recency", self.scoring.w_recency),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(MemoryError::InvalidConfig(format!(
                    "scoring.{name} must be finite and >= 0"
                )));
            }
        }

        if !(0.0..=1.0).contains(&self.topics.match_threshold) {
            return Err(MemoryError::InvalidConfig(
                "topics.match_threshold must be in [0, 1]".to_string(),
            ));
        }

        for (name, alpha) in [
            ("centroid_alpha", self.topics.centroid_alpha),
            ("strength_alpha", self.topics.strength_alpha),
        ] {
            if !(alpha > 0.0 && alpha < 1.0) {
                return Err(MemoryError::InvalidConfig(format!(
                    "topics.{name} must be in (0, 1)"
                )));
            }
        }

        if !(0.0..=1.0).contains(&self.topics.initial_strength) {
            return Err(MemoryError::InvalidConfig(
                "topics.initial_strength must be in [0, 1]".to_string(),
            ));
        }

        if self.topics.window_turns == 0 {
            return Err(MemoryError::InvalidConfig(
                "topics.window_turns must be > 0".to_string(),
            ));
        }

        if self.topics.title_max_chars == 0 || self.topics.summary_max_chars == 0 {
            return Err(MemoryError::InvalidConfig(
                "topics title/summary caps must be > 0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.organizer.coherence_threshold) {
            return Err(MemoryError::InvalidConfig(
                "organizer.coherence_threshold must be in [0, 1]".to_string(),
            ));
        }

        if self.organizer.max_sources < 2 {
            return Err(MemoryError::InvalidConfig(
                "organizer.max_sources must be >= 2".to_string(),
            ));
        }

        if self.organizer.token_length_cap == 0 {
            return Err(MemoryError::InvalidConfig(
                "organizer.token_length_cap must be > 0".to_string(),
            ));
        }

        if self.retrieval.candidate_multiplier == 0 || self.retrieval.candidate_floor == 0 {
            return Err(MemoryError::InvalidConfig(
                "retrieval candidate multiplier and floor must be > 0".to_string(),
            ));
        }

        if self.retrieval.query_cache_capacity == 0 {
            return Err(MemoryError::InvalidConfig(
                "retrieval.query_cache_capacity must be > 0".to_string(),
            ));
        }

        validate_collection_prefix(&self.storage.collection_prefix)?;

        Ok(())
    }
}

/// Collection names are interpolated into SQL, so the prefix is restricted
/// to identifier characters.
fn validate_collection_prefix(prefix: &str) -> MemoryResult<()> {
    if prefix.is_empty() {
        return Err(MemoryError::InvalidConfig(
            "storage.collection_prefix must not be empty".to_string(),
        ));
    }

    let valid = prefix
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '_');
    if !valid || prefix.starts_with(|ch: char| ch.is_ascii_digit()) {
        return Err(MemoryError::InvalidConfig(format!(
            "storage.collection_prefix must be an identifier, got {prefix:?}"
        )));
    }

    Ok(())
}

/// Embedding provider selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProviderKind {
    /// Deterministic feature-hashing embedder, always available.
    Hash,
    /// Model-backed embedder via the Ollama provider.
    Ollama,
}

/// Embedding provider settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Which provider to construct.
    pub provider: EmbeddingProviderKind,
    /// Model name for model-backed providers.
    pub model: String,
    /// Embedding vector dimensions.
    pub ndims: usize,
    /// Optional custom base URL.
    pub base_url: Option<String>,
    /// Unit-normalize output vectors.
    pub normalize: bool,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::Hash,
            model: "nomic-embed-text".to_string(),
            ndims: 768,
            base_url: None,
            normalize: true,
        }
    }
}

/// Weights and constants for the composite recall score.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Weight of raw vector similarity.
    pub w_similarity: f64,
    /// Weight of the exponential time-decay term.
    pub w_time: f64,
    /// Weight of mean linked-topic strength.
    pub w_topic: f64,
    /// Weight of affective resonance with the query.
    pub w_emotion: f64,
    /// Weight of the reserved activation signal.
    pub w_recency: f64,
    /// Time-decay constant tau, in seconds.
    pub time_decay_seconds: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            w_similarity: 1.0,
            w_time: 0.2,
            w_topic: 0.2,
            w_emotion: 0.15,
            w_recency: 0.0,
            time_decay_seconds: 60.0 * 60.0 * 24.0 * 7.0,
        }
    }
}

/// Topic assignment and update settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TopicConfig {
    /// Minimum window-to-centroid similarity to attach to an existing topic.
    pub match_threshold: f32,
    /// EMA rate for centroid updates on attach.
    pub centroid_alpha: f32,
    /// EMA rate for strength updates on attach.
    pub strength_alpha: f32,
    /// Strength given to a freshly created topic.
    pub initial_strength: f32,
    /// Number of recent turns in the assignment window.
    pub window_turns: usize,
    /// Character cap for derived topic titles.
    pub title_max_chars: usize,
    /// Character cap for derived topic summaries.
    pub summary_max_chars: usize,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            match_threshold: 0.35,
            centroid_alpha: 0.3,
            strength_alpha: 0.2,
            initial_strength: 0.1,
            window_turns: 6,
            title_max_chars: 48,
            summary_max_chars: 160,
        }
    }
}

/// Topic consolidation settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrganizerConfig {
    /// Active-topic count above which consolidation triggers unforced.
    pub trigger_topic_count: usize,
    /// Topics with at least this many entries are never merge sources.
    pub source_entry_cap: usize,
    /// Minimum centroid similarity to the candidate mean to stay a source.
    pub coherence_threshold: f32,
    /// Maximum number of source topics per merge.
    pub max_sources: usize,
    /// Length clip applied when scoring keyword tokens.
    pub token_length_cap: usize,
}

impl Default for OrganizerConfig {
    fn default() -> Self {
        Self {
            trigger_topic_count: 64,
            source_entry_cap: 4,
            coherence_threshold: 0.55,
            max_sources: 8,
            token_length_cap: 8,
        }
    }
}

/// Storage backend selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackendKind {
    /// In-process linear-scan store.
    Ephemeral,
    /// Persistent sqlite-vec indexed store.
    Sqlite,
}

/// Storage backend settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Which backend to construct.
    pub backend: StorageBackendKind,
    /// `SQLite` database path for the persistent backend.
    pub sqlite_path: PathBuf,
    /// Prefix for derived collection names.
    pub collection_prefix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackendKind::Ephemeral,
            sqlite_path: PathBuf::from("memory.sqlite"),
            collection_prefix: "threadmind".to_string(),
        }
    }
}

/// Retrieval candidate settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Candidate superset size as a multiple of k.
    pub candidate_multiplier: usize,
    /// Minimum candidate superset size.
    pub candidate_floor: usize,
    /// Capacity of the query embedding cache.
    pub query_cache_capacity: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            candidate_multiplier: 3,
            candidate_floor: 20,
            query_cache_capacity: 128,
        }
    }
}

/// Reasoning oracle settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Whether topic decisions may be delegated to the oracle.
    pub enabled: bool,
    /// Completion model name.
    pub model: String,
    /// Temperature for oracle calls.
    pub temperature: f64,
    /// Optional max tokens.
    pub max_tokens: Option<u64>,
    /// Optional custom base URL.
    pub base_url: Option<String>,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            model: "ministral-3:8b-instruct-2512-q8_0".to_string(),
            temperature: 0.0,
            max_tokens: None,
            base_url: None,
        }
    }
}
