//! Storage contract shared by the ephemeral and persistent backends.

use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};

use crate::core::entry::MemoryEntry;
use crate::core::errors::MemoryResult;
use crate::core::ids::{ConversationId, EntryId, TopicId};
use crate::core::topic::Topic;

/// Boxed future type for storage operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Entry-level search filters.
///
/// All present filters are ANDed together and applied before similarity
/// ranking; both backends honor identical semantics.
#[derive(Clone, Debug, Default)]
pub struct SearchFilters {
    /// Exact speaker match.
    pub speaker: Option<String>,
    /// Entry must be linked to at least one of these topics.
    pub topics_any: Option<Vec<TopicId>>,
    /// Inclusive timestamp range.
    pub time_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

impl SearchFilters {
    /// Whether an entry passes every present filter.
    #[must_use]
    pub fn matches(&self, entry: &MemoryEntry) -> bool {
        if let Some(speaker) = &self.speaker
            && entry.speaker != *speaker
        {
            return false;
        }

        if let Some(topics) = &self.topics_any
            && !topics.iter().any(|id| entry.linked_topics.contains(id))
        {
            return false;
        }

        if let Some((from, to)) = &self.time_range
            && (entry.timestamp < *from || entry.timestamp > *to)
        {
            return false;
        }

        true
    }
}

/// Entry plus its raw vector similarity to the query.
#[derive(Clone, Debug)]
pub struct ScoredEntry {
    /// Cosine similarity to the query vector.
    pub similarity: f64,
    /// Retrieved entry.
    pub entry: MemoryEntry,
}

/// Persistence contract for entries and topics.
///
/// `search_entries` ranks by raw vector similarity only; composite scoring
/// belongs to the retrieval layer.
pub trait StorageBackend: Send + Sync {
    /// Insert or replace an entry.
    ///
    /// # Errors
    /// Returns an error if the store cannot persist the entry.
    fn upsert_entry(&self, entry: MemoryEntry) -> StoreFuture<'_, MemoryResult<()>>;

    /// Fetch an entry by id.
    ///
    /// # Errors
    /// Returns an error if the store cannot be queried.
    fn get_entry(&self, id: EntryId) -> StoreFuture<'_, MemoryResult<Option<MemoryEntry>>>;

    /// Record a symmetric adjacency link between two entries.
    ///
    /// # Errors
    /// Returns an error if either entry is unknown or persistence fails.
    fn link_entries(&self, a: EntryId, b: EntryId) -> StoreFuture<'_, MemoryResult<()>>;

    /// Vector search over entries, filters applied before ranking.
    ///
    /// Returns at most `k` results ordered by descending similarity.
    ///
    /// # Errors
    /// Returns an error if the query cannot be executed.
    fn search_entries(
        &self,
        query: Vec<f32>,
        k: usize,
        filters: Option<SearchFilters>,
    ) -> StoreFuture<'_, MemoryResult<Vec<ScoredEntry>>>;

    /// All entries of a conversation, ordered by turn index.
    ///
    /// # Errors
    /// Returns an error if the store cannot be queried.
    fn list_entries_by_conversation(
        &self,
        conversation_id: ConversationId,
    ) -> StoreFuture<'_, MemoryResult<Vec<MemoryEntry>>>;

    /// Insert or replace a topic.
    ///
    /// # Errors
    /// Returns an error if the store cannot persist the topic.
    fn upsert_topic(&self, topic: Topic) -> StoreFuture<'_, MemoryResult<()>>;

    /// Fetch a topic by id.
    ///
    /// # Errors
    /// Returns an error if the store cannot be queried.
    fn get_topic(&self, id: TopicId) -> StoreFuture<'_, MemoryResult<Option<Topic>>>;

    /// All topics, tombstoned ones included.
    ///
    /// # Errors
    /// Returns an error if the store cannot be queried.
    fn list_topics(&self) -> StoreFuture<'_, MemoryResult<Vec<Topic>>>;

    /// Rewrite an existing topic.
    ///
    /// # Errors
    /// Returns [`crate::core::errors::MemoryError::TopicNotFound`] if the
    /// topic does not exist, or an error if persistence fails.
    fn update_topic(&self, topic: Topic) -> StoreFuture<'_, MemoryResult<()>>;
}
