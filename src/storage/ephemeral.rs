//! In-process storage backend: linear-scan cosine search over a `DashMap`.

use dashmap::DashMap;

use crate::core::entry::MemoryEntry;
use crate::core::errors::{MemoryError, MemoryResult};
use crate::core::ids::{ConversationId, EntryId, TopicId};
use crate::core::topic::Topic;
use crate::core::vector::cosine_similarity;
use crate::storage::backend::{ScoredEntry, SearchFilters, StorageBackend, StoreFuture};

/// Ephemeral backend for tests and small deployments.
#[derive(Debug, Default)]
pub struct EphemeralBackend {
    entries: DashMap<EntryId, MemoryEntry>,
    topics: DashMap<TopicId, Topic>,
}

impl EphemeralBackend {
    /// Create an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for EphemeralBackend {
    fn upsert_entry(&self, entry: MemoryEntry) -> StoreFuture<'_, MemoryResult<()>> {
        Box::pin(async move {
            self.entries.insert(entry.id, entry);
            Ok(())
        })
    }

    fn get_entry(&self, id: EntryId) -> StoreFuture<'_, MemoryResult<Option<MemoryEntry>>> {
        Box::pin(async move { Ok(self.entries.get(&id).map(|entry| entry.value().clone())) })
    }

    fn link_entries(&self, a: EntryId, b: EntryId) -> StoreFuture<'_, MemoryResult<()>> {
        Box::pin(async move {
            {
                let mut entry = self
                    .entries
                    .get_mut(&a)
                    .ok_or_else(|| MemoryError::InvalidEntry(format!("unknown entry {a}")))?;
                entry.link_entry(b);
            }
            {
                let mut entry = self
                    .entries
                    .get_mut(&b)
                    .ok_or_else(|| MemoryError::InvalidEntry(format!("unknown entry {b}")))?;
                entry.link_entry(a);
            }
            Ok(())
        })
    }

    fn search_entries(
        &self,
        query: Vec<f32>,
        k: usize,
        filters: Option<SearchFilters>,
    ) -> StoreFuture<'_, MemoryResult<Vec<ScoredEntry>>> {
        Box::pin(async move {
            let filters = filters.unwrap_or_default();
            let mut results: Vec<ScoredEntry> = self
                .entries
                .iter()
                .filter(|entry| !entry.embedding.is_empty() && filters.matches(entry))
                .map(|entry| ScoredEntry {
                    similarity: f64::from(cosine_similarity(&query, &entry.embedding)),
                    entry: entry.value().clone(),
                })
                .collect();

            results.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
            results.truncate(k);
            Ok(results)
        })
    }

    fn list_entries_by_conversation(
        &self,
        conversation_id: ConversationId,
    ) -> StoreFuture<'_, MemoryResult<Vec<MemoryEntry>>> {
        Box::pin(async move {
            let mut entries: Vec<MemoryEntry> = self
                .entries
                .iter()
                .filter(|entry| entry.conversation_id == conversation_id)
                .map(|entry| entry.value().clone())
                .collect();
            entries.sort_by_key(|entry| entry.turn_index);
            Ok(entries)
        })
    }

    fn upsert_topic(&self, topic: Topic) -> StoreFuture<'_, MemoryResult<()>> {
        Box::pin(async move {
            self.topics.insert(topic.id, topic);
            Ok(())
        })
    }

    fn get_topic(&self, id: TopicId) -> StoreFuture<'_, MemoryResult<Option<Topic>>> {
        Box::pin(async move { Ok(self.topics.get(&id).map(|topic| topic.value().clone())) })
    }

    fn list_topics(&self) -> StoreFuture<'_, MemoryResult<Vec<Topic>>> {
        Box::pin(async move {
            Ok(self
                .topics
                .iter()
                .map(|topic| topic.value().clone())
                .collect::<Vec<_>>())
        })
    }

    fn update_topic(&self, topic: Topic) -> StoreFuture<'_, MemoryResult<()>> {
        Box::pin(async move {
            if !self.topics.contains_key(&topic.id) {
                return Err(MemoryError::TopicNotFound(topic.id));
            }
            self.topics.insert(topic.id, topic);
            Ok(())
        })
    }
}
