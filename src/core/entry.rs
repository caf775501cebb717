//! Memory entry model.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::affect::EmotionVector;
use crate::core::errors::{MemoryError, MemoryResult};
use crate::core::ids::{ConversationId, EntryId, TopicId};

/// One ingested dialogue turn.
///
/// Entries are append-only: once created they are never physically deleted.
/// Superseding is recorded in `meta`, and topic membership history survives
/// consolidation in `previous_topics` so merges can be rolled back exactly.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    /// Unique entry identifier.
    pub id: EntryId,
    /// Conversation the entry belongs to.
    pub conversation_id: ConversationId,
    /// Position within the conversation, strictly increasing.
    pub turn_index: u64,
    /// Ingestion timestamp.
    pub timestamp: DateTime<Utc>,
    /// Who produced the turn (e.g. `user`, `assistant`).
    pub speaker: String,
    /// Raw turn text.
    pub text: String,
    /// Short summary of the turn.
    pub summary: String,
    /// Embedding vector, present once ingestion completes.
    pub embedding: Vec<f32>,
    /// Affect extracted from the text.
    pub emotion: EmotionVector,
    /// Free-form metadata.
    pub meta: HashMap<String, String>,
    /// Current topic memberships (set semantics).
    pub linked_topics: Vec<TopicId>,
    /// Historical memberships retained across merges.
    pub previous_topics: Vec<TopicId>,
    /// Adjacent entries in the same conversation.
    pub linked_entries: Vec<EntryId>,
}

impl MemoryEntry {
    /// Create a new entry with empty linkage.
    ///
    /// # Errors
    /// Returns an error if the text is empty after trimming.
    pub fn new(
        conversation_id: ConversationId,
        turn_index: u64,
        speaker: impl Into<String>,
        text: impl Into<String>,
    ) -> MemoryResult<Self> {
        let text = text.into();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(MemoryError::InvalidEntry("text is empty".to_string()));
        }

        Ok(Self {
            id: EntryId::new(),
            conversation_id,
            turn_index,
            timestamp: Utc::now(),
            speaker: speaker.into(),
            text: trimmed.to_string(),
            summary: String::new(),
            embedding: Vec::new(),
            emotion: EmotionVector::new(),
            meta: HashMap::new(),
            linked_topics: Vec::new(),
            previous_topics: Vec::new(),
            linked_entries: Vec::new(),
        })
    }

    /// Add a topic membership (no-op if already linked).
    pub fn link_topic(&mut self, topic_id: TopicId) {
        if !self.linked_topics.contains(&topic_id) {
            self.linked_topics.push(topic_id);
        }
    }

    /// Remove a topic membership.
    pub fn unlink_topic(&mut self, topic_id: TopicId) {
        self.linked_topics.retain(|id| *id != topic_id);
    }

    /// Record an adjacency link (no-op if already linked).
    pub fn link_entry(&mut self, entry_id: EntryId) {
        if entry_id != self.id && !self.linked_entries.contains(&entry_id) {
            self.linked_entries.push(entry_id);
        }
    }

    /// Truncate `text` into a summary of at most `max_chars` characters,
    /// with an ellipsis marker when cut.
    #[must_use]
    pub fn summarize(text: &str, max_chars: usize) -> String {
        truncate_with_ellipsis(text.trim(), max_chars)
    }
}

/// Cap a string at `max_chars` characters, appending an ellipsis when cut.
#[must_use]
pub fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let cut = max_chars.saturating_sub(1);
    let mut out: String = text.chars().take(cut).collect();
    out = out.trim_end().to_string();
    out.push('…');
    out
}
