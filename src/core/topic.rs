//! Topic model: a cluster of entries with a running centroid and salience.

use serde::{Deserialize, Serialize};

use crate::core::affect::EmotionVector;
use crate::core::entry::MemoryEntry;
use crate::core::ids::{EntryId, TopicId};
use crate::core::vector;

/// A conversational thread: entries clustered around a semantic centroid.
///
/// Topics are never physically deleted. Consolidation empties a source topic
/// and sets `disabled`, keeping it addressable as a rollback target; the
/// `parents`/`children` lists record merge lineage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    /// Unique topic identifier.
    pub id: TopicId,
    /// Short human-readable title.
    pub title: String,
    /// One-line summary.
    pub summary: String,
    /// EMA salience signal, bounded to `[0, 1]`.
    pub strength: f32,
    /// Centroid of member embeddings.
    pub centroid_embedding: Vec<f32>,
    /// Centroid of member affect.
    pub centroid_emotion: EmotionVector,
    /// Owned member entries.
    pub entry_ids: Vec<EntryId>,
    /// Topics this one was merged into.
    pub parents: Vec<TopicId>,
    /// Topics merged into this one.
    pub children: Vec<TopicId>,
    /// Tombstone flag set by consolidation.
    pub disabled: bool,
}

impl Topic {
    /// Create a topic seeded from its first entry.
    #[must_use]
    pub fn seeded(
        title: impl Into<String>,
        summary: impl Into<String>,
        entry: &MemoryEntry,
        initial_strength: f32,
    ) -> Self {
        Self {
            id: TopicId::new(),
            title: title.into(),
            summary: summary.into(),
            strength: initial_strength.clamp(0.0, 1.0),
            centroid_embedding: entry.embedding.clone(),
            centroid_emotion: entry.emotion.clone(),
            entry_ids: vec![entry.id],
            parents: Vec::new(),
            children: Vec::new(),
            disabled: false,
        }
    }

    /// Attach an entry: EMA the centroids toward it and the strength toward 1.
    pub fn attach(&mut self, entry: &MemoryEntry, centroid_alpha: f32, strength_alpha: f32) {
        self.centroid_embedding =
            vector::ema_blend(&self.centroid_embedding, &entry.embedding, centroid_alpha);
        self.centroid_emotion = self
            .centroid_emotion
            .ema_blend(&entry.emotion, centroid_alpha);
        self.strength =
            (strength_alpha + (1.0 - strength_alpha) * self.strength).clamp(0.0, 1.0);
        if !self.entry_ids.contains(&entry.id) {
            self.entry_ids.push(entry.id);
        }
    }

    /// Whether the topic currently owns the entry.
    #[must_use]
    pub fn contains_entry(&self, entry_id: EntryId) -> bool {
        self.entry_ids.contains(&entry_id)
    }

    /// Whether the topic participates in assignment and consolidation.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        !self.disabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ids::ConversationId;

    fn entry_with_embedding(embedding: Vec<f32>) -> MemoryEntry {
        let mut entry =
            MemoryEntry::new(ConversationId::new(), 0, "user", "some text").unwrap();
        entry.embedding = embedding;
        entry
    }

    #[test]
    fn test_seeded_topic_adopts_entry_state() {
        let entry = entry_with_embedding(vec![0.1, 0.2]);
        let topic = Topic::seeded("title", "summary", &entry, 0.1);
        assert_eq!(topic.centroid_embedding, entry.embedding);
        assert_eq!(topic.entry_ids, vec![entry.id]);
        assert!(topic.is_active());
    }

    #[test]
    fn test_strength_bounded_under_repeated_attach() {
        let entry = entry_with_embedding(vec![1.0, 0.0]);
        let mut topic = Topic::seeded("t", "s", &entry, 0.1);
        for alpha in [0.05f32, 0.5, 0.95] {
            for _ in 0..200 {
                topic.attach(&entry, 0.3, alpha);
                assert!((0.0..=1.0).contains(&topic.strength));
            }
        }
        assert!(topic.strength > 0.9);
    }

    #[test]
    fn test_attach_is_set_like_on_members() {
        let entry = entry_with_embedding(vec![1.0, 0.0]);
        let mut topic = Topic::seeded("t", "s", &entry, 0.1);
        topic.attach(&entry, 0.3, 0.2);
        topic.attach(&entry, 0.3, 0.2);
        assert_eq!(topic.entry_ids.len(), 1);
    }

    #[test]
    fn test_attach_moves_centroid_toward_entry() {
        let seed = entry_with_embedding(vec![1.0, 0.0]);
        let mut topic = Topic::seeded("t", "s", &seed, 0.1);
        let other = entry_with_embedding(vec![0.0, 1.0]);
        topic.attach(&other, 0.5, 0.2);
        assert!((topic.centroid_embedding[0] - 0.5).abs() < 1e-6);
        assert!((topic.centroid_embedding[1] - 0.5).abs() < 1e-6);
    }
}
