//! Composite scoring for recalled entries.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::core::affect::EmotionVector;
use crate::core::config::ScoringConfig;
use crate::core::entry::MemoryEntry;
use crate::core::ids::TopicId;
use crate::storage::backend::ScoredEntry;

/// Recalled entry with its score breakdown.
#[derive(Clone, Debug)]
pub struct RecalledEntry {
    /// Final combined score.
    pub score: f64,
    /// Raw vector similarity component.
    pub similarity: f64,
    /// Time-decay component.
    pub time_score: f64,
    /// Mean linked-topic strength component.
    pub topic_score: f64,
    /// Affective resonance component.
    pub emotion_score: f64,
    /// Recalled entry.
    pub entry: MemoryEntry,
}

/// Re-rank raw similarity candidates with the composite score.
///
/// Every term degrades to zero when its input is missing: entries without
/// topic links or affect data rank on the remaining signals instead of
/// erroring. The output is exactly the input set, reordered.
#[must_use]
pub fn rank_candidates(
    candidates: Vec<ScoredEntry>,
    topic_strengths: &HashMap<TopicId, f32>,
    query_emotion: &EmotionVector,
    config: &ScoringConfig,
    now: DateTime<Utc>,
) -> Vec<RecalledEntry> {
    let mut ranked = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        let entry = candidate.entry;

        let age_seconds = now
            .signed_duration_since(entry.timestamp)
            .num_seconds()
            .max(0);
        #[allow(clippy::cast_precision_loss)]
        let time_score = (-(age_seconds as f64) / config.time_decay_seconds).exp();

        let strengths: Vec<f32> = entry
            .linked_topics
            .iter()
            .filter_map(|id| topic_strengths.get(id).copied())
            .collect();
        #[allow(clippy::cast_precision_loss)]
        let topic_score = if strengths.is_empty() {
            0.0
        } else {
            f64::from(strengths.iter().sum::<f32>()) / strengths.len() as f64
        };

        let emotion_score = f64::from(query_emotion.cosine(&entry.emotion));

        // Reserved activation signal; zero until a usage-based term exists.
        let activation = 0.0;

        let score = config.w_similarity * candidate.similarity
            + config.w_time * time_score
            + config.w_topic * topic_score
            + config.w_emotion * emotion_score
            + config.w_recency * activation;

        ranked.push(RecalledEntry {
            score,
            similarity: candidate.similarity,
            time_score,
            topic_score,
            emotion_score,
            entry,
        });
    }

    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked
}
