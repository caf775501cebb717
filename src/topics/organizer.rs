//! Topic consolidation: merge many small topics into one, reversibly.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::core::affect::EmotionVector;
use crate::core::config::OrganizerConfig;
use crate::core::entry::truncate_with_ellipsis;
use crate::core::errors::MemoryResult;
use crate::core::ids::{EntryId, TopicId};
use crate::core::topic::Topic;
use crate::core::vector::{cosine_similarity, mean};
use crate::oracle::{Oracle, extract_json_object};
use crate::storage::backend::StorageBackend;
use crate::topics::tokenize::MergeTokenizer;

const MERGE_SYSTEM: &str = "You consolidate small conversation topics into one general topic. \
Reply with exactly one JSON object of the shape {\"keyword\": string, \"topic_ids\": [string], \
\"title\": string|null, \"summary\": string|null}. Propose at least two topic_ids drawn from \
the provided list that share a theme.";

/// Parameters for one consolidation pass.
#[derive(Clone, Copy, Debug)]
pub struct MergeParams {
    /// Run only when more than this many topics are active (unless forced).
    pub min_topics: usize,
    /// Topics with at least this many entries are never merge sources.
    pub block_source_threshold: usize,
    /// Run even below the active-topic threshold.
    pub force: bool,
}

/// Why a consolidation pass did nothing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MergeSkip {
    /// Active topic count at or below the threshold and not forced.
    BelowTopicCount,
    /// No token shared by at least two small topics.
    NoCommonKeyword,
    /// Fewer than two sources survived the coherence filter.
    InsufficientCoherentSources,
}

impl fmt::Display for MergeSkip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BelowTopicCount => write!(f, "below active topic count threshold"),
            Self::NoCommonKeyword => write!(f, "no common keyword among small topics"),
            Self::InsufficientCoherentSources => {
                write!(f, "insufficient coherent sources")
            }
        }
    }
}

/// Outcome of a consolidation pass. Skips are advisory, not errors.
#[derive(Clone, Debug)]
pub enum MergeOutcome {
    /// Sources were merged into a new topic.
    Merged {
        /// The new general topic.
        topic_id: TopicId,
        /// The source topics, now emptied and disabled.
        source_ids: Vec<TopicId>,
        /// Entries whose topic links were rewritten.
        moved_entries: usize,
    },
    /// Nothing was merged.
    Skipped {
        /// Why the pass was a no-op.
        reason: MergeSkip,
    },
}

/// Outcome of a rollback.
#[derive(Clone, Debug)]
pub enum RollbackOutcome {
    /// The merge was undone.
    RolledBack {
        /// Source topics re-enabled with their entries restored.
        restored_topics: Vec<TopicId>,
        /// Entries whose topic links were restored.
        restored_entries: usize,
    },
    /// Nothing to roll back.
    Skipped {
        /// Why the rollback was a no-op.
        reason: String,
    },
}

/// Consolidates small topics and rolls consolidations back.
pub struct TopicOrganizer {
    storage: Arc<dyn StorageBackend>,
    oracle: Option<Arc<dyn Oracle>>,
    config: OrganizerConfig,
    tokenizer: MergeTokenizer,
}

impl TopicOrganizer {
    /// Create a new organizer.
    ///
    /// # Errors
    /// Returns an error if the tokenizer pattern fails to compile.
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        oracle: Option<Arc<dyn Oracle>>,
        config: OrganizerConfig,
    ) -> MemoryResult<Self> {
        Ok(Self {
            storage,
            oracle,
            config,
            tokenizer: MergeTokenizer::new()?,
        })
    }

    /// Merge parameters taken from the configured thresholds, unforced.
    ///
    /// This is the automatic trigger: the pass no-ops until the active
    /// topic count exceeds `trigger_topic_count`.
    #[must_use]
    pub fn default_params(&self) -> MergeParams {
        MergeParams {
            min_topics: self.config.trigger_topic_count,
            block_source_threshold: self.config.source_entry_cap,
            force: false,
        }
    }

    /// Run one consolidation pass.
    ///
    /// Source disabling happens after every entry rewrite and each rewrite
    /// is idempotent, so re-running a pass interrupted mid-merge converges
    /// to the same end state.
    ///
    /// # Errors
    /// Returns an error only on storage failures; every advisory abort is a
    /// [`MergeOutcome::Skipped`].
    pub async fn run(&self, params: MergeParams) -> MemoryResult<MergeOutcome> {
        let topics = self.storage.list_topics().await?;
        let active: Vec<Topic> = topics.into_iter().filter(Topic::is_active).collect();

        if !params.force && active.len() <= params.min_topics {
            return Ok(MergeOutcome::Skipped {
                reason: MergeSkip::BelowTopicCount,
            });
        }

        let small: Vec<&Topic> = active
            .iter()
            .filter(|topic| topic.entry_ids.len() < params.block_source_threshold)
            .collect();

        let suggestion = match &self.oracle {
            Some(oracle) => self.oracle_sources(oracle.as_ref(), &small).await,
            None => None,
        };

        let (keyword, candidate_ids, proposed_title, proposed_summary) = match suggestion {
            Some(suggestion) => (
                suggestion.keyword,
                suggestion.topic_ids,
                suggestion.title,
                suggestion.summary,
            ),
            None => {
                let texts: Vec<(TopicId, String)> = small
                    .iter()
                    .map(|topic| (topic.id, format!("{} {}", topic.title, topic.summary)))
                    .collect();
                match self
                    .tokenizer
                    .shared_keyword(&texts, self.config.token_length_cap)
                {
                    Some((keyword, topic_ids)) => (keyword, topic_ids, None, None),
                    None => {
                        return Ok(MergeOutcome::Skipped {
                            reason: MergeSkip::NoCommonKeyword,
                        });
                    }
                }
            }
        };

        let candidates: Vec<&Topic> = small
            .iter()
            .filter(|topic| candidate_ids.contains(&topic.id))
            .copied()
            .collect();

        let sources = self.coherent_sources(&candidates);
        if sources.len() < 2 {
            return Ok(MergeOutcome::Skipped {
                reason: MergeSkip::InsufficientCoherentSources,
            });
        }

        let merged = build_merged_topic(&sources, &keyword, proposed_title, proposed_summary);
        let source_ids: Vec<TopicId> = sources.iter().map(|topic| topic.id).collect();
        self.storage.upsert_topic(merged.clone()).await?;

        let moved_entries = self
            .move_entries(&merged.entry_ids, &source_ids, merged.id)
            .await?;

        for source in &sources {
            let mut source = (*source).clone();
            source.entry_ids.clear();
            source.disabled = true;
            if !source.parents.contains(&merged.id) {
                source.parents.push(merged.id);
            }
            self.storage.update_topic(source).await?;
        }

        info!(
            "merged {} topics into {} ({} entries, keyword {keyword:?})",
            source_ids.len(),
            merged.id,
            moved_entries
        );
        Ok(MergeOutcome::Merged {
            topic_id: merged.id,
            source_ids,
            moved_entries,
        })
    }

    /// Undo a consolidation: the exact inverse of the entry rewrites and
    /// source disabling performed by [`TopicOrganizer::run`].
    ///
    /// # Errors
    /// Returns an error only on storage failures.
    pub async fn rollback(&self, topic_id: TopicId) -> MemoryResult<RollbackOutcome> {
        let Some(mut merged) = self.storage.get_topic(topic_id).await? else {
            return Ok(RollbackOutcome::Skipped {
                reason: format!("unknown topic {topic_id}"),
            });
        };

        let source_set: HashSet<TopicId> = merged.children.iter().copied().collect();
        if source_set.is_empty() {
            return Ok(RollbackOutcome::Skipped {
                reason: format!("topic {topic_id} has no merge lineage"),
            });
        }

        let mut restored_by_source: HashMap<TopicId, Vec<EntryId>> = HashMap::new();
        let mut restored_entries = 0usize;
        for entry_id in &merged.entry_ids {
            let Some(mut entry) = self.storage.get_entry(*entry_id).await? else {
                continue;
            };

            let restored: Vec<TopicId> = entry
                .previous_topics
                .iter()
                .copied()
                .filter(|id| source_set.contains(id))
                .collect();

            entry.unlink_topic(merged.id);
            for id in &restored {
                entry.link_topic(*id);
                restored_by_source.entry(*id).or_default().push(*entry_id);
            }
            entry.previous_topics.retain(|id| !source_set.contains(id));
            self.storage.upsert_entry(entry).await?;
            restored_entries += 1;
        }

        let mut restored_topics = Vec::new();
        for source_id in &merged.children {
            let Some(entry_ids) = restored_by_source.remove(source_id) else {
                continue;
            };
            let Some(mut source) = self.storage.get_topic(*source_id).await? else {
                continue;
            };
            source.disabled = false;
            source.entry_ids = entry_ids;
            source.parents.retain(|id| *id != merged.id);
            self.storage.update_topic(source).await?;
            restored_topics.push(*source_id);
        }

        merged.entry_ids.clear();
        merged.disabled = true;
        self.storage.update_topic(merged).await?;

        info!(
            "rolled back merge {topic_id}: {} topics, {} entries restored",
            restored_topics.len(),
            restored_entries
        );
        Ok(RollbackOutcome::RolledBack {
            restored_topics,
            restored_entries,
        })
    }

    /// Keep candidates whose centroid is coherent with the candidate mean,
    /// most similar first, capped at the source limit.
    fn coherent_sources<'a>(&self, candidates: &[&'a Topic]) -> Vec<&'a Topic> {
        let centroids: Vec<Vec<f32>> = candidates
            .iter()
            .map(|topic| topic.centroid_embedding.clone())
            .collect();
        let mean_centroid = mean(&centroids);

        let mut scored: Vec<(f32, &Topic)> = candidates
            .iter()
            .map(|topic| {
                (
                    cosine_similarity(&topic.centroid_embedding, &mean_centroid),
                    *topic,
                )
            })
            .filter(|(similarity, _)| *similarity >= self.config.coherence_threshold)
            .collect();

        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.truncate(self.config.max_sources);
        scored.into_iter().map(|(_, topic)| topic).collect()
    }

    /// Ask the oracle for a keyword and candidate sources; any unusable
    /// reply falls through to the heuristic.
    async fn oracle_sources(
        &self,
        oracle: &dyn Oracle,
        small: &[&Topic],
    ) -> Option<MergeSuggestion> {
        if small.len() < 2 {
            return None;
        }

        let mut prompt = String::from("Small topics:\n");
        for topic in small {
            prompt.push_str(&format!("- {}: {} ({})\n", topic.id, topic.title, topic.summary));
        }

        let reply = match oracle.complete(MERGE_SYSTEM, &prompt).await {
            Ok(reply) => reply,
            Err(err) => {
                warn!("merge oracle unavailable, using heuristic: {err}");
                return None;
            }
        };

        let json = extract_json_object(&reply)?;
        let raw: RawSuggestion = match serde_json::from_str(json) {
            Ok(raw) => raw,
            Err(err) => {
                debug!("merge oracle reply invalid, using heuristic: {err}");
                return None;
            }
        };

        let keyword = raw.keyword?;
        let small_ids: HashSet<TopicId> = small.iter().map(|topic| topic.id).collect();
        let mut topic_ids = Vec::new();
        for id in raw.topic_ids.unwrap_or_default() {
            let Ok(topic_id) = id.parse::<TopicId>() else {
                debug!("merge oracle proposed unparseable topic id {id:?}");
                continue;
            };
            if small_ids.contains(&topic_id) && !topic_ids.contains(&topic_id) {
                topic_ids.push(topic_id);
            }
        }

        if topic_ids.len() < 2 {
            debug!("merge oracle proposed fewer than two usable sources");
            return None;
        }

        Some(MergeSuggestion {
            keyword,
            topic_ids,
            title: raw.title,
            summary: raw.summary,
        })
    }

    /// Rewrite moved entries: lineage first, then membership.
    async fn move_entries(
        &self,
        entry_ids: &[EntryId],
        source_ids: &[TopicId],
        merged_id: TopicId,
    ) -> MemoryResult<usize> {
        let source_set: HashSet<TopicId> = source_ids.iter().copied().collect();
        let mut moved = 0usize;

        for entry_id in entry_ids {
            let Some(mut entry) = self.storage.get_entry(*entry_id).await? else {
                continue;
            };

            let currently_linked: Vec<TopicId> = entry
                .linked_topics
                .iter()
                .copied()
                .filter(|id| source_set.contains(id))
                .collect();
            if currently_linked.is_empty() && entry.linked_topics.contains(&merged_id) {
                // Already rewritten by an interrupted earlier pass.
                continue;
            }

            for id in &currently_linked {
                if !entry.previous_topics.contains(id) {
                    entry.previous_topics.push(*id);
                }
            }
            entry.linked_topics.retain(|id| !source_set.contains(id));
            entry.link_topic(merged_id);
            self.storage.upsert_entry(entry).await?;
            moved += 1;
        }

        Ok(moved)
    }
}

struct MergeSuggestion {
    keyword: String,
    topic_ids: Vec<TopicId>,
    title: Option<String>,
    summary: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSuggestion {
    #[serde(default)]
    keyword: Option<String>,
    #[serde(default)]
    topic_ids: Option<Vec<String>>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    summary: Option<String>,
}

/// Character cap for synthesized merge summaries.
const MERGED_SUMMARY_CAP: usize = 160;

/// Build the general topic from its sources.
fn build_merged_topic(
    sources: &[&Topic],
    keyword: &str,
    proposed_title: Option<String>,
    proposed_summary: Option<String>,
) -> Topic {
    let mut entry_ids = Vec::new();
    let mut seen = HashSet::new();
    for source in sources {
        for entry_id in &source.entry_ids {
            if seen.insert(*entry_id) {
                entry_ids.push(*entry_id);
            }
        }
    }

    let centroids: Vec<Vec<f32>> = sources
        .iter()
        .map(|topic| topic.centroid_embedding.clone())
        .collect();
    let emotions: Vec<EmotionVector> = sources
        .iter()
        .map(|topic| topic.centroid_emotion.clone())
        .collect();

    #[allow(clippy::cast_precision_loss)]
    let strength = sources.iter().map(|topic| topic.strength).sum::<f32>() / sources.len() as f32;

    let title = proposed_title.unwrap_or_else(|| capitalize(keyword));
    let summary = proposed_summary.unwrap_or_else(|| {
        let examples: Vec<&str> = sources
            .iter()
            .take(3)
            .map(|topic| topic.title.as_str())
            .collect();
        truncate_with_ellipsis(
            &format!("Threads around \"{keyword}\": {}", examples.join("; ")),
            MERGED_SUMMARY_CAP,
        )
    });

    Topic {
        id: TopicId::new(),
        title,
        summary,
        strength: strength.clamp(0.0, 1.0),
        centroid_embedding: mean(&centroids),
        centroid_emotion: EmotionVector::mean(&emotions),
        entry_ids,
        parents: Vec::new(),
        children: sources.iter().map(|topic| topic.id).collect(),
        disabled: false,
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::entry::MemoryEntry;
    use crate::core::ids::ConversationId;
    use crate::storage::ephemeral::EphemeralBackend;

    fn params(block_source_threshold: usize) -> MergeParams {
        MergeParams {
            min_topics: 0,
            block_source_threshold,
            force: true,
        }
    }

    async fn seed_topic(
        storage: &Arc<EphemeralBackend>,
        title: &str,
        entry_count: usize,
        centroid: Vec<f32>,
    ) -> Topic {
        let conv = ConversationId::new();
        let mut topic: Option<Topic> = None;
        for index in 0..entry_count {
            let mut entry =
                MemoryEntry::new(conv, index as u64, "user", format!("{title} turn {index}"))
                    .unwrap();
            entry.embedding = centroid.clone();
            match &mut topic {
                None => {
                    topic = Some(Topic::seeded(title, format!("{title} thread"), &entry, 0.1));
                }
                Some(topic) => topic.attach(&entry, 0.3, 0.2),
            }
            entry.link_topic(topic.as_ref().unwrap().id);
            storage.upsert_entry(entry).await.unwrap();
        }

        let topic = topic.unwrap();
        storage.upsert_topic(topic.clone()).await.unwrap();
        topic
    }

    fn organizer(storage: &Arc<EphemeralBackend>) -> TopicOrganizer {
        let backend: Arc<dyn StorageBackend> = storage.clone();
        TopicOrganizer::new(backend, None, OrganizerConfig::default()).unwrap()
    }

    fn as_set(ids: &[EntryId]) -> HashSet<EntryId> {
        ids.iter().copied().collect()
    }

    #[tokio::test]
    async fn test_forced_merge_unions_entries_with_lineage() {
        let storage = Arc::new(EphemeralBackend::new());
        let trails = seed_topic(&storage, "hiking trails", 2, vec![1.0, 0.0]).await;
        let gear = seed_topic(&storage, "hiking gear", 2, vec![1.0, 0.0]).await;
        let organizer = organizer(&storage);

        let outcome = organizer.run(params(4)).await.unwrap();
        let MergeOutcome::Merged {
            topic_id,
            source_ids,
            moved_entries,
        } = outcome
        else {
            panic!("expected a merge");
        };

        assert_eq!(moved_entries, 4);
        assert_eq!(source_ids.len(), 2);

        let merged = storage.get_topic(topic_id).await.unwrap().unwrap();
        let expected: HashSet<EntryId> = trails
            .entry_ids
            .iter()
            .chain(gear.entry_ids.iter())
            .copied()
            .collect();
        assert_eq!(as_set(&merged.entry_ids), expected);
        assert!(merged.is_active());
        assert_eq!(
            merged.children.iter().copied().collect::<HashSet<_>>(),
            source_ids.iter().copied().collect::<HashSet<_>>()
        );

        for (source, entry_ids) in [(&trails, &trails.entry_ids), (&gear, &gear.entry_ids)] {
            for entry_id in entry_ids.iter() {
                let entry = storage.get_entry(*entry_id).await.unwrap().unwrap();
                assert_eq!(entry.previous_topics, vec![source.id]);
                assert_eq!(entry.linked_topics, vec![topic_id]);
            }
            let stored = storage.get_topic(source.id).await.unwrap().unwrap();
            assert!(stored.disabled);
            assert!(stored.entry_ids.is_empty());
            assert!(stored.parents.contains(&topic_id));
        }
    }

    #[tokio::test]
    async fn test_rollback_restores_pre_merge_state() {
        let storage = Arc::new(EphemeralBackend::new());
        let trails = seed_topic(&storage, "hiking trails", 2, vec![1.0, 0.0]).await;
        let gear = seed_topic(&storage, "hiking gear", 3, vec![1.0, 0.0]).await;
        let organizer = organizer(&storage);

        let outcome = organizer.run(params(4)).await.unwrap();
        let MergeOutcome::Merged { topic_id, .. } = outcome else {
            panic!("expected a merge");
        };

        let rollback = organizer.rollback(topic_id).await.unwrap();
        let RollbackOutcome::RolledBack {
            restored_topics,
            restored_entries,
        } = rollback
        else {
            panic!("expected a rollback");
        };
        assert_eq!(restored_entries, 5);
        assert_eq!(restored_topics.len(), 2);

        for source in [&trails, &gear] {
            let stored = storage.get_topic(source.id).await.unwrap().unwrap();
            assert!(!stored.disabled);
            assert_eq!(stored.entry_ids, source.entry_ids);
            assert!(stored.parents.is_empty());

            for entry_id in &source.entry_ids {
                let entry = storage.get_entry(*entry_id).await.unwrap().unwrap();
                assert_eq!(entry.linked_topics, vec![source.id]);
                assert!(entry.previous_topics.is_empty());
            }
        }

        let merged = storage.get_topic(topic_id).await.unwrap().unwrap();
        assert!(merged.disabled);
        assert!(merged.entry_ids.is_empty());
    }

    #[tokio::test]
    async fn test_source_threshold_boundary() {
        let storage = Arc::new(EphemeralBackend::new());
        let at_threshold = seed_topic(&storage, "hiking alpha", 3, vec![1.0, 0.0]).await;
        seed_topic(&storage, "hiking beta", 2, vec![1.0, 0.0]).await;
        seed_topic(&storage, "hiking gamma", 2, vec![1.0, 0.0]).await;
        let organizer = organizer(&storage);

        let outcome = organizer.run(params(3)).await.unwrap();
        let MergeOutcome::Merged { source_ids, .. } = outcome else {
            panic!("expected a merge");
        };
        assert_eq!(source_ids.len(), 2);
        assert!(!source_ids.contains(&at_threshold.id));

        let untouched = storage.get_topic(at_threshold.id).await.unwrap().unwrap();
        assert!(untouched.is_active());
        assert_eq!(untouched.entry_ids.len(), 3);
    }

    #[tokio::test]
    async fn test_below_topic_count_skips() {
        let storage = Arc::new(EphemeralBackend::new());
        seed_topic(&storage, "hiking trails", 2, vec![1.0, 0.0]).await;
        seed_topic(&storage, "hiking gear", 2, vec![1.0, 0.0]).await;
        let organizer = organizer(&storage);

        let outcome = organizer
            .run(MergeParams {
                min_topics: 10,
                block_source_threshold: 4,
                force: false,
            })
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            MergeOutcome::Skipped {
                reason: MergeSkip::BelowTopicCount
            }
        ));
    }

    #[tokio::test]
    async fn test_no_common_keyword_skips() {
        let storage = Arc::new(EphemeralBackend::new());
        seed_topic(&storage, "sourdough baking", 2, vec![1.0, 0.0]).await;
        seed_topic(&storage, "quantum physics", 2, vec![1.0, 0.0]).await;
        let organizer = organizer(&storage);

        let outcome = organizer.run(params(4)).await.unwrap();
        assert!(matches!(
            outcome,
            MergeOutcome::Skipped {
                reason: MergeSkip::NoCommonKeyword
            }
        ));
    }

    #[tokio::test]
    async fn test_incoherent_sources_skip() {
        let storage = Arc::new(EphemeralBackend::new());
        seed_topic(&storage, "hiking north", 2, vec![1.0, 0.0]).await;
        seed_topic(&storage, "hiking south", 2, vec![-1.0, 0.0]).await;
        let organizer = organizer(&storage);

        let outcome = organizer.run(params(4)).await.unwrap();
        assert!(matches!(
            outcome,
            MergeOutcome::Skipped {
                reason: MergeSkip::InsufficientCoherentSources
            }
        ));
    }

    #[tokio::test]
    async fn test_entry_rewrite_is_idempotent() {
        let storage = Arc::new(EphemeralBackend::new());
        let trails = seed_topic(&storage, "hiking trails", 2, vec![1.0, 0.0]).await;
        let gear = seed_topic(&storage, "hiking gear", 2, vec![1.0, 0.0]).await;
        let organizer = organizer(&storage);

        let outcome = organizer.run(params(4)).await.unwrap();
        let MergeOutcome::Merged { topic_id, .. } = outcome else {
            panic!("expected a merge");
        };

        // Re-running the rewrite (as a crashed pass would) changes nothing.
        let merged = storage.get_topic(topic_id).await.unwrap().unwrap();
        let source_ids = vec![trails.id, gear.id];
        let moved = organizer
            .move_entries(&merged.entry_ids, &source_ids, topic_id)
            .await
            .unwrap();
        assert_eq!(moved, 0);

        for entry_id in &merged.entry_ids {
            let entry = storage.get_entry(*entry_id).await.unwrap().unwrap();
            assert_eq!(entry.previous_topics.len(), 1);
            assert_eq!(entry.linked_topics, vec![topic_id]);
        }
    }

    #[tokio::test]
    async fn test_default_params_apply_configured_trigger() {
        let storage = Arc::new(EphemeralBackend::new());
        seed_topic(&storage, "hiking trails", 2, vec![1.0, 0.0]).await;
        seed_topic(&storage, "hiking gear", 2, vec![1.0, 0.0]).await;

        let backend: Arc<dyn StorageBackend> = storage.clone();
        let quiet = TopicOrganizer::new(backend.clone(), None, OrganizerConfig::default()).unwrap();
        let outcome = quiet.run(quiet.default_params()).await.unwrap();
        assert!(matches!(
            outcome,
            MergeOutcome::Skipped {
                reason: MergeSkip::BelowTopicCount
            }
        ));

        let mut config = OrganizerConfig::default();
        config.trigger_topic_count = 1;
        let eager = TopicOrganizer::new(backend, None, config).unwrap();
        let outcome = eager.run(eager.default_params()).await.unwrap();
        assert!(matches!(outcome, MergeOutcome::Merged { .. }));
    }

    #[tokio::test]
    async fn test_rollback_unknown_topic_skips() {
        let storage = Arc::new(EphemeralBackend::new());
        let organizer = organizer(&storage);
        let outcome = organizer.rollback(TopicId::new()).await.unwrap();
        assert!(matches!(outcome, RollbackOutcome::Skipped { .. }));
    }
}
