//! Memory engine orchestration.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::core::config::{MemoryConfig, StorageBackendKind};
use crate::core::entry::MemoryEntry;
use crate::core::errors::{MemoryError, MemoryResult};
use crate::core::ids::{ConversationId, TopicId};
use crate::core::topic::Topic;
use crate::embedding::{Embedder, HashEmbedder, build_embedder};
use crate::emotion::EmotionAnalyzer;
use crate::maintenance::{BackgroundConsolidation, MaintenanceConfig};
use crate::oracle::{OllamaOracle, Oracle};
use crate::retrieval::engine::{ExploreQuery, RetrievalEngine};
use crate::retrieval::ranking::RecalledEntry;
use crate::storage::backend::{ScoredEntry, StorageBackend};
use crate::storage::ephemeral::EphemeralBackend;
use crate::storage::sqlite::SqliteVectorBackend;
use crate::storage::sqlite_vec_loader::init_sqlite_vec_extension;
use crate::topics::assigner::{TopicAssigner, TopicDecision};
use crate::topics::organizer::{MergeOutcome, MergeParams, RollbackOutcome, TopicOrganizer};

/// Backend dependencies for the memory core.
pub struct MemoryBackends {
    /// Storage backend implementation.
    pub storage: Arc<dyn StorageBackend>,
    /// Embedding provider.
    pub embedder: Arc<dyn Embedder>,
    /// Optional reasoning oracle.
    pub oracle: Option<Arc<dyn Oracle>>,
}

impl MemoryBackends {
    /// Build backends from config.
    ///
    /// The oracle and model-backed embedder degrade to their deterministic
    /// fallbacks when unavailable; only storage failures are fatal here.
    ///
    /// # Errors
    /// Returns an error if the storage backend cannot be initialized.
    pub async fn from_config(config: &MemoryConfig) -> MemoryResult<Self> {
        let storage: Arc<dyn StorageBackend> = match config.storage.backend {
            StorageBackendKind::Ephemeral => Arc::new(EphemeralBackend::new()),
            StorageBackendKind::Sqlite => {
                init_sqlite_vec_extension();
                Arc::new(SqliteVectorBackend::new(config).await?)
            }
        };

        let embedder = build_embedder(&config.embedding);

        let oracle: Option<Arc<dyn Oracle>> = if config.oracle.enabled {
            match OllamaOracle::new(&config.oracle) {
                Ok(oracle) => Some(Arc::new(oracle)),
                Err(err) => {
                    warn!("oracle unavailable, heuristics only: {err}");
                    None
                }
            }
        } else {
            None
        };

        Ok(Self {
            storage,
            embedder,
            oracle,
        })
    }
}

/// Response of [`MemoryCore::recall`].
#[derive(Clone, Debug, Default)]
pub struct RecallResponse {
    /// Texts of the recalled entries, best first.
    pub texts: Vec<String>,
    /// Topics linked from the recalled entries.
    pub topics: Vec<Topic>,
    /// Recalled entries with score breakdowns.
    pub entries: Vec<RecalledEntry>,
}

/// Response of [`MemoryCore::explore`].
#[derive(Clone, Debug, Default)]
pub struct ExploreResponse {
    /// Matching entries with raw similarity, best first.
    pub results: Vec<ScoredEntry>,
    /// Topics linked from the results.
    pub topics: Vec<Topic>,
}

/// Orchestrates ingestion, recall, and consolidation.
///
/// Ingestion is serialized per conversation id so turn indices and
/// adjacency links never race; different conversations ingest concurrently
/// and retrieval never takes the ingestion locks.
pub struct MemoryCore {
    config: MemoryConfig,
    storage: Arc<dyn StorageBackend>,
    embedder: Arc<dyn Embedder>,
    fallback_embedder: HashEmbedder,
    emotion: EmotionAnalyzer,
    assigner: TopicAssigner,
    organizer: Arc<TopicOrganizer>,
    retrieval: RetrievalEngine,
    conversation_locks: DashMap<ConversationId, Arc<Mutex<()>>>,
}

impl MemoryCore {
    /// Create a new memory core.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn new(config: MemoryConfig, backends: MemoryBackends) -> MemoryResult<Self> {
        config.validate()?;

        let assigner = TopicAssigner::new(
            backends.embedder.clone(),
            backends.oracle.clone(),
            config.topics.clone(),
        );
        let organizer = Arc::new(TopicOrganizer::new(
            backends.storage.clone(),
            backends.oracle.clone(),
            config.organizer.clone(),
        )?);
        let retrieval = RetrievalEngine::new(
            backends.storage.clone(),
            backends.embedder.clone(),
            config.scoring.clone(),
            config.retrieval.clone(),
        )?;
        let fallback_embedder = HashEmbedder::new(config.embedding.ndims, config.embedding.normalize);

        Ok(Self {
            config,
            storage: backends.storage,
            embedder: backends.embedder,
            fallback_embedder,
            emotion: EmotionAnalyzer::new(),
            assigner,
            organizer,
            retrieval,
            conversation_locks: DashMap::new(),
        })
    }

    /// Create a new core, building backends from config.
    ///
    /// # Errors
    /// Returns an error if backends cannot be initialized or the
    /// configuration is invalid.
    pub async fn from_config(config: MemoryConfig) -> MemoryResult<Self> {
        let backends = MemoryBackends::from_config(&config).await?;
        Self::new(config, backends)
    }

    /// Store a dialogue turn, assigning the next turn index.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    pub async fn remember(
        &self,
        text: &str,
        conversation_id: ConversationId,
        speaker: &str,
        meta: HashMap<String, String>,
    ) -> MemoryResult<MemoryEntry> {
        let lock = self.conversation_lock(conversation_id);
        let _guard = lock.lock().await;

        let history = self
            .storage
            .list_entries_by_conversation(conversation_id)
            .await?;
        let turn_index = history.last().map_or(0, |entry| entry.turn_index + 1);
        self.ingest_locked(conversation_id, turn_index, speaker, text, meta, history)
            .await
    }

    /// Store a dialogue turn at an explicit turn index.
    ///
    /// # Errors
    /// Returns an error if the index does not extend the conversation or
    /// storage access fails.
    pub async fn ingest_turn(
        &self,
        conversation_id: ConversationId,
        turn_index: u64,
        speaker: &str,
        text: &str,
        meta: HashMap<String, String>,
    ) -> MemoryResult<MemoryEntry> {
        let lock = self.conversation_lock(conversation_id);
        let _guard = lock.lock().await;

        let history = self
            .storage
            .list_entries_by_conversation(conversation_id)
            .await?;
        self.ingest_locked(conversation_id, turn_index, speaker, text, meta, history)
            .await
    }

    /// Conversational recall over long-term memory.
    ///
    /// Embedding provider failures degrade to an empty response so the
    /// conversation stays alive; storage failures are never masked.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    pub async fn recall(&self, text: &str, k: usize) -> MemoryResult<RecallResponse> {
        let entries = match self.retrieval.auto_recall(text, k).await {
            Ok(entries) => entries,
            Err(
                err @ (MemoryError::Embedding(_)
                | MemoryError::HttpClient(_)
                | MemoryError::ProviderUnavailable(_)),
            ) => {
                warn!("recall degraded to empty results: {err}");
                return Ok(RecallResponse::default());
            }
            Err(err) => return Err(err),
        };

        let topic_ids: Vec<TopicId> = unique_topic_ids(entries.iter().map(|entry| &entry.entry));
        let topics = self.load_topics(&topic_ids).await?;
        let texts = entries.iter().map(|entry| entry.entry.text.clone()).collect();

        Ok(RecallResponse {
            texts,
            topics,
            entries,
        })
    }

    /// Directed browsing with storage-level filters only.
    ///
    /// # Errors
    /// Returns an error if embedding or storage access fails.
    pub async fn explore(&self, query: &ExploreQuery, k: usize) -> MemoryResult<ExploreResponse> {
        let results = self.retrieval.explore(query, k).await?;
        let topic_ids: Vec<TopicId> = unique_topic_ids(results.iter().map(|result| &result.entry));
        let topics = self.load_topics(&topic_ids).await?;

        Ok(ExploreResponse { results, topics })
    }

    /// Run a consolidation pass.
    ///
    /// Runs outside the per-conversation ingestion locks.
    ///
    /// # Errors
    /// Returns an error only on storage failures; advisory aborts are a
    /// skipped status.
    pub async fn run_topic_merge(
        &self,
        min_topics: usize,
        block_source_threshold: usize,
        force: bool,
    ) -> MemoryResult<MergeOutcome> {
        self.organizer
            .run(MergeParams {
                min_topics,
                block_source_threshold,
                force,
            })
            .await
    }

    /// Run a consolidation pass with the configured thresholds.
    ///
    /// No-ops until the active topic count exceeds the configured trigger;
    /// intended for periodic maintenance between turns.
    ///
    /// # Errors
    /// Returns an error only on storage failures.
    pub async fn consolidate_if_needed(&self) -> MemoryResult<MergeOutcome> {
        self.organizer.run(self.organizer.default_params()).await
    }

    /// Build a background consolidation worker sharing this core's
    /// organizer. The caller spawns and stops it.
    #[must_use]
    pub fn consolidation_worker(&self, config: MaintenanceConfig) -> BackgroundConsolidation {
        BackgroundConsolidation::new(self.organizer.clone(), config)
    }

    /// Undo a consolidation.
    ///
    /// # Errors
    /// Returns an error only on storage failures.
    pub async fn rollback(&self, topic_id: TopicId) -> MemoryResult<RollbackOutcome> {
        self.organizer.rollback(topic_id).await
    }

    fn conversation_lock(&self, conversation_id: ConversationId) -> Arc<Mutex<()>> {
        self.conversation_locks
            .entry(conversation_id)
            .or_default()
            .clone()
    }

    /// Ingestion pipeline, called with the conversation lock held.
    async fn ingest_locked(
        &self,
        conversation_id: ConversationId,
        turn_index: u64,
        speaker: &str,
        text: &str,
        meta: HashMap<String, String>,
        history: Vec<MemoryEntry>,
    ) -> MemoryResult<MemoryEntry> {
        if let Some(last) = history.last()
            && turn_index <= last.turn_index
        {
            return Err(MemoryError::InvalidEntry(format!(
                "turn index {turn_index} does not extend conversation (last {})",
                last.turn_index
            )));
        }

        let mut entry = MemoryEntry::new(conversation_id, turn_index, speaker, text)?;
        entry.summary = MemoryEntry::summarize(text, self.config.topics.summary_max_chars);
        entry.embedding = self.embed_passage(text).await?;
        entry.emotion = self.emotion.analyze(text);
        entry.meta = meta;
        self.storage.upsert_entry(entry.clone()).await?;

        let mut window: Vec<MemoryEntry> = history
            .iter()
            .rev()
            .take(self.config.topics.window_turns.saturating_sub(1))
            .rev()
            .cloned()
            .collect();
        window.push(entry.clone());

        let all_topics = self.storage.list_topics().await?;
        let active: Vec<Topic> = all_topics.into_iter().filter(Topic::is_active).collect();
        let decision = self.assigner.assign(&window, &active).await;
        let topic_id = self.apply_decision(decision, &entry).await?;
        entry.link_topic(topic_id);

        if let Some(previous) = history.last() {
            entry.link_entry(previous.id);
        }
        self.storage.upsert_entry(entry.clone()).await?;
        if let Some(previous) = history.last() {
            self.storage.link_entries(previous.id, entry.id).await?;
        }

        info!("ingested turn {turn_index} of conversation {conversation_id}");
        Ok(entry)
    }

    /// Attach to the matched topic or create the new one.
    async fn apply_decision(
        &self,
        decision: TopicDecision,
        entry: &MemoryEntry,
    ) -> MemoryResult<TopicId> {
        match decision {
            TopicDecision::BestMatch { topic_id } => {
                match self.storage.get_topic(topic_id).await? {
                    Some(mut topic) => {
                        topic.attach(
                            entry,
                            self.config.topics.centroid_alpha,
                            self.config.topics.strength_alpha,
                        );
                        self.storage.update_topic(topic).await?;
                        Ok(topic_id)
                    }
                    None => {
                        warn!("matched topic {topic_id} vanished, creating a fresh one");
                        self.create_topic_for(entry).await
                    }
                }
            }
            TopicDecision::New { title, summary } => {
                let topic = Topic::seeded(
                    title,
                    summary,
                    entry,
                    self.config.topics.initial_strength,
                );
                let topic_id = topic.id;
                self.storage.upsert_topic(topic).await?;
                Ok(topic_id)
            }
        }
    }

    async fn create_topic_for(&self, entry: &MemoryEntry) -> MemoryResult<TopicId> {
        let title = MemoryEntry::summarize(&entry.text, self.config.topics.title_max_chars);
        let topic = Topic::seeded(
            title,
            entry.summary.clone(),
            entry,
            self.config.topics.initial_strength,
        );
        let topic_id = topic.id;
        self.storage.upsert_topic(topic).await?;
        Ok(topic_id)
    }

    /// Embed passage text, degrading to the hashing fallback when the
    /// configured provider fails mid-run.
    async fn embed_passage(&self, text: &str) -> MemoryResult<Vec<f32>> {
        match self.embedder.embed_passages(vec![text.to_string()]).await {
            Ok(mut vectors) if !vectors.is_empty() => Ok(vectors.remove(0)),
            Ok(_) => Err(MemoryError::ProviderUnavailable(
                "embedder returned no vectors".to_string(),
            )),
            Err(err) => {
                warn!("embedding provider failed, using hashing fallback: {err}");
                let mut vectors = self
                    .fallback_embedder
                    .embed_passages(vec![text.to_string()])
                    .await?;
                Ok(vectors.remove(0))
            }
        }
    }

    async fn load_topics(&self, topic_ids: &[TopicId]) -> MemoryResult<Vec<Topic>> {
        let mut topics = Vec::with_capacity(topic_ids.len());
        for topic_id in topic_ids {
            if let Some(topic) = self.storage.get_topic(*topic_id).await? {
                topics.push(topic);
            }
        }
        Ok(topics)
    }
}

/// Distinct linked topic ids in first-seen order.
fn unique_topic_ids<'a>(entries: impl Iterator<Item = &'a MemoryEntry>) -> Vec<TopicId> {
    let mut seen = Vec::new();
    for entry in entries {
        for topic_id in &entry.linked_topics {
            if !seen.contains(topic_id) {
                seen.push(*topic_id);
            }
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn core() -> MemoryCore {
        let config = MemoryConfig::default();
        MemoryCore::from_config(config).await.unwrap()
    }

    fn core_with_storage() -> (MemoryCore, Arc<EphemeralBackend>) {
        let config = MemoryConfig::default();
        let storage = Arc::new(EphemeralBackend::new());
        let backends = MemoryBackends {
            storage: storage.clone(),
            embedder: build_embedder(&config.embedding),
            oracle: None,
        };
        (MemoryCore::new(config, backends).unwrap(), storage)
    }

    async fn active_topics(core: &MemoryCore) -> Vec<Topic> {
        core.storage
            .list_topics()
            .await
            .unwrap()
            .into_iter()
            .filter(Topic::is_active)
            .collect()
    }

    #[tokio::test]
    async fn test_turn_indices_increase_with_adjacency() {
        let core = core().await;
        let conv = ConversationId::new();
        let texts = [
            "planning a trip to the alps",
            "what gear do I need",
            "renting boots is an option",
            "the cabin is booked",
        ];

        let mut ids = Vec::new();
        for (index, text) in texts.iter().enumerate() {
            let speaker = if index % 2 == 0 { "user" } else { "assistant" };
            let entry = core.remember(text, conv, speaker, HashMap::new()).await.unwrap();
            assert_eq!(entry.turn_index, index as u64);
            ids.push(entry.id);
        }

        let entries = core.storage.list_entries_by_conversation(conv).await.unwrap();
        assert_eq!(entries.len(), texts.len());
        for (index, entry) in entries.iter().enumerate() {
            assert_eq!(entry.turn_index, index as u64);
            if index > 0 {
                assert!(entry.linked_entries.contains(&ids[index - 1]));
            }
            if index + 1 < entries.len() {
                assert!(entry.linked_entries.contains(&ids[index + 1]));
            }
            assert!(!entry.embedding.is_empty());
        }
    }

    #[tokio::test]
    async fn test_ingest_rejects_non_increasing_index() {
        let core = core().await;
        let conv = ConversationId::new();
        core.ingest_turn(conv, 0, "user", "first turn", HashMap::new())
            .await
            .unwrap();
        let result = core
            .ingest_turn(conv, 0, "user", "conflicting turn", HashMap::new())
            .await;
        assert!(matches!(result, Err(MemoryError::InvalidEntry(_))));
    }

    #[tokio::test]
    async fn test_hiking_scenario_new_then_best_match() {
        let core = core().await;
        let conv = ConversationId::new();

        core.remember("I love hiking", conv, "user", HashMap::new())
            .await
            .unwrap();
        let topics = active_topics(&core).await;
        assert_eq!(topics.len(), 1);
        assert!((topics[0].strength - 0.1).abs() < 1e-6);

        core.remember("Hiking is great exercise", conv, "assistant", HashMap::new())
            .await
            .unwrap();
        let topics = active_topics(&core).await;
        assert_eq!(topics.len(), 1, "similar turn should not spawn a topic");

        let before = topics[0].strength;
        let third = core
            .remember("I love hiking on mountain trails", conv, "user", HashMap::new())
            .await
            .unwrap();
        let topics = active_topics(&core).await;
        assert_eq!(topics.len(), 1);
        assert!(topics[0].strength > before);
        assert!(topics[0].strength <= 1.0);
        assert!(topics[0].entry_ids.contains(&third.id));
        assert_eq!(third.linked_topics, vec![topics[0].id]);
    }

    #[tokio::test]
    async fn test_unrelated_turn_starts_second_topic() {
        let core = core().await;
        let conv_a = ConversationId::new();
        let conv_b = ConversationId::new();

        core.remember("I love hiking on mountain trails", conv_a, "user", HashMap::new())
            .await
            .unwrap();
        core.remember(
            "the quarterly budget spreadsheet needs fixing",
            conv_b,
            "user",
            HashMap::new(),
        )
        .await
        .unwrap();

        assert_eq!(active_topics(&core).await.len(), 2);
    }

    #[tokio::test]
    async fn test_recall_returns_texts_topics_entries() {
        let core = core().await;
        let conv = ConversationId::new();
        core.remember("I love hiking on mountain trails", conv, "user", HashMap::new())
            .await
            .unwrap();
        core.remember("the sourdough starter doubled overnight", conv, "user", HashMap::new())
            .await
            .unwrap();

        let response = core.recall("hiking mountain trails", 2).await.unwrap();
        assert!(!response.entries.is_empty());
        assert_eq!(response.texts.len(), response.entries.len());
        assert!(!response.topics.is_empty());
        assert!(response.texts[0].contains("hiking"));
    }

    #[tokio::test]
    async fn test_recall_on_empty_store_is_empty() {
        let core = core().await;
        let response = core.recall("anything at all", 5).await.unwrap();
        assert!(response.texts.is_empty());
        assert!(response.topics.is_empty());
        assert!(response.entries.is_empty());
    }

    #[tokio::test]
    async fn test_explore_by_topic_and_time() {
        let core = core().await;
        let conv = ConversationId::new();
        let entry = core
            .remember("I love hiking on mountain trails", conv, "user", HashMap::new())
            .await
            .unwrap();
        let topic_id = entry.linked_topics[0];

        let query = ExploreQuery {
            keywords: Some("hiking".to_string()),
            topic_id: Some(topic_id),
            time_range: None,
        };
        let response = core.explore(&query, 5).await.unwrap();
        assert_eq!(response.results.len(), 1);
        assert_eq!(response.topics[0].id, topic_id);

        let past = ExploreQuery {
            keywords: Some("hiking".to_string()),
            topic_id: None,
            time_range: Some((
                chrono::Utc::now() - chrono::Duration::days(2),
                chrono::Utc::now() - chrono::Duration::days(1),
            )),
        };
        let response = core.explore(&past, 5).await.unwrap();
        assert!(response.results.is_empty());
    }

    #[tokio::test]
    async fn test_merge_and_rollback_through_core() {
        let (core, storage) = core_with_storage();

        // Two small same-theme topics seeded directly in storage.
        for suffix in ["trails", "gear"] {
            let conv = ConversationId::new();
            let mut topic: Option<Topic> = None;
            for index in 0..2u64 {
                let mut entry = MemoryEntry::new(
                    conv,
                    index,
                    "user",
                    format!("hiking {suffix} note {index}"),
                )
                .unwrap();
                entry.embedding = vec![1.0, 0.0];
                match &mut topic {
                    None => {
                        topic = Some(Topic::seeded(
                            format!("hiking {suffix}"),
                            "outdoor thread",
                            &entry,
                            0.1,
                        ));
                    }
                    Some(topic) => topic.attach(&entry, 0.3, 0.2),
                }
                entry.link_topic(topic.as_ref().unwrap().id);
                storage.upsert_entry(entry).await.unwrap();
            }
            storage.upsert_topic(topic.unwrap()).await.unwrap();
        }

        let outcome = core.run_topic_merge(0, 4, true).await.unwrap();
        let MergeOutcome::Merged { topic_id, source_ids, moved_entries } = outcome else {
            panic!("expected a merge");
        };
        assert_eq!(source_ids.len(), 2);
        assert_eq!(moved_entries, 4);

        let rollback = core.rollback(topic_id).await.unwrap();
        assert!(matches!(rollback, RollbackOutcome::RolledBack { .. }));
        let merged = storage.get_topic(topic_id).await.unwrap().unwrap();
        assert!(merged.disabled);
        assert!(merged.entry_ids.is_empty());
    }

    #[tokio::test]
    async fn test_consolidate_if_needed_waits_for_trigger() {
        use crate::topics::organizer::MergeSkip;

        let mut config = MemoryConfig::default();
        config.organizer.trigger_topic_count = 1;
        let storage = Arc::new(EphemeralBackend::new());
        let backends = MemoryBackends {
            storage: storage.clone(),
            embedder: build_embedder(&config.embedding),
            oracle: None,
        };
        let core = MemoryCore::new(config, backends).unwrap();

        // A single active topic sits at the trigger, not above it.
        let conv = ConversationId::new();
        core.remember("I love hiking on mountain trails", conv, "user", HashMap::new())
            .await
            .unwrap();
        let outcome = core.consolidate_if_needed().await.unwrap();
        assert!(matches!(
            outcome,
            MergeOutcome::Skipped {
                reason: MergeSkip::BelowTopicCount
            }
        ));
    }

    #[tokio::test]
    async fn test_concurrent_ingestion_across_conversations() {
        let core = Arc::new(core().await);
        let conv_a = ConversationId::new();
        let conv_b = ConversationId::new();

        let mut handles = Vec::new();
        for index in 0..4u64 {
            let core = core.clone();
            handles.push(tokio::spawn(async move {
                core.remember(
                    &format!("alpine climbing note {index}"),
                    conv_a,
                    "user",
                    HashMap::new(),
                )
                .await
            }));
            let core = core.clone();
            handles.push(tokio::spawn(async move {
                core.remember(
                    &format!("sourdough baking note {index}"),
                    conv_b,
                    "user",
                    HashMap::new(),
                )
                .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        for conv in [conv_a, conv_b] {
            let entries = core.storage.list_entries_by_conversation(conv).await.unwrap();
            let indices: Vec<u64> = entries.iter().map(|entry| entry.turn_index).collect();
            assert_eq!(indices, vec![0, 1, 2, 3]);
        }
    }
}
