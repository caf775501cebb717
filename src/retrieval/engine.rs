//! Recall and explore queries over the storage backend.

use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use lru::LruCache;
use tokio::sync::Mutex;
use tracing::debug;

use crate::core::config::{RetrievalConfig, ScoringConfig};
use crate::core::errors::{MemoryError, MemoryResult};
use crate::core::ids::TopicId;
use crate::emotion::EmotionAnalyzer;
use crate::embedding::Embedder;
use crate::retrieval::ranking::{RecalledEntry, rank_candidates};
use crate::storage::backend::{ScoredEntry, SearchFilters, StorageBackend};

/// Directed browsing query for [`RetrievalEngine::explore`].
#[derive(Clone, Debug, Default)]
pub struct ExploreQuery {
    /// Keyword text embedded into the query vector.
    pub keywords: Option<String>,
    /// Restrict to members of this topic.
    pub topic_id: Option<TopicId>,
    /// Inclusive timestamp range.
    pub time_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

/// Executes recall/explore queries and re-ranks with the composite score.
pub struct RetrievalEngine {
    storage: Arc<dyn StorageBackend>,
    embedder: Arc<dyn Embedder>,
    emotion: EmotionAnalyzer,
    scoring: ScoringConfig,
    retrieval: RetrievalConfig,
    query_cache: Mutex<LruCache<String, Vec<f32>>>,
}

impl RetrievalEngine {
    /// Create a new retrieval engine.
    ///
    /// # Errors
    /// Returns an error if the query cache capacity is zero.
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        embedder: Arc<dyn Embedder>,
        scoring: ScoringConfig,
        retrieval: RetrievalConfig,
    ) -> MemoryResult<Self> {
        let capacity = NonZeroUsize::new(retrieval.query_cache_capacity).ok_or_else(|| {
            MemoryError::InvalidConfig("retrieval.query_cache_capacity must be > 0".to_string())
        })?;

        Ok(Self {
            storage,
            embedder,
            emotion: EmotionAnalyzer::new(),
            scoring,
            retrieval,
            query_cache: Mutex::new(LruCache::new(capacity)),
        })
    }

    /// Conversational recall: fetch a raw-similarity candidate superset,
    /// re-rank it with the composite score, return the top `k`.
    ///
    /// The result is always a subset of the candidate set; re-ranking never
    /// introduces entries outside it.
    ///
    /// # Errors
    /// Returns an error if embedding or storage access fails.
    pub async fn auto_recall(&self, query: &str, k: usize) -> MemoryResult<Vec<RecalledEntry>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let query_vector = self.query_embedding(query).await?;
        let candidate_k = self.candidate_count(k);
        let candidates = self
            .storage
            .search_entries(query_vector, candidate_k, None)
            .await?;
        debug!("auto_recall: {} candidates for k={k}", candidates.len());

        let strengths = self.topic_strengths(&candidates).await?;
        let query_emotion = self.emotion.analyze(query);
        let mut ranked = rank_candidates(
            candidates,
            &strengths,
            &query_emotion,
            &self.scoring,
            Utc::now(),
        );
        ranked.truncate(k);
        Ok(ranked)
    }

    /// Directed browsing: storage-level filtered vector search only, no
    /// composite re-ranking.
    ///
    /// # Errors
    /// Returns an error if embedding or storage access fails.
    pub async fn explore(&self, query: &ExploreQuery, k: usize) -> MemoryResult<Vec<ScoredEntry>> {
        let query_vector = match &query.keywords {
            Some(keywords) => self.query_embedding(keywords).await?,
            None => vec![0.0; self.embedder.ndims()],
        };

        let filters = SearchFilters {
            speaker: None,
            topics_any: query.topic_id.map(|id| vec![id]),
            time_range: query.time_range,
        };
        self.storage
            .search_entries(query_vector, k, Some(filters))
            .await
    }

    /// Candidate superset size for `k` requested results.
    #[must_use]
    pub fn candidate_count(&self, k: usize) -> usize {
        (k.saturating_mul(self.retrieval.candidate_multiplier))
            .max(self.retrieval.candidate_floor)
    }

    /// Embed a query through the LRU cache.
    async fn query_embedding(&self, query: &str) -> MemoryResult<Vec<f32>> {
        {
            let mut cache = self.query_cache.lock().await;
            if let Some(vector) = cache.get(query) {
                return Ok(vector.clone());
            }
        }

        let vector = self.embedder.embed_query(query).await?;
        let mut cache = self.query_cache.lock().await;
        cache.put(query.to_string(), vector.clone());
        Ok(vector)
    }

    /// Strengths of every topic linked from the candidate set.
    async fn topic_strengths(
        &self,
        candidates: &[ScoredEntry],
    ) -> MemoryResult<HashMap<TopicId, f32>> {
        let topic_ids: HashSet<TopicId> = candidates
            .iter()
            .flat_map(|candidate| candidate.entry.linked_topics.iter().copied())
            .collect();

        let mut strengths = HashMap::with_capacity(topic_ids.len());
        for topic_id in topic_ids {
            if let Some(topic) = self.storage.get_topic(topic_id).await? {
                strengths.insert(topic_id, topic.strength);
            }
        }
        Ok(strengths)
    }
}
