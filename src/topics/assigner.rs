//! Per-turn topic assignment.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::core::config::TopicConfig;
use crate::core::entry::{MemoryEntry, truncate_with_ellipsis};
use crate::core::errors::{MemoryError, MemoryResult};
use crate::core::ids::TopicId;
use crate::core::topic::Topic;
use crate::core::vector::cosine_similarity;
use crate::embedding::Embedder;
use crate::oracle::{Oracle, extract_json_object};

/// Titles too generic to name a topic.
const TITLE_DENYLIST: &[&str] = &[
    "new topic",
    "untitled",
    "general",
    "misc",
    "miscellaneous",
    "topic",
    "conversation",
    "chat",
    "other",
];

const ASSIGN_SYSTEM: &str = "You assign conversation turns to memory topics. Reply with exactly \
one JSON object of the shape {\"decision\": \"BEST_MATCH\"|\"NEW\", \"topic_id\": string|null, \
\"new_topic\": {\"title\": string, \"summary\": string|null}|null, \"reason\": string}. \
Use BEST_MATCH with the id of an existing topic when one fits; otherwise use NEW with a \
specific, non-generic title.";

/// Outcome of the per-turn assignment decision.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TopicDecision {
    /// Attach the turn to an existing topic.
    BestMatch {
        /// The matched topic.
        topic_id: TopicId,
    },
    /// Start a new topic for the turn.
    New {
        /// Title for the new topic.
        title: String,
        /// Summary for the new topic.
        summary: String,
    },
}

/// Decides, per ingested turn, whether to attach to an existing topic.
pub struct TopicAssigner {
    embedder: Arc<dyn Embedder>,
    oracle: Option<Arc<dyn Oracle>>,
    config: TopicConfig,
}

impl TopicAssigner {
    /// Create a new assigner.
    #[must_use]
    pub fn new(
        embedder: Arc<dyn Embedder>,
        oracle: Option<Arc<dyn Oracle>>,
        config: TopicConfig,
    ) -> Self {
        Self {
            embedder,
            oracle,
            config,
        }
    }

    /// Decide where the current window of dialogue belongs.
    ///
    /// Never fails: oracle and embedding problems degrade to the
    /// deterministic heuristic so ingestion always gets a decision.
    pub async fn assign(&self, window: &[MemoryEntry], active_topics: &[Topic]) -> TopicDecision {
        if let Some(oracle) = &self.oracle {
            match self.oracle_assign(oracle.as_ref(), window, active_topics).await {
                Ok(decision) => return decision,
                Err(err) => {
                    warn!("oracle assignment failed, using heuristic: {err}");
                }
            }
        }

        self.heuristic_assign(window, active_topics).await
    }

    /// Heuristic path: embed the window, compare against every centroid.
    async fn heuristic_assign(
        &self,
        window: &[MemoryEntry],
        active_topics: &[Topic],
    ) -> TopicDecision {
        if active_topics.is_empty() {
            return self.derive_new_topic(window);
        }

        let text = window_text(window);
        let embedding = match self.embedder.embed_query(&text).await {
            Ok(embedding) => embedding,
            Err(err) => {
                warn!("window embedding failed, starting a new topic: {err}");
                return self.derive_new_topic(window);
            }
        };

        let mut best: Option<(f32, TopicId)> = None;
        for topic in active_topics {
            let similarity = cosine_similarity(&embedding, &topic.centroid_embedding);
            if best.is_none_or(|(score, _)| similarity > score) {
                best = Some((similarity, topic.id));
            }
        }

        match best {
            Some((similarity, topic_id)) if similarity >= self.config.match_threshold => {
                debug!("window matched topic {topic_id} at {similarity:.3}");
                TopicDecision::BestMatch { topic_id }
            }
            _ => self.derive_new_topic(window),
        }
    }

    /// Deterministic NEW decision: title from the most recent human-authored
    /// utterance, summary from the window, both capped.
    fn derive_new_topic(&self, window: &[MemoryEntry]) -> TopicDecision {
        let source = window
            .iter()
            .rev()
            .find(|entry| entry.speaker != "assistant" && entry.speaker != "system")
            .or_else(|| window.last());

        let title = source.map_or_else(
            || "…".to_string(),
            |entry| truncate_with_ellipsis(&entry.text, self.config.title_max_chars),
        );
        let summary = truncate_with_ellipsis(&window_text(window), self.config.summary_max_chars);
        TopicDecision::New { title, summary }
    }

    /// Oracle path with one stricter retry on an invalid reply.
    async fn oracle_assign(
        &self,
        oracle: &dyn Oracle,
        window: &[MemoryEntry],
        active_topics: &[Topic],
    ) -> MemoryResult<TopicDecision> {
        let user = assignment_prompt(window, active_topics);
        let reply = oracle.complete(ASSIGN_SYSTEM, &user).await?;
        match self.parse_assignment(&reply, active_topics) {
            Ok(decision) => Ok(decision),
            Err(err) => {
                debug!("oracle reply invalid, retrying once: {err}");
                let strict = format!(
                    "{user}\n\nYour previous reply was invalid ({err}). Reply with ONLY the \
                     JSON object and nothing else. A NEW decision must carry a specific, \
                     non-generic title."
                );
                let reply = oracle.complete(ASSIGN_SYSTEM, &strict).await?;
                self.parse_assignment(&reply, active_topics)
            }
        }
    }

    /// Parse and validate an oracle reply against the assignment contract.
    fn parse_assignment(
        &self,
        reply: &str,
        active_topics: &[Topic],
    ) -> MemoryResult<TopicDecision> {
        let json = extract_json_object(reply).ok_or_else(|| {
            MemoryError::MalformedOracleResponse("no JSON object in reply".to_string())
        })?;
        let raw: RawAssignment = serde_json::from_str(json)
            .map_err(|err| MemoryError::MalformedOracleResponse(err.to_string()))?;

        match raw.decision.trim().to_ascii_uppercase().as_str() {
            "BEST_MATCH" => {
                let id = raw.topic_id.as_deref().unwrap_or_default();
                let topic_id: TopicId = id.parse().map_err(|_| {
                    MemoryError::MalformedOracleResponse(format!(
                        "BEST_MATCH without a usable topic_id: {id:?}"
                    ))
                })?;
                if !active_topics.iter().any(|topic| topic.id == topic_id) {
                    return Err(MemoryError::MalformedOracleResponse(format!(
                        "BEST_MATCH references unknown topic {topic_id}"
                    )));
                }
                Ok(TopicDecision::BestMatch { topic_id })
            }
            "NEW" => {
                let (title, summary) = normalize_new_topic(raw.new_topic)?;
                if title_is_generic(&title) {
                    return Err(MemoryError::MalformedOracleResponse(format!(
                        "generic title {title:?}"
                    )));
                }
                Ok(TopicDecision::New {
                    title: truncate_with_ellipsis(&title, self.config.title_max_chars),
                    summary: truncate_with_ellipsis(
                        &summary.unwrap_or_default(),
                        self.config.summary_max_chars,
                    ),
                })
            }
            other => Err(MemoryError::MalformedOracleResponse(format!(
                "unknown decision {other:?}"
            ))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawAssignment {
    decision: String,
    #[serde(default)]
    topic_id: Option<String>,
    #[serde(default)]
    new_topic: Option<serde_json::Value>,
    #[serde(default)]
    #[allow(dead_code)]
    reason: Option<String>,
}

/// Coerce the `new_topic` field into `(title, summary)`.
///
/// A bare string is accepted as a title; an object must carry a `title`.
fn normalize_new_topic(
    value: Option<serde_json::Value>,
) -> MemoryResult<(String, Option<String>)> {
    match value {
        Some(serde_json::Value::String(title)) => Ok((title, None)),
        Some(serde_json::Value::Object(map)) => {
            let title = map
                .get("title")
                .and_then(serde_json::Value::as_str)
                .ok_or_else(|| {
                    MemoryError::MalformedOracleResponse("new_topic without title".to_string())
                })?
                .to_string();
            let summary = map
                .get("summary")
                .and_then(serde_json::Value::as_str)
                .map(ToString::to_string);
            Ok((title, summary))
        }
        _ => Err(MemoryError::MalformedOracleResponse(
            "NEW without new_topic".to_string(),
        )),
    }
}

fn title_is_generic(title: &str) -> bool {
    let normalized = title.trim().to_lowercase();
    normalized.is_empty() || TITLE_DENYLIST.contains(&normalized.as_str())
}

/// Concatenate the window as `speaker: text` lines.
fn window_text(window: &[MemoryEntry]) -> String {
    let mut out = String::new();
    for entry in window {
        out.push_str(&entry.speaker);
        out.push_str(": ");
        out.push_str(&entry.text);
        out.push('\n');
    }
    out
}

/// Build the oracle prompt: active topics plus the recent window.
fn assignment_prompt(window: &[MemoryEntry], active_topics: &[Topic]) -> String {
    let mut out = String::from("Existing topics:\n");
    if active_topics.is_empty() {
        out.push_str("(none)\n");
    }
    for topic in active_topics {
        out.push_str(&format!("- {}: {}\n", topic.id, topic.title));
    }
    out.push_str("\nRecent dialogue:\n");
    out.push_str(&window_text(window));
    out
}
