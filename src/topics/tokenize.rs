//! Keyword extraction for the heuristic consolidation path.

use std::collections::{HashMap, HashSet};

use regex::Regex;

use crate::core::errors::{MemoryError, MemoryResult};
use crate::core::ids::TopicId;

/// Common function words excluded from keyword candidates.
const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "this", "that", "from", "your", "you", "are", "was", "were",
    "have", "has", "not", "but", "about", "into", "over", "just", "like", "what", "when", "they",
    "them", "their", "there", "here", "will", "would", "could", "should", "talk", "talked",
];

/// Token rules for mixed-script topic text.
///
/// Ideographic runs of length >= 2, kana runs of length >= 3, and ASCII word
/// runs of length >= 3. Any tokenizer preserving the
/// frequency-times-clipped-length ranking with a minimum occurrence count of
/// two is an acceptable substitute.
const TOKEN_PATTERN: &str = r"\p{Han}{2,}|[\p{Hiragana}\p{Katakana}ー]{3,}|[A-Za-z0-9]{3,}";

/// Tokenizer shared across consolidation passes.
#[derive(Clone, Debug)]
pub struct MergeTokenizer {
    pattern: Regex,
}

impl MergeTokenizer {
    /// Compile the token pattern.
    ///
    /// # Errors
    /// Returns an error if the pattern fails to compile.
    pub fn new() -> MemoryResult<Self> {
        let pattern = Regex::new(TOKEN_PATTERN)
            .map_err(|err| MemoryError::InvalidConfig(format!("invalid token pattern: {err}")))?;
        Ok(Self { pattern })
    }

    /// Lowercased tokens of a topic's title + summary, minus stopwords.
    #[must_use]
    pub fn tokens(&self, text: &str) -> Vec<String> {
        self.pattern
            .find_iter(text)
            .map(|token| token.as_str().to_lowercase())
            .filter(|token| !STOPWORDS.contains(&token.as_str()))
            .collect()
    }

    /// Pick the best shared keyword across topic texts.
    ///
    /// Tokens are scored as `frequency * min(length, length_cap)` and must
    /// occur in at least two distinct topics. Returns the winning token and
    /// the topics containing it; ties break lexicographically so the result
    /// is deterministic.
    #[must_use]
    pub fn shared_keyword(
        &self,
        topic_texts: &[(TopicId, String)],
        length_cap: usize,
    ) -> Option<(String, Vec<TopicId>)> {
        let mut frequency: HashMap<String, usize> = HashMap::new();
        let mut owners: HashMap<String, HashSet<TopicId>> = HashMap::new();

        for (topic_id, text) in topic_texts {
            for token in self.tokens(text) {
                *frequency.entry(token.clone()).or_insert(0) += 1;
                owners.entry(token).or_default().insert(*topic_id);
            }
        }

        let mut best: Option<(usize, String)> = None;
        for (token, count) in &frequency {
            if owners[token].len() < 2 {
                continue;
            }
            let score = count * token.chars().count().min(length_cap);
            let better = match &best {
                None => true,
                Some((best_score, best_token)) => {
                    score > *best_score || (score == *best_score && token < best_token)
                }
            };
            if better {
                best = Some((score, token.clone()));
            }
        }

        let (_, token) = best?;
        let mut topic_ids: Vec<TopicId> = topic_texts
            .iter()
            .filter(|(id, _)| owners[&token].contains(id))
            .map(|(id, _)| *id)
            .collect();
        topic_ids.dedup();
        Some((token, topic_ids))
    }
}
