//! Lexicon-based affect inference.
//!
//! Pure heuristics over marker word lists: no model calls, deterministic,
//! sub-millisecond. The output is a sparse [`EmotionVector`] whose named
//! dimensions carry values in `[-1, 1]` plus a confidence scalar derived
//! from match density.

pub mod lexicon;

use std::collections::HashSet;

use crate::core::affect::EmotionVector;

/// Named affect dimensions with their marker lists and sign.
///
/// Negative-valence dimensions contribute negatively to `valence`.
const DIMENSIONS: &[(&str, &[&str], f32)] = &[
    ("joy", lexicon::JOY_MARKERS, 1.0),
    ("sadness", lexicon::SADNESS_MARKERS, -1.0),
    ("anger", lexicon::ANGER_MARKERS, -1.0),
    ("fear", lexicon::FEAR_MARKERS, -1.0),
    ("surprise", lexicon::SURPRISE_MARKERS, 0.0),
];

/// Per-hit increment when scoring a dimension.
const HIT_WEIGHT: f32 = 0.4;
/// Number of hits at which confidence saturates.
const CONFIDENCE_SATURATION: f32 = 3.0;

/// Lexicon-based affect analyzer.
#[derive(Clone, Debug, Default)]
pub struct EmotionAnalyzer;

impl EmotionAnalyzer {
    /// Create a new analyzer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Extract a sparse affect vector from text.
    ///
    /// Text with no markers yields an empty vector with zero confidence,
    /// which downstream scoring treats as a zero term.
    #[must_use]
    pub fn analyze(&self, text: &str) -> EmotionVector {
        let tokens: HashSet<String> = text
            .split(|ch: char| !ch.is_alphanumeric())
            .filter(|token| !token.is_empty())
            .map(str::to_lowercase)
            .collect();

        let mut out = EmotionVector::new();
        if tokens.is_empty() {
            return out;
        }

        let mut total_hits = 0u32;
        let mut valence = 0.0f32;
        for (name, markers, sign) in DIMENSIONS {
            let hits = markers
                .iter()
                .filter(|marker| tokens.contains(**marker))
                .count() as u32;
            if hits == 0 {
                continue;
            }

            total_hits += hits;
            #[allow(clippy::cast_precision_loss)]
            let value = (hits as f32 * HIT_WEIGHT).min(1.0);
            out.set(*name, value);
            valence += sign * value;
        }

        if total_hits == 0 {
            return out;
        }

        out.set("valence", valence);
        #[allow(clippy::cast_precision_loss)]
        let confidence = (total_hits as f32 / CONFIDENCE_SATURATION).min(1.0);
        out.confidence = confidence;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neutral_text_is_empty() {
        let analyzer = EmotionAnalyzer::new();
        let affect = analyzer.analyze("the meeting is at three on tuesday");
        assert!(affect.is_empty());
        assert!(affect.confidence.abs() < f32::EPSILON);
    }

    #[test]
    fn test_positive_text_scores_joy() {
        let analyzer = EmotionAnalyzer::new();
        let affect = analyzer.analyze("Thanks, this is amazing. I love it!");
        assert!(affect.values["joy"] > 0.0);
        assert!(affect.values["valence"] > 0.0);
        assert!(affect.confidence > 0.0);
    }

    #[test]
    fn test_negative_text_scores_negative_valence() {
        let analyzer = EmotionAnalyzer::new();
        let affect = analyzer.analyze("This is terrible and I am furious about the awful result");
        assert!(affect.values["anger"] > 0.0);
        assert!(affect.values["valence"] < 0.0);
    }

    #[test]
    fn test_values_stay_in_range() {
        let analyzer = EmotionAnalyzer::new();
        let text = lexicon::JOY_MARKERS.join(" ");
        let affect = analyzer.analyze(&text);
        for value in affect.values.values() {
            assert!((-1.0..=1.0).contains(value));
        }
        assert!((0.0..=1.0).contains(&affect.confidence));
    }
}
