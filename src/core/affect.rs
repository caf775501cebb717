//! Sparse affect vectors attached to entries and topics.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Sparse named-dimension affect vector with a confidence scalar.
///
/// Dimension values are clamped to `[-1, 1]`. An empty vector means no
/// affective signal was detected; scoring terms treat it as zero.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EmotionVector {
    /// Dimension name to value in `[-1, 1]`.
    pub values: BTreeMap<String, f32>,
    /// Confidence in the extraction, in `[0, 1]`.
    pub confidence: f32,
}

impl EmotionVector {
    /// Create an empty affect vector with zero confidence.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a dimension, clamping the value into `[-1, 1]`.
    pub fn set(&mut self, dimension: impl Into<String>, value: f32) {
        self.values.insert(dimension.into(), value.clamp(-1.0, 1.0));
    }

    /// Whether any dimension carries signal.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Cosine similarity over the union of named dimensions.
    ///
    /// Zero-safe: returns 0.0 when either side is empty or has zero norm.
    #[must_use]
    pub fn cosine(&self, other: &Self) -> f32 {
        if self.is_empty() || other.is_empty() {
            return 0.0;
        }

        let mut dot = 0.0f32;
        for (name, value) in &self.values {
            if let Some(other_value) = other.values.get(name) {
                dot += value * other_value;
            }
        }

        let norm_a: f32 = self.values.values().map(|v| v * v).sum::<f32>().sqrt();
        let norm_b: f32 = other.values.values().map(|v| v * v).sum::<f32>().sqrt();
        if norm_a <= 0.0 || norm_b <= 0.0 {
            return 0.0;
        }

        dot / (norm_a * norm_b)
    }

    /// EMA blend toward a sample over the union of dimensions.
    ///
    /// Dimensions absent on one side are treated as zero, so signal decays
    /// when the sample no longer carries it.
    #[must_use]
    pub fn ema_blend(&self, sample: &Self, alpha: f32) -> Self {
        if self.is_empty() {
            return sample.clone();
        }

        let mut out = BTreeMap::new();
        for name in self.values.keys().chain(sample.values.keys()) {
            if out.contains_key(name) {
                continue;
            }
            let old = self.values.get(name).copied().unwrap_or(0.0);
            let new = sample.values.get(name).copied().unwrap_or(0.0);
            out.insert(name.clone(), (alpha * new + (1.0 - alpha) * old).clamp(-1.0, 1.0));
        }

        Self {
            values: out,
            confidence: (alpha * sample.confidence + (1.0 - alpha) * self.confidence)
                .clamp(0.0, 1.0),
        }
    }

    /// Element-wise mean of several affect vectors.
    #[must_use]
    pub fn mean(vectors: &[Self]) -> Self {
        if vectors.is_empty() {
            return Self::new();
        }

        let mut sums: BTreeMap<String, f32> = BTreeMap::new();
        let mut confidence = 0.0f32;
        for vector in vectors {
            confidence += vector.confidence;
            for (name, value) in &vector.values {
                *sums.entry(name.clone()).or_insert(0.0) += value;
            }
        }

        #[allow(clippy::cast_precision_loss)]
        let count = vectors.len() as f32;
        let values = sums
            .into_iter()
            .map(|(name, sum)| (name, (sum / count).clamp(-1.0, 1.0)))
            .collect();

        Self {
            values,
            confidence: (confidence / count).clamp(0.0, 1.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn affect(pairs: &[(&str, f32)]) -> EmotionVector {
        let mut v = EmotionVector::new();
        for (name, value) in pairs {
            v.set(*name, *value);
        }
        v.confidence = 1.0;
        v
    }

    #[test]
    fn test_set_clamps_values() {
        let mut v = EmotionVector::new();
        v.set("joy", 2.0);
        v.set("sadness", -3.0);
        assert!((v.values["joy"] - 1.0).abs() < f32::EPSILON);
        assert!((v.values["sadness"] + 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_cosine_empty_is_zero() {
        let empty = EmotionVector::new();
        let full = affect(&[("joy", 0.8)]);
        assert!(empty.cosine(&full).abs() < f32::EPSILON);
        assert!(full.cosine(&empty).abs() < f32::EPSILON);
    }

    #[test]
    fn test_cosine_matching_dimensions() {
        let a = affect(&[("joy", 0.5), ("fear", 0.2)]);
        let b = affect(&[("joy", 0.9)]);
        assert!(a.cosine(&b) > 0.0);
        assert!((a.cosine(&b) - b.cosine(&a)).abs() < 1e-6);
    }

    #[test]
    fn test_mean_averages_dimensions() {
        let m = EmotionVector::mean(&[affect(&[("joy", 1.0)]), affect(&[("joy", 0.0)])]);
        assert!((m.values["joy"] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_ema_blend_decays_absent_dimensions() {
        let old = affect(&[("anger", 1.0)]);
        let blended = old.ema_blend(&EmotionVector::new(), 0.5);
        assert!(blended.values["anger"] < 1.0);
    }
}
