//! Deterministic feature-hashing embedder.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::core::errors::MemoryResult;
use crate::core::vector;
use crate::embedding::embedder::{EmbedFuture, Embedder};

/// Dependency-free fallback embedder.
///
/// Lowercased alphanumeric tokens are hashed into a fixed number of signed
/// buckets (classic feature hashing). Deterministic, so tests and offline
/// deployments get stable vectors without a model server.
#[derive(Clone, Debug)]
pub struct HashEmbedder {
    ndims: usize,
    normalize: bool,
}

impl HashEmbedder {
    /// Create a hashing embedder with the given dimensionality.
    #[must_use]
    pub const fn new(ndims: usize, normalize: bool) -> Self {
        Self { ndims, normalize }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut out = vec![0.0f32; self.ndims];
        for token in text
            .split(|ch: char| !ch.is_alphanumeric())
            .filter(|token| !token.is_empty())
        {
            let token = token.to_lowercase();
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let value = hasher.finish();

            #[allow(clippy::cast_possible_truncation)]
            let bucket = (value % self.ndims as u64) as usize;
            let sign = if (value >> 32) & 1 == 0 { 1.0 } else { -1.0 };
            out[bucket] += sign;
        }

        if self.normalize {
            vector::l2_normalize(&mut out);
        }
        out
    }
}

impl Embedder for HashEmbedder {
    fn embed_passages(&self, texts: Vec<String>) -> EmbedFuture<'_, MemoryResult<Vec<Vec<f32>>>> {
        Box::pin(async move { Ok(texts.iter().map(|text| self.embed_one(text)).collect()) })
    }

    fn embed_query(&self, text: &str) -> EmbedFuture<'_, MemoryResult<Vec<f32>>> {
        let text = text.to_string();
        Box::pin(async move { Ok(self.embed_one(&text)) })
    }

    fn ndims(&self) -> usize {
        self.ndims
    }
}
