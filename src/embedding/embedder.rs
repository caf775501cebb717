//! Embedding provider abstraction and construction-time selection.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::warn;

use crate::core::config::{EmbeddingConfig, EmbeddingProviderKind};
use crate::core::errors::MemoryResult;
use crate::embedding::hash::HashEmbedder;
use crate::embedding::ollama::OllamaEmbedder;

/// Boxed future type for embedder operations.
pub type EmbedFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Trait abstraction over embedding providers.
///
/// Passage-side and query-side text may receive different prefixes inside a
/// provider (asymmetric encoders); callers only choose the side, never the
/// prefix.
pub trait Embedder: Send + Sync {
    /// Embed stored-content texts.
    ///
    /// # Errors
    /// Returns an error if the embedding request fails.
    fn embed_passages(&self, texts: Vec<String>) -> EmbedFuture<'_, MemoryResult<Vec<Vec<f32>>>>;
    /// Embed a retrieval query.
    ///
    /// # Errors
    /// Returns an error if the embedding request fails.
    fn embed_query(&self, text: &str) -> EmbedFuture<'_, MemoryResult<Vec<f32>>>;
    /// Return embedding dimensionality.
    fn ndims(&self) -> usize;
}

/// Build the configured embedder.
///
/// The choice is made once here (strategy injection); call sites never
/// inspect the concrete type. If the model-backed provider cannot be
/// constructed the deterministic hash fallback is used instead of failing,
/// with a warning.
#[must_use]
pub fn build_embedder(config: &EmbeddingConfig) -> Arc<dyn Embedder> {
    match config.provider {
        EmbeddingProviderKind::Hash => Arc::new(HashEmbedder::new(config.ndims, config.normalize)),
        EmbeddingProviderKind::Ollama => match OllamaEmbedder::new(config) {
            Ok(embedder) => Arc::new(embedder),
            Err(err) => {
                warn!("ollama embedder unavailable, falling back to hashing: {err}");
                Arc::new(HashEmbedder::new(config.ndims, config.normalize))
            }
        },
    }
}
