//! Embedding providers.

pub mod embedder;
pub mod hash;
pub mod ollama;

pub use embedder::{EmbedFuture, Embedder, build_embedder};
pub use hash::HashEmbedder;
pub use ollama::OllamaEmbedder;
