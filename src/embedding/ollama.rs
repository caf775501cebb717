//! Model-backed embedder using Rig's Ollama provider.

use reqwest::Client as ReqwestClient;
use rig::client::{EmbeddingsClient, Nothing};
use rig::embeddings::EmbeddingModel;
use rig::providers::ollama;

use crate::core::config::EmbeddingConfig;
use crate::core::errors::MemoryError;
use crate::core::errors::MemoryResult;
use crate::core::vector;
use crate::embedding::embedder::{EmbedFuture, Embedder};

type OllamaEmbeddingModel = ollama::EmbeddingModel<ReqwestClient>;

/// Instruction prefixes for asymmetric encoders, keyed by model name.
///
/// Returns `(passage_prefix, query_prefix)`. Symmetric models get none.
fn prefixes_for(model: &str) -> Option<(&'static str, &'static str)> {
    let model = model.to_ascii_lowercase();
    if model.contains("nomic-embed") {
        Some(("search_document: ", "search_query: "))
    } else if model.contains("e5") {
        Some(("passage: ", "query: "))
    } else {
        None
    }
}

/// Ollama embedder with provider-side prefix handling.
#[derive(Clone)]
pub struct OllamaEmbedder {
    model: OllamaEmbeddingModel,
    ndims: usize,
    normalize: bool,
    prefixes: Option<(&'static str, &'static str)>,
}

impl OllamaEmbedder {
    /// Create a new Ollama embedder from config.
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid or the client cannot be built.
    pub fn new(config: &EmbeddingConfig) -> MemoryResult<Self> {
        let builder = ollama::Client::<ReqwestClient>::builder().api_key(Nothing);
        let builder = if let Some(base_url) = &config.base_url {
            builder.base_url(base_url)
        } else {
            builder
        };
        let client = builder.build().map_err(MemoryError::from)?;
        let model = client.embedding_model_with_ndims(config.model.clone(), config.ndims);

        Ok(Self {
            model,
            ndims: config.ndims,
            normalize: config.normalize,
            prefixes: prefixes_for(&config.model),
        })
    }

    fn finish(&self, raw: Vec<f64>) -> Vec<f32> {
        #[allow(clippy::cast_possible_truncation)]
        let mut out: Vec<f32> = raw.into_iter().map(|x| x as f32).collect();
        if self.normalize {
            vector::l2_normalize(&mut out);
        }
        out
    }
}

impl Embedder for OllamaEmbedder {
    fn embed_passages(&self, texts: Vec<String>) -> EmbedFuture<'_, MemoryResult<Vec<Vec<f32>>>> {
        let texts: Vec<String> = match self.prefixes {
            Some((passage_prefix, _)) => texts
                .into_iter()
                .map(|text| format!("{passage_prefix}{text}"))
                .collect(),
            None => texts,
        };

        Box::pin(async move {
            let embeddings = self
                .model
                .embed_texts(texts)
                .await
                .map_err(MemoryError::Embedding)?;
            Ok(embeddings
                .into_iter()
                .map(|embedding| self.finish(embedding.vec))
                .collect())
        })
    }

    fn embed_query(&self, text: &str) -> EmbedFuture<'_, MemoryResult<Vec<f32>>> {
        let text = match self.prefixes {
            Some((_, query_prefix)) => format!("{query_prefix}{text}"),
            None => text.to_string(),
        };

        Box::pin(async move {
            let embedding = self
                .model
                .embed_text(&text)
                .await
                .map_err(MemoryError::Embedding)?;
            Ok(self.finish(embedding.vec))
        })
    }

    fn ndims(&self) -> usize {
        self.ndims
    }
}
