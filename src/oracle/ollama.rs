//! Oracle implementation over Rig's Ollama completion provider.

use reqwest::Client as ReqwestClient;
use rig::client::CompletionClient;
use rig::completion::CompletionModel;
use rig::message::AssistantContent;
use rig::providers::ollama;

use crate::core::config::OracleConfig;
use crate::core::errors::{MemoryError, MemoryResult};
use crate::oracle::{Oracle, OracleFuture};

/// Ollama-backed reasoning oracle.
pub struct OllamaOracle {
    model: ollama::CompletionModel,
    temperature: f64,
    max_tokens: Option<u64>,
}

impl OllamaOracle {
    /// Create a new oracle from config.
    ///
    /// # Errors
    /// Returns an error if the Ollama client cannot be built.
    pub fn new(config: &OracleConfig) -> MemoryResult<Self> {
        let builder = ollama::Client::<ReqwestClient>::builder().api_key(rig::client::Nothing);
        let builder = if let Some(base_url) = &config.base_url {
            builder.base_url(base_url)
        } else {
            builder
        };
        let client = builder.build().map_err(MemoryError::from)?;
        let model = client.completion_model(config.model.clone());

        Ok(Self {
            model,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

impl Oracle for OllamaOracle {
    fn complete(&self, system: &str, user: &str) -> OracleFuture<'_, MemoryResult<String>> {
        let system = system.to_string();
        let user = user.to_string();
        Box::pin(async move {
            let request = self
                .model
                .completion_request(user)
                .preamble(system)
                .temperature(self.temperature)
                .max_tokens_opt(self.max_tokens)
                .build();

            let response = self.model.completion(request).await?;
            Ok(extract_text(&response.choice))
        })
    }
}

fn extract_text(choice: &rig::OneOrMany<AssistantContent>) -> String {
    let mut out = String::new();
    for content in choice.iter() {
        if let AssistantContent::Text(text) = content {
            out.push_str(&text.text);
        }
    }
    out
}
