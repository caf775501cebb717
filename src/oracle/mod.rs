//! Reasoning oracle boundary.
//!
//! The engine consumes an external reasoning capability through a narrow
//! `complete` call; prompt construction and response validation live with
//! the callers. Oracle replies often arrive wrapped in prose or code
//! fences, so [`extract_json_object`] locates the payload by brace scan
//! before parsing.

pub mod ollama;

use std::future::Future;
use std::pin::Pin;

use crate::core::errors::MemoryResult;

pub use ollama::OllamaOracle;

/// Boxed future type for oracle operations.
pub type OracleFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// External reasoning capability.
pub trait Oracle: Send + Sync {
    /// Run one completion with a system preamble and a user prompt.
    ///
    /// # Errors
    /// Returns an error if the completion request fails.
    fn complete(&self, system: &str, user: &str) -> OracleFuture<'_, MemoryResult<String>>;
}

/// Locate the outermost JSON object in free-form oracle output.
///
/// Takes the slice from the first `{` to the last `}`, which tolerates
/// surrounding prose and Markdown code fences.
#[must_use]
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_bare_object() {
        assert_eq!(extract_json_object(r#"{"a": 1}"#), Some(r#"{"a": 1}"#));
    }

    #[test]
    fn test_extracts_from_code_fence() {
        let text = "Sure, here you go:\n```json\n{\"decision\": \"NEW\"}\n```\nHope that helps!";
        assert_eq!(extract_json_object(text), Some("{\"decision\": \"NEW\"}"));
    }

    #[test]
    fn test_none_without_braces() {
        assert_eq!(extract_json_object("no json here"), None);
        assert_eq!(extract_json_object("} backwards {"), None);
    }
}
