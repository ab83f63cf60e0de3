//! LLM backend abstraction
//!
//! Providers implement the `LlmBackend` trait so the generator can work with
//! any chat-completions gateway without knowing its wire details.

pub(crate) mod http_client;
mod openai_backend;
mod types;

pub use http_client::{HttpClient, RetryPolicy};
pub use openai_backend::{HttpParams, OpenAiCompatibleBackend};
pub use pagesmith_utils::error::LlmError;
pub use types::{LlmBackend, LlmInvocation, LlmResult, Message, Role};

use pagesmith_config::Config;
use tracing::info;

/// Construct the configured LLM backend.
///
/// # Errors
///
/// Returns `LlmError::Misconfiguration` when the API key is missing or the
/// HTTP client cannot be built.
pub fn from_config(config: &Config) -> Result<Box<dyn LlmBackend>, LlmError> {
    let backend = OpenAiCompatibleBackend::new_from_config(config)?;
    info!(
        provider = backend.name(),
        endpoint = backend.endpoint(),
        model = %config.llm.model,
        "LLM backend configured"
    );
    Ok(Box::new(backend))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_api_key_is_misconfiguration() {
        let config = Config::builder().github_username("bot").build().unwrap();
        let err = from_config(&config).err().unwrap();
        match err {
            LlmError::Misconfiguration(msg) => {
                assert!(msg.contains("LLM_API_KEY"), "message names the variable: {msg}");
            }
            other => panic!("expected Misconfiguration, got {other:?}"),
        }
    }

    #[test]
    fn configured_key_builds_backend() {
        let config = Config::builder()
            .github_username("bot")
            .llm_api_key("sk-test")
            .llm_base_url("http://127.0.0.1:9/v1")
            .build()
            .unwrap();
        let backend = from_config(&config).unwrap();
        assert_eq!(backend.name(), "openai-compatible");
    }
}
