//! OpenAI-compatible chat-completions backend
//!
//! Works against any gateway speaking the `/chat/completions` protocol
//! (OpenAI, AI Pipe, OpenRouter, local proxies).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::LlmError;
use crate::http_client::HttpClient;
use crate::types::{LlmBackend, LlmInvocation, LlmResult, Message, Role};

const PROVIDER: &str = "openai-compatible";

/// Default generation parameters.
///
/// `None` omits the field from the request so the provider default applies;
/// some reasoning models reject an explicit temperature.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HttpParams {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

/// Backend for OpenAI-compatible HTTP APIs
#[derive(Clone)]
pub struct OpenAiCompatibleBackend {
    client: Arc<HttpClient>,
    endpoint: String,
    api_key: String,
    default_model: String,
    default_params: HttpParams,
}

impl OpenAiCompatibleBackend {
    /// Create a backend for `base_url`.
    ///
    /// `base_url` may be the API root (`https://host/v1`) or the full
    /// `/chat/completions` endpoint.
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Misconfiguration` if the API key is empty.
    pub fn new(
        client: HttpClient,
        api_key: String,
        base_url: &str,
        default_model: String,
        default_params: HttpParams,
    ) -> Result<Self, LlmError> {
        if api_key.trim().is_empty() {
            return Err(LlmError::Misconfiguration("LLM API key is empty".to_string()));
        }

        Ok(Self {
            client: Arc::new(client),
            endpoint: chat_endpoint(base_url),
            api_key,
            default_model,
            default_params,
        })
    }

    /// Build the backend from `[llm]` configuration and resolved secrets.
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Misconfiguration` if the API key variable is unset.
    pub fn new_from_config(config: &pagesmith_config::Config) -> Result<Self, LlmError> {
        let api_key = config.secrets.llm_api_key.clone().ok_or_else(|| {
            LlmError::Misconfiguration(format!(
                "LLM API key not found in environment variable '{}'",
                config.llm.api_key_env
            ))
        })?;

        let client = HttpClient::new()?;
        Self::new(
            client,
            api_key,
            &config.llm.base_url,
            config.llm.model.clone(),
            HttpParams {
                max_tokens: config.llm.max_tokens,
                temperature: config.llm.temperature,
            },
        )
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Resolve parameters for this invocation
    ///
    /// `inv.model` overrides the default model when non-empty; generation
    /// parameters always come from `[llm]` configuration.
    fn resolve_params(&self, inv: &LlmInvocation) -> (String, HttpParams) {
        let model = if inv.model.is_empty() {
            self.default_model.clone()
        } else {
            inv.model.clone()
        };
        (model, self.default_params.clone())
    }

    fn convert_messages(messages: &[Message]) -> Vec<ChatMessage> {
        messages
            .iter()
            .map(|msg| ChatMessage {
                role: match msg.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                },
                content: msg.content.clone(),
            })
            .collect()
    }
}

/// Append `/chat/completions` unless the URL already ends with it.
fn chat_endpoint(base_url: &str) -> String {
    let trimmed = base_url.trim_end_matches('/');
    if trimmed.ends_with("/chat/completions") {
        trimmed.to_string()
    } else {
        format!("{trimmed}/chat/completions")
    }
}

#[async_trait]
impl LlmBackend for OpenAiCompatibleBackend {
    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, LlmError> {
        let (model, params) = self.resolve_params(&inv);

        debug!(
            provider = PROVIDER,
            task = %inv.task_id,
            round = inv.round,
            model = %model,
            timeout_secs = inv.timeout.as_secs(),
            "Invoking chat completions"
        );

        let request_body = ChatRequest {
            model: model.clone(),
            messages: Self::convert_messages(&inv.messages),
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            stream: false,
        };

        let request = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request_body);

        let response = self
            .client
            .execute_with_retry(request, inv.timeout, PROVIDER)
            .await?;

        let response_body: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Transport(format!("Failed to parse chat response: {e}")))?;

        let choice = response_body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::Transport("Chat response missing choices[0]".to_string()))?;

        let content = choice.message.content.unwrap_or_default();

        let mut result = LlmResult::new(content, PROVIDER, response_body.model.unwrap_or(model));
        if let Some(usage) = response_body.usage {
            result = result.with_tokens(usage.prompt_tokens, usage.completion_tokens);
        }

        debug!(
            provider = PROVIDER,
            chars = result.raw_response.len(),
            tokens_output = ?result.tokens_output,
            "Chat completion received"
        );

        Ok(result)
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    model: Option<String>,
    usage: Option<Usage>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct Usage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn backend(params: HttpParams) -> OpenAiCompatibleBackend {
        OpenAiCompatibleBackend::new(
            HttpClient::new().unwrap(),
            "test-key".to_string(),
            "https://example.test/v1/",
            "default-model".to_string(),
            params,
        )
        .unwrap()
    }

    #[test]
    fn test_endpoint_is_derived_from_base_url() {
        assert_eq!(
            chat_endpoint("https://aipipe.org/openai/v1"),
            "https://aipipe.org/openai/v1/chat/completions"
        );
        assert_eq!(
            chat_endpoint("https://host/v1/chat/completions/"),
            "https://host/v1/chat/completions"
        );
        assert_eq!(
            backend(HttpParams::default()).endpoint(),
            "https://example.test/v1/chat/completions"
        );
    }

    #[test]
    fn test_resolve_params_uses_defaults() {
        let b = backend(HttpParams {
            max_tokens: Some(1024),
            temperature: None,
        });
        let inv = LlmInvocation::new("demo", 1, "", Duration::from_secs(60), vec![]);

        let (model, params) = b.resolve_params(&inv);
        assert_eq!(model, "default-model");
        assert_eq!(params.max_tokens, Some(1024));
        assert_eq!(params.temperature, None);
    }

    #[test]
    fn test_resolve_params_model_override_keeps_configured_params() {
        let b = backend(HttpParams {
            max_tokens: Some(2048),
            temperature: Some(0.5),
        });
        let inv = LlmInvocation::new("demo", 1, "custom", Duration::from_secs(60), vec![]);

        let (model, params) = b.resolve_params(&inv);
        assert_eq!(model, "custom");
        assert_eq!(params.max_tokens, Some(2048));
        assert_eq!(params.temperature, Some(0.5));
    }

    #[test]
    fn test_unset_params_are_not_serialized() {
        let body = ChatRequest {
            model: "m".to_string(),
            messages: vec![],
            max_tokens: None,
            temperature: None,
            stream: false,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("temperature").is_none());
        assert!(json.get("max_tokens").is_none());
    }

    #[test]
    fn test_empty_api_key_rejected() {
        let err = OpenAiCompatibleBackend::new(
            HttpClient::new().unwrap(),
            "  ".to_string(),
            "https://example.test/v1",
            "m".to_string(),
            HttpParams::default(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, LlmError::Misconfiguration(_)));
    }
}
