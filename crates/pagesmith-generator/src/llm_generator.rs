//! LLM-backed content generator

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use pagesmith_config::Config;
use pagesmith_llm::{LlmBackend, LlmInvocation, Message};

use crate::clean::clean_reply;
use crate::prompt::{SYSTEM_PROMPT, build_prompt};
use crate::{ContentGenerator, GeneratedArtifact, GenerationRequest, GeneratorError};

/// Cleaned replies shorter than this are reported as insufficient.
pub const MIN_REPLY_CHARS: usize = 200;

/// Generates artifacts by prompting a chat-completions model.
pub struct LlmGenerator {
    backend: Arc<dyn LlmBackend>,
    model: String,
    timeout: Duration,
}

impl LlmGenerator {
    #[must_use]
    pub fn new(backend: Arc<dyn LlmBackend>, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            backend,
            model: model.into(),
            timeout,
        }
    }

    #[must_use]
    pub fn from_config(backend: Arc<dyn LlmBackend>, config: &Config) -> Self {
        Self::new(backend, config.llm.model.clone(), config.llm.timeout())
    }
}

#[async_trait]
impl ContentGenerator for LlmGenerator {
    async fn generate_solution(
        &self,
        request: &GenerationRequest,
    ) -> Result<GeneratedArtifact, GeneratorError> {
        let invocation = LlmInvocation::new(
            &request.task_id,
            request.round,
            &self.model,
            self.timeout,
            vec![Message::system(SYSTEM_PROMPT), Message::user(build_prompt(request))],
        );

        let result = self.backend.invoke(invocation).await?;
        let html = clean_reply(&result.raw_response);
        let length = html.chars().count();

        if length < MIN_REPLY_CHARS {
            warn!(
                task = %request.task_id,
                raw_chars = result.raw_response.len(),
                length,
                "Model reply too short"
            );
            return Err(GeneratorError::InsufficientOutput {
                length,
                minimum: MIN_REPLY_CHARS,
            });
        }

        info!(
            task = %request.task_id,
            model = %result.model_used,
            chars = length,
            tokens_output = ?result.tokens_output,
            "Model generated artifact"
        );
        Ok(GeneratedArtifact::from_llm(html, result.model_used))
    }

    fn name(&self) -> &str {
        "llm"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ArtifactSource;
    use pagesmith_llm::{LlmError, LlmResult};
    use std::sync::Mutex;

    struct CannedBackend {
        reply: Result<String, LlmError>,
        seen: Mutex<Vec<LlmInvocation>>,
    }

    impl CannedBackend {
        fn new(reply: Result<String, LlmError>) -> Arc<Self> {
            Arc::new(Self {
                reply,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmBackend for CannedBackend {
        async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, LlmError> {
            self.seen.lock().unwrap().push(inv);
            self.reply
                .clone()
                .map(|text| LlmResult::new(text, "canned", "canned-model"))
        }

        fn name(&self) -> &str {
            "canned"
        }
    }

    fn request() -> GenerationRequest {
        GenerationRequest {
            task_id: "demo".to_string(),
            round: 1,
            brief: "Show #greeting".to_string(),
            attachments: Vec::new(),
            checks: Vec::new(),
        }
    }

    fn long_page() -> String {
        format!(
            "```html\n<!DOCTYPE html><html><body><div id=\"greeting\">{}</div></body></html>\n```",
            "hello ".repeat(50)
        )
    }

    #[tokio::test]
    async fn cleans_reply_and_reports_model() {
        let backend = CannedBackend::new(Ok(long_page()));
        let generator = LlmGenerator::new(backend.clone(), "gpt-5-nano", Duration::from_secs(30));

        let artifact = generator.generate_solution(&request()).await.unwrap();

        assert_eq!(artifact.source, ArtifactSource::Llm);
        assert_eq!(artifact.model.as_deref(), Some("canned-model"));
        assert!(artifact.html.starts_with("<!DOCTYPE html>"));
        assert!(!artifact.html.contains("```"));

        let seen = backend.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].model, "gpt-5-nano");
        assert_eq!(seen[0].messages.len(), 2);
        assert!(seen[0].messages[1].content.contains("#greeting"));
    }

    #[tokio::test]
    async fn short_reply_is_insufficient() {
        let backend = CannedBackend::new(Ok("<html>tiny</html>".to_string()));
        let generator = LlmGenerator::new(backend, "m", Duration::from_secs(30));

        let err = generator.generate_solution(&request()).await.unwrap_err();
        assert!(
            matches!(err, GeneratorError::InsufficientOutput { minimum: 200, .. }),
            "got {err:?}"
        );
    }

    #[tokio::test]
    async fn backend_errors_propagate() {
        let backend = CannedBackend::new(Err(LlmError::ProviderQuota("429".to_string())));
        let generator = LlmGenerator::new(backend, "m", Duration::from_secs(30));

        let err = generator.generate_solution(&request()).await.unwrap_err();
        assert!(matches!(err, GeneratorError::Llm(LlmError::ProviderQuota(_))));
    }
}
