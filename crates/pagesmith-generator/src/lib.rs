//! Artifact generation for pagesmith
//!
//! A [`ContentGenerator`] turns a task brief, its decoded attachments and
//! its checks into one self-contained HTML document. Two implementations
//! ship here:
//!
//! - [`LlmGenerator`] asks a chat-completions model and cleans the reply
//! - [`FallbackRenderer`] renders a deterministic template chosen from
//!   keywords in the brief
//!
//! [`DocRenderer`] produces the README, LICENSE and round-2 notes that are
//! published next to the artifact.

pub mod attachments;
pub mod clean;
mod docs;
mod fallback;
mod llm_generator;
pub mod prompt;
mod templates;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

pub use attachments::{AttachmentKind, DecodedAttachment};
pub use docs::{DocContext, DocRenderer, commit_message};
pub use fallback::{FallbackRenderer, Layout};
pub use llm_generator::{LlmGenerator, MIN_REPLY_CHARS};
pub use pagesmith_utils::error::GeneratorError;

use pagesmith_utils::types::TaskDescription;

/// Everything a generator needs for one round of one task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    pub task_id: String,
    pub round: u32,
    pub brief: String,
    pub attachments: Vec<DecodedAttachment>,
    pub checks: Vec<Value>,
}

impl GenerationRequest {
    /// Build a request from a task, decoding its attachments.
    ///
    /// Attachments that cannot be decoded are dropped with a warning.
    #[must_use]
    pub fn from_task(task: &TaskDescription) -> Self {
        Self {
            task_id: task.task_id.clone(),
            round: task.round,
            brief: task.brief.clone(),
            attachments: attachments::decode_all(&task.attachments),
            checks: task.checks.clone(),
        }
    }

    /// First decoded attachment of the given kind.
    #[must_use]
    pub fn attachment_of(&self, kind: AttachmentKind) -> Option<&DecodedAttachment> {
        self.attachments.iter().find(|a| a.kind == kind)
    }
}

/// Where an artifact came from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display, strum::IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ArtifactSource {
    Llm,
    Fallback,
}

/// One generated HTML document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedArtifact {
    pub html: String,
    pub source: ArtifactSource,
    /// Model that produced the artifact, for LLM artifacts
    pub model: Option<String>,
}

impl GeneratedArtifact {
    #[must_use]
    pub fn from_llm(html: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            source: ArtifactSource::Llm,
            model: Some(model.into()),
        }
    }

    #[must_use]
    pub fn from_fallback(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            source: ArtifactSource::Fallback,
            model: None,
        }
    }

    /// Length in characters, used for the sufficiency threshold.
    #[must_use]
    pub fn char_len(&self) -> usize {
        self.html.trim().chars().count()
    }
}

/// Produces an HTML artifact for a generation request.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// # Errors
    ///
    /// Returns `GeneratorError` when no artifact could be produced. Callers
    /// are expected to fall back to a template artifact.
    async fn generate_solution(
        &self,
        request: &GenerationRequest,
    ) -> Result<GeneratedArtifact, GeneratorError>;

    /// Short name for logs.
    fn name(&self) -> &str;
}
