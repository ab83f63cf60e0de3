//! Core domain types shared across pagesmith crates
//!
//! A task enters the system as a [`TaskDescription`], moves through the
//! orchestrator pipeline, and leaves as a [`PipelineResult`] plus a
//! [`NotificationPayload`] posted to the caller's callback URL. Progress is
//! tracked per nonce in [`TaskStatusRecord`]s.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A named attachment supplied with a task.
///
/// `url` is usually a `data:` URL carrying base64 content; the generator
/// decodes it before use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub url: String,
}

impl Attachment {
    #[must_use]
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// One validated unit of work.
///
/// Immutable once accepted. `round` is kept as the caller's integer; the
/// orchestrator converts it to [`Round`] before doing any work and rejects
/// anything other than 1 or 2.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDescription {
    /// Caller-supplied correlation token, unique per submission.
    pub nonce: String,
    /// Logical task name, stable across rounds of the same task.
    pub task_id: String,
    pub round: u32,
    pub brief: String,
    pub attachments: Vec<Attachment>,
    /// Machine-checkable assertions, opaque to the pipeline.
    pub checks: Vec<serde_json::Value>,
    pub email: String,
    pub evaluation_url: String,
}

/// Which pass over a task this submission is.
///
/// Round 1 creates the repository, round 2 updates the same repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum Round {
    One,
    Two,
}

impl Round {
    #[must_use]
    pub fn as_u32(self) -> u32 {
        match self {
            Round::One => 1,
            Round::Two => 2,
        }
    }
}

impl TryFrom<u32> for Round {
    type Error = InvalidRound;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Round::One),
            2 => Ok(Round::Two),
            other => Err(InvalidRound(other)),
        }
    }
}

impl From<Round> for u32 {
    fn from(round: Round) -> Self {
        round.as_u32()
    }
}

impl fmt::Display for Round {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u32())
    }
}

/// A round number outside {1, 2}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("round must be 1 or 2, got {0}")]
pub struct InvalidRound(pub u32);

/// Lifecycle state of a task as seen by the status table.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TaskStatus {
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    /// Whether this status ends a pipeline run.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

/// Last-known progress of one submission, keyed by nonce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatusRecord {
    pub nonce: String,
    pub status: TaskStatus,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Outcome of one `process_task` call.
///
/// Never carries a panic or an error type across the orchestrator boundary;
/// failures are flattened into `error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round: Option<u32>,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PipelineResult {
    /// Build a successful result.
    #[must_use]
    pub fn succeeded(
        repo_url: impl Into<String>,
        pages_url: impl Into<String>,
        commit_ref: impl Into<String>,
        round: Round,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            success: true,
            repo_url: Some(repo_url.into()),
            pages_url: Some(pages_url.into()),
            commit_ref: Some(commit_ref.into()),
            round: Some(round.as_u32()),
            elapsed_ms,
            error: None,
        }
    }

    /// Build a failed result carrying the error text.
    #[must_use]
    pub fn failed(error: impl Into<String>, elapsed_ms: u64) -> Self {
        Self {
            success: false,
            repo_url: None,
            pages_url: None,
            commit_ref: None,
            round: None,
            elapsed_ms,
            error: Some(error.into()),
        }
    }
}

/// Body POSTed to the caller's evaluation callback.
///
/// Field names are part of the wire contract and must not change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub email: String,
    pub task: String,
    pub round: u32,
    pub nonce: String,
    pub repo_url: String,
    pub commit_sha: String,
    pub pages_url: String,
}

/// Where a configuration value came from.
///
/// # Serialization
///
/// ```rust
/// use pagesmith_utils::types::ConfigSource;
///
/// let json = serde_json::to_string(&ConfigSource::Env).unwrap();
/// assert_eq!(json, r#""env""#);
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConfigSource {
    /// Value provided via CLI argument (highest precedence).
    Cli,
    /// Value read from an environment variable.
    Env,
    /// Value loaded from configuration file.
    Config,
    /// Value provided programmatically (e.g., `Config::builder()`).
    Programmatic,
    /// Built-in default value (lowest precedence).
    Default,
}
