//! Repository documentation published next to the artifact

use chrono::{DateTime, Utc};
use minijinja::{Environment, context};
use serde::Serialize;

use pagesmith_utils::types::TaskDescription;

use crate::GeneratorError;
use crate::prompt::check_text;
use crate::templates::{self, LICENSE, README, ROUND2};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Brief characters kept in a commit subject
const COMMIT_BRIEF_CHARS: usize = 50;

/// Values shared by the README and round-2 notes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocContext {
    pub task_id: String,
    pub round: u32,
    pub nonce: String,
    pub brief: String,
    pub checks: Vec<String>,
    pub repo_url: String,
    pub pages_url: String,
    pub generated_at: String,
}

impl DocContext {
    #[must_use]
    pub fn new(task: &TaskDescription, repo_url: &str, pages_url: &str) -> Self {
        Self::with_timestamp(task, repo_url, pages_url, Utc::now())
    }

    #[must_use]
    pub fn with_timestamp(
        task: &TaskDescription,
        repo_url: &str,
        pages_url: &str,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            task_id: task.task_id.clone(),
            round: task.round,
            nonce: task.nonce.clone(),
            brief: task.brief.clone(),
            checks: task.checks.iter().map(check_text).collect(),
            repo_url: repo_url.to_string(),
            pages_url: pages_url.to_string(),
            generated_at: at.format(TIMESTAMP_FORMAT).to_string(),
        }
    }
}

/// Renders README, LICENSE and round-2 notes.
pub struct DocRenderer {
    env: Environment<'static>,
    holder: String,
}

impl DocRenderer {
    /// # Errors
    ///
    /// Returns `GeneratorError::Template` if an embedded template is invalid.
    pub fn new(holder: impl Into<String>) -> Result<Self, GeneratorError> {
        Ok(Self {
            env: templates::environment()?,
            holder: holder.into(),
        })
    }

    /// # Errors
    ///
    /// Returns `GeneratorError::Template` if rendering fails.
    pub fn readme(&self, ctx: &DocContext) -> Result<String, GeneratorError> {
        templates::render(&self.env, README, ctx)
    }

    /// MIT licence text for `year`.
    ///
    /// # Errors
    ///
    /// Returns `GeneratorError::Template` if rendering fails.
    pub fn license(&self, year: i32) -> Result<String, GeneratorError> {
        templates::render(&self.env, LICENSE, context! { year => year, holder => &self.holder })
    }

    /// # Errors
    ///
    /// Returns `GeneratorError::Template` if rendering fails.
    pub fn round2_notes(&self, ctx: &DocContext) -> Result<String, GeneratorError> {
        templates::render(&self.env, ROUND2, ctx)
    }
}

/// `Round {n}: ` followed by the start of the brief on one line.
#[must_use]
pub fn commit_message(round: u32, brief: &str) -> String {
    let summary: String = brief
        .chars()
        .take(COMMIT_BRIEF_CHARS)
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();
    format!("Round {round}: {summary}")
}
