//! Inbound task request body and its validation
//!
//! [`TaskRequest`] mirrors the JSON posted to `/task` (or read from a task
//! file by `pagesmith run`) with every field optional, so a malformed body
//! can still be inspected for its nonce and secret. [`TaskRequest::validate`]
//! is the only way to obtain a [`TaskDescription`].

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::types::{Attachment, TaskDescription};

/// Raw attachment entry as it appears on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawAttachment {
    pub name: Option<String>,
    pub url: Option<String>,
}

/// Untyped task request.
///
/// `round` is accepted as any JSON value so a string `"2"` or a float `2.0`
/// can be reported precisely instead of failing deserialization outright.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskRequest {
    pub email: Option<String>,
    pub task: Option<String>,
    pub round: Option<serde_json::Value>,
    pub nonce: Option<String>,
    pub brief: Option<String>,
    pub attachments: Option<Vec<RawAttachment>>,
    pub checks: Option<Vec<serde_json::Value>>,
    pub evaluation_url: Option<String>,
    /// Where the caller reached us; informational only.
    pub endpoint: Option<String>,
    pub secret: Option<String>,
}

impl TaskRequest {
    /// Parse a request from arbitrary JSON.
    ///
    /// Fails only when the body is not a JSON object with string-ish fields;
    /// missing fields are left for [`validate`](Self::validate) to report.
    pub fn from_json(value: serde_json::Value) -> Result<Self, ValidationError> {
        serde_json::from_value(value)
            .map_err(|e| ValidationError::new(vec![format!("malformed request body: {e}")]))
    }

    /// Best-effort nonce extraction from a body that may not parse.
    #[must_use]
    pub fn nonce_hint(value: &serde_json::Value) -> Option<String> {
        value
            .get("nonce")
            .and_then(serde_json::Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
    }

    /// Whether the supplied secret equals `expected`.
    ///
    /// Compares in constant time over the longer of the two lengths.
    #[must_use]
    pub fn secret_matches(&self, expected: &str) -> bool {
        let Some(given) = self.secret.as_deref() else {
            return false;
        };
        let a = given.as_bytes();
        let b = expected.as_bytes();
        let mut diff = a.len() ^ b.len();
        for i in 0..a.len().max(b.len()) {
            let x = a.get(i).copied().unwrap_or(0);
            let y = b.get(i).copied().unwrap_or(0);
            diff |= usize::from(x ^ y);
        }
        diff == 0
    }

    /// Turn the raw body into a [`TaskDescription`], collecting every problem.
    ///
    /// Empty or whitespace-only strings count as missing. `round` must be a
    /// non-negative integer; whether it is 1 or 2 is decided by the
    /// orchestrator so every entry point shares one rule.
    pub fn validate(&self) -> Result<TaskDescription, ValidationError> {
        let mut issues = Vec::new();

        let email = required(&self.email, "email", &mut issues);
        let task_id = required(&self.task, "task", &mut issues);
        let nonce = required(&self.nonce, "nonce", &mut issues);
        let brief = required(&self.brief, "brief", &mut issues);
        let evaluation_url = required(&self.evaluation_url, "evaluation_url", &mut issues);

        if let Some(email) = &email
            && !email.contains('@')
        {
            issues.push(format!("email '{email}' has no '@'"));
        }

        if let Some(url) = &evaluation_url
            && !(url.starts_with("http://") || url.starts_with("https://"))
        {
            issues.push("evaluation_url must be an http(s) URL".to_string());
        }

        let round = match &self.round {
            None | Some(serde_json::Value::Null) => {
                issues.push("round is required".to_string());
                None
            }
            Some(value) => match value.as_u64().and_then(|r| u32::try_from(r).ok()) {
                Some(r) => Some(r),
                None => {
                    issues.push(format!("round must be an integer, got {value}"));
                    None
                }
            },
        };

        let mut attachments = Vec::new();
        for (index, raw) in self.attachments.iter().flatten().enumerate() {
            match (non_empty(&raw.name), non_empty(&raw.url)) {
                (Some(name), Some(url)) => attachments.push(Attachment::new(name, url)),
                _ => issues.push(format!("attachments[{index}] needs both name and url")),
            }
        }

        let checks = self.checks.clone().unwrap_or_default();

        match (email, task_id, nonce, brief, evaluation_url, round) {
            (Some(email), Some(task_id), Some(nonce), Some(brief), Some(evaluation_url), Some(round))
                if issues.is_empty() =>
            {
                Ok(TaskDescription {
                    nonce,
                    task_id,
                    round,
                    brief,
                    attachments,
                    checks,
                    email,
                    evaluation_url,
                })
            }
            _ => Err(ValidationError::new(issues)),
        }
    }
}

fn non_empty(field: &Option<String>) -> Option<String> {
    field
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn required(field: &Option<String>, name: &str, issues: &mut Vec<String>) -> Option<String> {
    let value = non_empty(field);
    if value.is_none() {
        issues.push(format!("{name} is required"));
    }
    value
}
