//! `pagesmith run <task.json>`
//!
//! Processes one task in the foreground. The task file holds the same body
//! as `POST /task`; the shared secret is not checked because the caller
//! already has local access.

use anyhow::{Context, Result};
use std::path::Path;

use pagesmith_config::Config;
use pagesmith_orchestrator::OrchestratorHandle;
use pagesmith_utils::error::PagesmithError;
use pagesmith_utils::request::TaskRequest;
use pagesmith_utils::types::TaskDescription;

/// Read and validate a task file.
pub fn load_task(path: &Path) -> Result<TaskDescription> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read task file {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&raw)
        .with_context(|| format!("Task file {} is not valid JSON", path.display()))?;

    let request = TaskRequest::from_json(value).map_err(PagesmithError::from)?;
    let task = request.validate().map_err(PagesmithError::from)?;
    Ok(task)
}

/// Run the pipeline for the task in `path` and print its result as JSON.
///
/// Returns whether the pipeline succeeded; a failed pipeline is reported
/// through the printed result, not as an error.
pub async fn execute_run_command(path: &Path, wait_notify: bool, config: &Config) -> Result<bool> {
    let task = load_task(path)?;
    let handle = OrchestratorHandle::from_config(config)?;

    let outcome = handle.process_task_tracked(&task).await;
    let rendered = serde_json::to_string_pretty(&outcome.result)
        .context("Failed to serialize pipeline result")?;
    println!("{rendered}");

    match outcome.notification {
        Some(notification) if wait_notify => match notification.outcome().await {
            Ok(receipt) => eprintln!(
                "✓ Evaluation callback delivered after {} attempt(s)",
                receipt.attempts
            ),
            Err(err) => eprintln!("⚠ Evaluation callback not delivered: {err}"),
        },
        Some(_) => eprintln!(
            "ℹ Evaluation callback is still in flight and stops when pagesmith exits; pass --wait-notify to wait for it"
        ),
        None => {}
    }

    Ok(outcome.result.success)
}
