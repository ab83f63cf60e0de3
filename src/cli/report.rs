//! Contextual error reports for the terminal
//!
//! Builds on [`PagesmithError::display_for_user`] and appends help that
//! depends on which command failed.

use pagesmith_utils::error::PagesmithError;
use pagesmith_utils::redaction::redact_error_message;

/// Render `err` for stderr, with hints specific to `operation`.
#[must_use]
pub fn create_contextual_report(err: &PagesmithError, operation: &str) -> String {
    let mut report = err.display_for_user();

    let hints = operation_hints(err, operation);
    if !hints.is_empty() {
        report.push_str(&format!("\nWhile running `pagesmith {operation}`:\n"));
        for hint in hints {
            report.push_str(&format!("  • {hint}\n"));
        }
    }

    redact_error_message(&report)
}

fn operation_hints(err: &PagesmithError, operation: &str) -> Vec<&'static str> {
    match (operation, err) {
        ("config", PagesmithError::Config(_)) => vec![
            "Run `pagesmith config` with --config pointing at a known-good file to compare",
        ],
        ("serve", PagesmithError::Config(_) | PagesmithError::Publisher(_) | PagesmithError::Llm(_)) => vec![
            "The server needs github.username plus the GitHub token and LLM key variables",
            "Check `pagesmith config` for values showing (unset) or unset",
        ],
        ("run", PagesmithError::Validation(_)) => {
            vec!["The task file takes the same JSON body as POST /task"]
        }
        ("run", PagesmithError::Pipeline(_)) => {
            vec!["Re-run with --verbose to see each phase as it executes"]
        }
        _ => Vec::new(),
    }
}

/// Suggestions for errors that never became a `PagesmithError`.
pub(crate) fn enhance_error_context(error: &anyhow::Error) -> Option<Vec<&'static str>> {
    let error_str = error.to_string();

    if error_str.contains("Failed to bind") {
        Some(vec![
            "Check that no other process is listening on the port",
            "Pick a different port with --port or PAGESMITH_PORT",
        ])
    } else if error_str.contains("Failed to read task file") {
        Some(vec![
            "Verify the path exists and is readable",
            "Paths are resolved relative to the working directory",
        ])
    } else if error_str.contains("not valid JSON") {
        Some(vec!["The task file must contain a single JSON object"])
    } else {
        None
    }
}
