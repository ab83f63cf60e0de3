//! Logging and observability infrastructure for pagesmith
//!
//! Structured logging over `tracing`. Pipeline events carry the fields
//! `nonce`, `task`, `round`, `phase`, `attempt` and `elapsed_ms` so a single
//! task can be followed through interleaved output.

use serde::{Deserialize, Serialize};
use std::io::IsTerminal;
use tracing::{Level, error, info, span};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::redaction::redact_error_message;

/// Environment variable consulted before `RUST_LOG`.
pub const LOG_ENV_VAR: &str = "PAGESMITH_LOG";

/// Output format for the tracing subscriber.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable, one line per event
    #[default]
    Compact,
    /// One JSON object per event, for log shippers
    Json,
}

/// Check if colored output should be used.
///
/// Returns true only if stdout is a terminal and `NO_COLOR` is unset.
fn use_color() -> bool {
    std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none()
}

fn build_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV_VAR)
        .or_else(|_| EnvFilter::try_from_default_env())
        .or_else(|_| {
            if verbose {
                EnvFilter::try_new("pagesmith=debug,tower_http=debug,info")
            } else {
                EnvFilter::try_new("pagesmith=info,warn")
            }
        })
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize the tracing subscriber.
///
/// `PAGESMITH_LOG`, then `RUST_LOG`, override the default filter. Verbose
/// mode adds targets and span close events; JSON mode flattens event fields
/// and includes the current span.
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(verbose: bool, format: LogFormat) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = build_filter(verbose);

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .json()
                        .flatten_event(true)
                        .with_current_span(true)
                        .with_span_list(false)
                        .with_target(verbose),
                )
                .try_init()?;
        }
        LogFormat::Compact if verbose => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_ansi(use_color())
                        .with_thread_ids(false)
                        .with_line_number(false)
                        .with_file(false)
                        .with_span_events(FmtSpan::CLOSE)
                        .compact(),
                )
                .try_init()?;
        }
        LogFormat::Compact => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_ansi(use_color())
                        .with_thread_ids(false)
                        .with_line_number(false)
                        .with_file(false)
                        .compact(),
                )
                .try_init()?;
        }
    }

    Ok(())
}

/// Span wrapping one `process_task` call.
pub fn task_span(nonce: &str, task: &str, round: u32) -> tracing::Span {
    span!(
        Level::INFO,
        "task",
        nonce = %nonce,
        task = %task,
        round = round,
    )
}

pub fn log_phase_start(nonce: &str, phase: &str) {
    info!(nonce = %nonce, phase = %phase, "Phase started");
}

pub fn log_phase_complete(nonce: &str, phase: &str, elapsed_ms: u64) {
    info!(
        nonce = %nonce,
        phase = %phase,
        elapsed_ms = elapsed_ms,
        "Phase completed"
    );
}

/// Log a phase failure. The error text is redacted first.
pub fn log_phase_error(nonce: &str, phase: &str, error: &str, elapsed_ms: u64) {
    let sanitized = redact_error_message(error);
    error!(
        nonce = %nonce,
        phase = %phase,
        elapsed_ms = elapsed_ms,
        error = %sanitized,
        "Phase failed"
    );
}
