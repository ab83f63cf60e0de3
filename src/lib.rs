//! pagesmith - turns task briefs into single-page apps hosted on GitHub Pages
//!
//! A task arrives as JSON (over HTTP or from a file), an LLM writes the page,
//! the page and its documentation are committed to a GitHub repository,
//! Pages hosting is switched on and the caller's evaluation endpoint is told
//! where to look.
//!
//! pagesmith can be used in two ways:
//! - **CLI**: `pagesmith serve` runs the HTTP front door, `pagesmith run`
//!   processes a single task file
//! - **Library**: embed [`OrchestratorHandle`] or mount [`server::router`]
//!   in an existing axum application
//!
//! # Quick Start (CLI)
//!
//! ```bash
//! export GITHUB_TOKEN=ghp_...
//! export LLM_API_KEY=sk-...
//! export PAGESMITH_SECRET=let-me-in
//!
//! # Serve POST /task on 0.0.0.0:7860
//! pagesmith serve --github-username octo
//!
//! # Process one task without the server
//! pagesmith run task.json --wait-notify
//!
//! # Show what configuration is in effect and where it came from
//! pagesmith config
//! ```
//!
//! # Quick Start (Library)
//!
//! ```rust,no_run
//! use pagesmith::{CliArgs, Config, OrchestratorHandle};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::discover(&CliArgs::default())?;
//! let handle = OrchestratorHandle::from_config(&config)?;
//! let app = pagesmith::server::router(pagesmith::server::AppState::from_config(&config, handle));
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:7860").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Crate Layout
//!
//! The pipeline lives in the `pagesmith-*` workspace crates; this crate is
//! the outer shell:
//!
//! - [`cli`] - argument parsing, command dispatch, error reporting
//! - [`server`] - the axum front door (`/`, `/health`, `/task`, `/status/{nonce}`, `/tasks`)

pub mod cli;
pub mod server;

pub use pagesmith_config::{CliArgs, Config, ConfigBuilder, ConfigSource};
pub use pagesmith_orchestrator::{OrchestratorHandle, PipelineSettings, TaskOrchestrator};
pub use pagesmith_utils::error::{PagesmithError, UserFriendlyError};
pub use pagesmith_utils::exit_codes::ExitCode;
pub use pagesmith_utils::request::TaskRequest;
pub use pagesmith_utils::types::{
    PipelineResult, Round, TaskDescription, TaskStatus, TaskStatusRecord,
};
