//! `pagesmith serve`

use anyhow::Result;
use tracing::info;

use pagesmith_config::Config;
use pagesmith_orchestrator::OrchestratorHandle;

use crate::server::{self, AppState};

/// Wire the pipeline from `config` and serve the front door until Ctrl-C.
pub async fn execute_serve_command(config: &Config) -> Result<()> {
    let handle = OrchestratorHandle::from_config(config)?;
    let state = AppState::from_config(config, handle);

    if !state.secret_configured() {
        eprintln!(
            "⚠ {} is not set; every POST /task will be refused with 401",
            config.server.secret_env
        );
    }

    info!(
        model = %config.llm.model,
        github_user = config.github.username.as_deref().unwrap_or(""),
        "Pipeline ready"
    );
    server::serve(&config.server.host, config.server.port, state).await
}
