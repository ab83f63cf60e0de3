//! HTTP front door
//!
//! Accepts task submissions and exposes the status table. Submissions are
//! acknowledged immediately; the pipeline runs on a spawned task.
//!
//! | Route | Purpose |
//! |-------|---------|
//! | `GET /` | service description |
//! | `GET /health` | readiness and which credentials are configured |
//! | `POST /task` | submit a task (shared-secret protected) |
//! | `GET /status/{nonce}` | one status record |
//! | `GET /tasks` | every status record |

mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use pagesmith_config::Config;
use pagesmith_orchestrator::OrchestratorHandle;

pub use routes::{AcceptedResponse, HealthResponse, ServiceInfo, TaskListResponse};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub(crate) handle: OrchestratorHandle,
    pub(crate) shared_secret: Option<Arc<str>>,
    pub(crate) github_configured: bool,
    pub(crate) llm_configured: bool,
    pub(crate) model: String,
}

impl AppState {
    /// State for a server whose pipeline was wired from `config`.
    #[must_use]
    pub fn from_config(config: &Config, handle: OrchestratorHandle) -> Self {
        Self {
            handle,
            shared_secret: config
                .secrets
                .shared_secret
                .as_deref()
                .filter(|s| !s.is_empty())
                .map(Arc::from),
            github_configured: config.github.username.is_some()
                && config.secrets.github_token.is_some(),
            llm_configured: config.secrets.llm_api_key.is_some(),
            model: config.llm.model.clone(),
        }
    }

    /// State around an existing handle, for embedding and tests.
    ///
    /// Credentials are reported as configured.
    #[must_use]
    pub fn new(handle: OrchestratorHandle, shared_secret: Option<&str>) -> Self {
        Self {
            handle,
            shared_secret: shared_secret.filter(|s| !s.is_empty()).map(Arc::from),
            github_configured: true,
            llm_configured: true,
            model: String::new(),
        }
    }

    #[must_use]
    pub fn secret_configured(&self) -> bool {
        self.shared_secret.is_some()
    }

    #[must_use]
    pub fn handle(&self) -> &OrchestratorHandle {
        &self.handle
    }
}

/// Build the front-door router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(routes::service_info))
        .route("/health", get(routes::health))
        .route("/task", post(routes::submit_task))
        .route("/status/{nonce}", get(routes::task_status))
        .route("/tasks", get(routes::list_tasks))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `host:port` and serve until Ctrl-C.
pub async fn serve(host: &str, port: u16, state: AppState) -> Result<()> {
    let addr = format!("{host}:{port}");
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    let local: SocketAddr = listener
        .local_addr()
        .context("Failed to read bound address")?;

    info!(%local, "pagesmith listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server terminated unexpectedly")?;

    info!("pagesmith stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler available; serve until the process is killed.
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
