//! Route handlers for the front door

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use pagesmith_utils::request::TaskRequest;
use pagesmith_utils::types::TaskStatusRecord;

use super::AppState;

#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub service: &'static str,
    pub version: &'static str,
    pub description: &'static str,
    pub endpoints: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub github_configured: bool,
    pub llm_configured: bool,
    pub secret_configured: bool,
    pub model: String,
    pub tasks_tracked: usize,
}

/// Acknowledgement for `POST /task`.
///
/// `status` is `accepted` when the pipeline was started and `rejected` when
/// the body failed validation.
#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct TaskListResponse {
    pub total: usize,
    pub tasks: Vec<TaskStatusRecord>,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

pub async fn service_info() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        service: "pagesmith",
        version: env!("CARGO_PKG_VERSION"),
        description: "Builds single-page apps from task briefs and publishes them to GitHub Pages",
        endpoints: vec![
            "GET /",
            "GET /health",
            "POST /task",
            "GET /status/{nonce}",
            "GET /tasks",
        ],
    })
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        github_configured: state.github_configured,
        llm_configured: state.llm_configured,
        secret_configured: state.secret_configured(),
        model: state.model.clone(),
        tasks_tracked: state.handle.list_tasks().len(),
    })
}

/// Whether the body carries the configured shared secret.
///
/// With no secret configured nothing is accepted.
fn secret_accepted(state: &AppState, body: &Value) -> bool {
    let Some(expected) = state.shared_secret.as_deref() else {
        return false;
    };
    let probe = TaskRequest {
        secret: body
            .get("secret")
            .and_then(Value::as_str)
            .map(str::to_string),
        ..TaskRequest::default()
    };
    probe.secret_matches(expected)
}

pub async fn submit_task(State(state): State<AppState>, body: Bytes) -> Response {
    // Parsed from raw bytes so a missing or wrong content-type is tolerated.
    let value: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                format!("Request body is not valid JSON: {e}"),
            );
        }
    };

    let nonce_hint = TaskRequest::nonce_hint(&value);

    if !secret_accepted(&state, &value) {
        warn!(
            nonce = nonce_hint.as_deref().unwrap_or(""),
            "Task refused: invalid secret"
        );
        return error_response(StatusCode::UNAUTHORIZED, "Invalid secret");
    }

    let timestamp = Utc::now().to_rfc3339();

    match TaskRequest::from_json(value).and_then(|request| request.validate()) {
        Ok(task) => {
            info!(
                nonce = %task.nonce,
                task = %task.task_id,
                round = task.round,
                "Task accepted"
            );
            let nonce = task.nonce.clone();
            let handle = state.handle.clone();
            tokio::spawn(async move {
                handle.process_task(&task).await;
            });

            Json(AcceptedResponse {
                status: "accepted".to_string(),
                message: "Task received and processing started".to_string(),
                nonce: Some(nonce),
                timestamp,
            })
            .into_response()
        }
        Err(err) => {
            warn!(
                nonce = nonce_hint.as_deref().unwrap_or(""),
                error = %err,
                "Task request failed validation"
            );
            if let Some(nonce) = &nonce_hint {
                state.handle.record_rejection(nonce, &format!("Error: {err}"));
            }

            Json(AcceptedResponse {
                status: "rejected".to_string(),
                message: err.to_string(),
                nonce: nonce_hint,
                timestamp,
            })
            .into_response()
        }
    }
}

pub async fn task_status(State(state): State<AppState>, Path(nonce): Path<String>) -> Response {
    match state.handle.status(&nonce) {
        Some(record) => Json(record).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Task not found", "nonce": nonce })),
        )
            .into_response(),
    }
}

pub async fn list_tasks(State(state): State<AppState>) -> Json<TaskListResponse> {
    let tasks = state.handle.list_tasks();
    Json(TaskListResponse {
        total: tasks.len(),
        tasks,
    })
}
