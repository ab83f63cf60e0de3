//! Orchestrator façade for external consumers.
//!
//! The CLI and the HTTP front door go through `OrchestratorHandle`; direct
//! `TaskOrchestrator` construction is for tests and embedding with custom
//! collaborators.

use std::sync::Arc;

use tracing::debug;

use pagesmith_config::Config;
use pagesmith_generator::LlmGenerator;
use pagesmith_llm::LlmBackend;
use pagesmith_publisher::GitHubPublisher;
use pagesmith_status::{StatusStore, StatusTable};
use pagesmith_utils::error::PagesmithError;
use pagesmith_utils::types::{PipelineResult, TaskDescription, TaskStatus, TaskStatusRecord};

use crate::notifier::HttpNotifier;
use crate::orchestrator::{PipelineSettings, TaskOrchestrator, TaskOutcome};

/// Cheaply cloneable entry point to the pipeline and its status table.
///
/// # Example
///
/// ```rust,no_run
/// use pagesmith_config::{CliArgs, Config};
/// use pagesmith_orchestrator::OrchestratorHandle;
///
/// # async fn demo(task: pagesmith_utils::TaskDescription) -> Result<(), Box<dyn std::error::Error>> {
/// let config = Config::discover(&CliArgs::default())?;
/// let handle = OrchestratorHandle::from_config(&config)?;
///
/// let result = handle.process_task(&task).await;
/// println!("success: {}", result.success);
/// println!("status: {:?}", handle.status(&task.nonce));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct OrchestratorHandle {
    orchestrator: Arc<TaskOrchestrator>,
    status: Arc<dyn StatusStore>,
}

impl OrchestratorHandle {
    /// Wire the OpenAI-compatible backend, GitHub publisher, HTTP notifier
    /// and an in-memory status table from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the LLM key, GitHub username or token is missing,
    /// or an HTTP client cannot be built.
    pub fn from_config(config: &Config) -> Result<Self, PagesmithError> {
        let backend: Arc<dyn LlmBackend> = Arc::from(pagesmith_llm::from_config(config)?);
        debug!(backend = backend.name(), model = %config.llm.model, "LLM backend ready");

        let generator = Arc::new(LlmGenerator::from_config(backend, config));
        let publisher = Arc::new(GitHubPublisher::from_config(config)?);
        let notifier = Arc::new(HttpNotifier::from_config(&config.notifier)?);
        let status: Arc<dyn StatusStore> = StatusTable::shared();

        let orchestrator = TaskOrchestrator::new(
            generator,
            publisher,
            notifier,
            status,
            PipelineSettings::from_config(config),
        )?;
        Ok(Self::from_orchestrator(orchestrator))
    }

    #[must_use]
    pub fn from_orchestrator(orchestrator: TaskOrchestrator) -> Self {
        let status = orchestrator.status_store();
        Self {
            orchestrator: Arc::new(orchestrator),
            status,
        }
    }

    /// Run one task; the callback is delivered in the background.
    pub async fn process_task(&self, task: &TaskDescription) -> PipelineResult {
        self.orchestrator.process_task(task).await
    }

    /// Run one task and keep the notification handle.
    pub async fn process_task_tracked(&self, task: &TaskDescription) -> TaskOutcome {
        self.orchestrator.process_task_tracked(task).await
    }

    #[must_use]
    pub fn status(&self, nonce: &str) -> Option<TaskStatusRecord> {
        self.status.get(nonce)
    }

    #[must_use]
    pub fn list_tasks(&self) -> Vec<TaskStatusRecord> {
        self.status.list_all()
    }

    /// Record a submission that was refused before reaching the pipeline.
    pub fn record_rejection(&self, nonce: &str, message: &str) -> TaskStatusRecord {
        self.status.update(nonce, TaskStatus::Failed, message)
    }

    #[must_use]
    pub fn settings(&self) -> &PipelineSettings {
        self.orchestrator.settings()
    }
}
