//! The task pipeline
//!
//! `generate → name → create/locate → publish → host → notify → finalize`,
//! strictly in that order for one task. Every phase start is written to the
//! status store and exactly one terminal status is written per call.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{Datelike, Utc};
use tracing::{Instrument, info, warn};

use pagesmith_config::{Config, GitHubConfig, PipelineConfig};
use pagesmith_generator::{
    ContentGenerator, DocContext, DocRenderer, FallbackRenderer, GeneratedArtifact,
    GenerationRequest, commit_message,
};
use pagesmith_publisher::{FileSet, PublisherError, RepositoryPublisher};
use pagesmith_status::StatusStore;
use pagesmith_utils::error::{GeneratorError, PipelineError};
use pagesmith_utils::logging::{log_phase_complete, log_phase_error, log_phase_start, task_span};
use pagesmith_utils::redaction::redact_error_message;
use pagesmith_utils::types::{
    NotificationPayload, PipelineResult, Round, TaskDescription, TaskStatus,
};

use crate::naming::{candidate_name, repository_name};
use crate::notifier::{CallbackNotifier, NotificationHandle};
use crate::retry::{CollisionPolicy, NextStep, RetryPolicy};

pub const INDEX_FILE: &str = "index.html";
pub const README_FILE: &str = "README.md";
pub const LICENSE_FILE: &str = "LICENSE";
pub const ROUND2_FILE: &str = "round2-updates.md";

/// Pipeline knobs, usually taken from `[pipeline]` and `[github]`.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub soft_budget: Duration,
    /// Fraction of `soft_budget` after which a warning is logged
    pub budget_warning_ratio: f64,
    /// Artifacts shorter than this are replaced by the fallback
    pub min_artifact_chars: usize,
    pub max_create_attempts: u32,
    pub repo_prefix: String,
    pub branch: String,
    pub license_holder: String,
}

impl PipelineSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::from_sections(&config.pipeline, &config.github)
    }

    #[must_use]
    pub fn from_sections(pipeline: &PipelineConfig, github: &GitHubConfig) -> Self {
        Self {
            soft_budget: pipeline.soft_budget(),
            budget_warning_ratio: pipeline.budget_warning_ratio,
            min_artifact_chars: pipeline.min_artifact_chars,
            max_create_attempts: pipeline.max_create_attempts,
            repo_prefix: pipeline.repo_prefix.clone(),
            branch: github.branch.clone(),
            license_holder: pipeline.license_holder.clone(),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_sections(&PipelineConfig::default(), &GitHubConfig::default())
    }
}

/// Result of a pipeline run plus the notification it started, if any.
#[derive(Debug)]
pub struct TaskOutcome {
    pub result: PipelineResult,
    pub notification: Option<NotificationHandle>,
}

struct Published {
    repo_url: String,
    pages_url: String,
    commit_ref: String,
    round: Round,
    notification: NotificationHandle,
}

/// Warns once when a run nears its soft budget and once when it exceeds it.
struct BudgetWatch {
    started: Instant,
    budget: Duration,
    warn_at: Duration,
    warned_near: bool,
    warned_over: bool,
}

impl BudgetWatch {
    fn new(started: Instant, settings: &PipelineSettings) -> Self {
        let ratio = if settings.budget_warning_ratio.is_finite() {
            settings.budget_warning_ratio.clamp(0.0, 1.0)
        } else {
            1.0
        };
        Self {
            started,
            budget: settings.soft_budget,
            warn_at: settings.soft_budget.mul_f64(ratio),
            warned_near: false,
            warned_over: false,
        }
    }

    fn check(&mut self, phase: &str) {
        let elapsed = self.started.elapsed();
        if elapsed >= self.budget && !self.warned_over {
            self.warned_over = true;
            self.warned_near = true;
            warn!(
                phase,
                elapsed_ms = duration_ms(elapsed),
                budget_ms = duration_ms(self.budget),
                "Pipeline exceeded its soft time budget"
            );
        } else if elapsed >= self.warn_at && !self.warned_near {
            self.warned_near = true;
            warn!(
                phase,
                elapsed_ms = duration_ms(elapsed),
                budget_ms = duration_ms(self.budget),
                "Pipeline is approaching its soft time budget"
            );
        }
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Drives one task from brief to published, hosted and notified.
///
/// Collaborators are injected so tests can substitute fakes. Use
/// [`OrchestratorHandle`](crate::OrchestratorHandle) to build one from
/// configuration.
pub struct TaskOrchestrator {
    generator: Arc<dyn ContentGenerator>,
    fallback: Arc<dyn ContentGenerator>,
    publisher: Arc<dyn RepositoryPublisher>,
    notifier: Arc<dyn CallbackNotifier>,
    status: Arc<dyn StatusStore>,
    docs: DocRenderer,
    settings: PipelineSettings,
}

impl TaskOrchestrator {
    /// # Errors
    ///
    /// Returns `GeneratorError::Template` if the embedded templates are invalid.
    pub fn new(
        generator: Arc<dyn ContentGenerator>,
        publisher: Arc<dyn RepositoryPublisher>,
        notifier: Arc<dyn CallbackNotifier>,
        status: Arc<dyn StatusStore>,
        settings: PipelineSettings,
    ) -> Result<Self, GeneratorError> {
        Ok(Self {
            generator,
            fallback: Arc::new(FallbackRenderer::new()?),
            publisher,
            notifier,
            status,
            docs: DocRenderer::new(settings.license_holder.clone())?,
            settings,
        })
    }

    /// Replace the template fallback generator.
    #[must_use]
    pub fn with_fallback(mut self, fallback: Arc<dyn ContentGenerator>) -> Self {
        self.fallback = fallback;
        self
    }

    #[must_use]
    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    #[must_use]
    pub fn status_store(&self) -> Arc<dyn StatusStore> {
        Arc::clone(&self.status)
    }

    /// Run the pipeline and detach the notification.
    pub async fn process_task(&self, task: &TaskDescription) -> PipelineResult {
        self.process_task_tracked(task).await.result
    }

    /// Run the pipeline and hand back the notification handle.
    ///
    /// Never fails: errors become a failed status record and a failed result.
    pub async fn process_task_tracked(&self, task: &TaskDescription) -> TaskOutcome {
        let span = task_span(&task.nonce, &task.task_id, task.round);
        async {
            let started = Instant::now();
            info!("Task processing started");

            match self.run(task, started).await {
                Ok(published) => {
                    let elapsed_ms = duration_ms(started.elapsed());
                    self.status.update(
                        &task.nonce,
                        TaskStatus::Completed,
                        &format!(
                            "Completed in {:.1}s: {}",
                            elapsed_ms as f64 / 1000.0,
                            published.pages_url
                        ),
                    );
                    info!(
                        elapsed_ms,
                        repo_url = %published.repo_url,
                        pages_url = %published.pages_url,
                        "Task completed"
                    );
                    TaskOutcome {
                        result: PipelineResult::succeeded(
                            published.repo_url,
                            published.pages_url,
                            published.commit_ref,
                            published.round,
                            elapsed_ms,
                        ),
                        notification: Some(published.notification),
                    }
                }
                Err(err) => {
                    let elapsed_ms = duration_ms(started.elapsed());
                    let message = redact_error_message(&err.to_string());
                    self.status
                        .update(&task.nonce, TaskStatus::Failed, &format!("Error: {message}"));
                    warn!(elapsed_ms, error = %message, "Task failed");
                    TaskOutcome {
                        result: PipelineResult::failed(message, elapsed_ms),
                        notification: None,
                    }
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run(&self, task: &TaskDescription, started: Instant) -> Result<Published, PipelineError> {
        let mut budget = BudgetWatch::new(started, &self.settings);

        self.enter(task, "validate", "Validating task");
        let round = Round::try_from(task.round)
            .map_err(|invalid| PipelineError::InvalidRound { round: invalid.0 })?;

        self.enter(task, "generate", &format!("Generating solution (round {round})"));
        let artifact = self.phase(task, "generate", self.generate(task)).await?;
        budget.check("generate");

        let base_name = repository_name(&self.settings.repo_prefix, &task.task_id, &task.email);
        info!(repo = %base_name, "Resolved repository name");

        let (name, repo_url) = match round {
            Round::One => {
                self.enter(task, "repository", &format!("Creating repository {base_name}"));
                self.phase(task, "repository", self.create_repository(&base_name, task))
                    .await?
            }
            Round::Two => {
                self.enter(task, "repository", &format!("Locating repository {base_name}"));
                self.phase(task, "repository", self.locate_repository(&base_name, task))
                    .await?
            }
        };
        budget.check("repository");

        let pages_url = self.publisher.hosting_url(&name);
        self.enter(task, "publish", &format!("Publishing files to {name}"));
        let files = self.build_files(task, round, &artifact, &repo_url, &pages_url)?;
        let receipt = self
            .phase(task, "publish", async {
                self.publisher
                    .publish(
                        &name,
                        &files,
                        &commit_message(round.as_u32(), &task.brief),
                        &self.settings.branch,
                    )
                    .await
                    .map_err(PipelineError::Publish)
            })
            .await?;
        budget.check("publish");

        self.enter(task, "hosting", "Enabling GitHub Pages");
        let pages_url = match self.publisher.enable_hosting(&name, &self.settings.branch).await {
            Ok(url) => url,
            Err(err) => {
                warn!(
                    repo = %name,
                    error = %redact_error_message(&err.to_string()),
                    "Enabling hosting failed, reporting the derived URL"
                );
                pages_url
            }
        };
        budget.check("hosting");

        self.enter(task, "notify", "Submitting to evaluation");
        let notification = NotificationHandle::spawn(
            Arc::clone(&self.notifier),
            task.evaluation_url.clone(),
            NotificationPayload {
                email: task.email.clone(),
                task: task.task_id.clone(),
                round: round.as_u32(),
                nonce: task.nonce.clone(),
                repo_url: repo_url.clone(),
                commit_sha: receipt.commit_ref.clone(),
                pages_url: pages_url.clone(),
            },
        );
        budget.check("notify");

        Ok(Published {
            repo_url,
            pages_url,
            commit_ref: receipt.commit_ref,
            round,
            notification,
        })
    }

    fn enter(&self, task: &TaskDescription, phase: &str, message: &str) {
        log_phase_start(&task.nonce, phase);
        self.status.update(&task.nonce, TaskStatus::Processing, message);
    }

    /// Await one phase, logging its completion or failure.
    async fn phase<T>(
        &self,
        task: &TaskDescription,
        name: &str,
        fut: impl Future<Output = Result<T, PipelineError>>,
    ) -> Result<T, PipelineError> {
        let started = Instant::now();
        let outcome = fut.await;
        let elapsed_ms = duration_ms(started.elapsed());
        match &outcome {
            Ok(_) => log_phase_complete(&task.nonce, name, elapsed_ms),
            Err(err) => log_phase_error(&task.nonce, name, &err.to_string(), elapsed_ms),
        }
        outcome
    }

    async fn generate(&self, task: &TaskDescription) -> Result<GeneratedArtifact, PipelineError> {
        let request = GenerationRequest::from_task(task);

        match self.generator.generate_solution(&request).await {
            Ok(artifact) if artifact.char_len() >= self.settings.min_artifact_chars => {
                return Ok(artifact);
            }
            Ok(artifact) => warn!(
                generator = self.generator.name(),
                chars = artifact.char_len(),
                minimum = self.settings.min_artifact_chars,
                "Generated artifact too short, using fallback"
            ),
            Err(err) => warn!(
                generator = self.generator.name(),
                error = %redact_error_message(&err.to_string()),
                "Generation failed, using fallback"
            ),
        }

        let artifact = self.fallback.generate_solution(&request).await?;
        info!(
            generator = self.fallback.name(),
            chars = artifact.char_len(),
            "Fallback artifact ready"
        );
        Ok(artifact)
    }

    /// Create `base`, or `base-2`, `base-3`... while the name is taken.
    async fn create_repository(
        &self,
        base: &str,
        task: &TaskDescription,
    ) -> Result<(String, String), PipelineError> {
        let policy = CollisionPolicy::new(self.settings.max_create_attempts);
        let description = format!("TDS Project: {}", task.task_id);
        let started = Instant::now();
        let mut attempt = 1;

        loop {
            let name = candidate_name(base, attempt);
            match self.publisher.create(&name, &description).await {
                Ok(created) => {
                    info!(repo = %name, attempt, "Repository created");
                    return Ok((name, created.repo_url));
                }
                Err(PublisherError::NameTaken { .. }) => {
                    match policy.next(attempt, started.elapsed()) {
                        NextStep::RetryAfter(delay) => {
                            warn!(repo = %name, attempt, "Repository name taken, trying a suffix");
                            if !delay.is_zero() {
                                tokio::time::sleep(delay).await;
                            }
                            attempt += 1;
                        }
                        NextStep::GiveUp => {
                            return Err(PipelineError::NameCollisionExhausted {
                                name: base.to_string(),
                                attempts: attempt,
                            });
                        }
                    }
                }
                Err(err) => return Err(PipelineError::RepositoryCreation(err)),
            }
        }
    }

    /// Reuse the round-1 repository, creating it if it is missing.
    async fn locate_repository(
        &self,
        name: &str,
        task: &TaskDescription,
    ) -> Result<(String, String), PipelineError> {
        let exists = self
            .publisher
            .exists(name)
            .await
            .map_err(PipelineError::RepositoryLookup)?;

        if exists {
            info!(repo = %name, "Round 2 reusing existing repository");
            Ok((name.to_string(), self.publisher.repo_url(name)))
        } else {
            warn!(repo = %name, "Round 2 repository missing, creating it");
            self.create_repository(name, task).await
        }
    }

    fn build_files(
        &self,
        task: &TaskDescription,
        round: Round,
        artifact: &GeneratedArtifact,
        repo_url: &str,
        pages_url: &str,
    ) -> Result<FileSet, PipelineError> {
        let ctx = DocContext::new(task, repo_url, pages_url);
        let mut files = FileSet::new();
        files.insert(INDEX_FILE, artifact.html.as_str());
        files.insert(README_FILE, self.docs.readme(&ctx)?);
        match round {
            Round::One => files.insert(LICENSE_FILE, self.docs.license(Utc::now().year())?),
            Round::Two => files.insert(ROUND2_FILE, self.docs.round2_notes(&ctx)?),
        }
        Ok(files)
    }
}
