//! Pipeline behaviour against fake collaborators.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::json;

use pagesmith_generator::{ContentGenerator, GeneratedArtifact, GenerationRequest};
use pagesmith_orchestrator::{
    BackoffPolicy, CallbackNotifier, HttpNotifier, NotificationReceipt, PipelineSettings,
    TaskOrchestrator,
};
use pagesmith_publisher::{
    CreatedRepository, FileSet, PublishReceipt, PublisherError, RepositoryPublisher,
};
use pagesmith_status::{StatusStore, StatusTable};
use pagesmith_utils::error::{GeneratorError, NotifyError};
use pagesmith_utils::types::{
    NotificationPayload, TaskDescription, TaskStatus, TaskStatusRecord,
};

const OWNER: &str = "octo";

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

#[derive(Clone, Copy)]
enum Reply {
    Page,
    Short,
    Fail,
}

struct FakeGenerator {
    reply: Reply,
    calls: AtomicUsize,
}

impl FakeGenerator {
    fn new(reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            reply,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentGenerator for FakeGenerator {
    async fn generate_solution(
        &self,
        request: &GenerationRequest,
    ) -> Result<GeneratedArtifact, GeneratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.reply {
            Reply::Page => Ok(GeneratedArtifact::from_llm(
                format!(
                    "<!DOCTYPE html>\n<html><body><h1>{}</h1>{}</body></html>",
                    request.task_id,
                    "<p>generated</p>".repeat(20)
                ),
                "fake-model",
            )),
            Reply::Short => Ok(GeneratedArtifact::from_llm("<p>hi</p>", "fake-model")),
            Reply::Fail => Err(GeneratorError::InsufficientOutput {
                length: 0,
                minimum: 200,
            }),
        }
    }

    fn name(&self) -> &str {
        "fake"
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Exists(String),
    Create(String),
    Publish {
        name: String,
        message: String,
        files: Vec<(String, String)>,
        /// Paths that already existed and were updated in place
        updated: Vec<String>,
    },
    Hosting(String),
}

#[derive(Default)]
struct FakePublisher {
    calls: Mutex<Vec<Call>>,
    repos: Mutex<HashSet<String>>,
    files: Mutex<HashSet<(String, String)>>,
    always_taken: bool,
    fail_hosting: bool,
    fail_publish: bool,
}

impl FakePublisher {
    fn with_repo(self, name: &str) -> Self {
        self.repos.lock().unwrap().insert(name.to_string());
        self
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn created(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Create(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    fn publishes(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Publish { .. }))
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl RepositoryPublisher for FakePublisher {
    async fn exists(&self, name: &str) -> Result<bool, PublisherError> {
        self.record(Call::Exists(name.to_string()));
        Ok(self.repos.lock().unwrap().contains(name))
    }

    async fn create(
        &self,
        name: &str,
        _description: &str,
    ) -> Result<CreatedRepository, PublisherError> {
        self.record(Call::Create(name.to_string()));
        let mut repos = self.repos.lock().unwrap();
        if self.always_taken || repos.contains(name) {
            return Err(PublisherError::NameTaken {
                name: name.to_string(),
            });
        }
        repos.insert(name.to_string());
        Ok(CreatedRepository {
            repo_url: self.repo_url(name),
            clone_url: format!("https://github.com/{OWNER}/{name}.git"),
            full_name: format!("{OWNER}/{name}"),
        })
    }

    async fn publish(
        &self,
        name: &str,
        files: &FileSet,
        message: &str,
        _branch: &str,
    ) -> Result<PublishReceipt, PublisherError> {
        let mut stored = self.files.lock().unwrap();
        let updated = files
            .paths()
            .into_iter()
            .filter(|path| stored.contains(&(name.to_string(), (*path).to_string())))
            .map(str::to_string)
            .collect();
        self.record(Call::Publish {
            name: name.to_string(),
            message: message.to_string(),
            files: files
                .iter()
                .map(|(p, c)| (p.to_string(), c.to_string()))
                .collect(),
            updated,
        });

        if self.fail_publish {
            return Err(PublisherError::Api {
                operation: "PUT index.html".to_string(),
                status: 403,
                body: "forbidden".to_string(),
            });
        }
        for path in files.paths() {
            stored.insert((name.to_string(), path.to_string()));
        }
        Ok(PublishReceipt {
            commit_ref: format!("sha-{}", self.publishes().len()),
            files_published: files.paths().into_iter().map(str::to_string).collect(),
        })
    }

    async fn enable_hosting(&self, name: &str, _branch: &str) -> Result<String, PublisherError> {
        self.record(Call::Hosting(name.to_string()));
        if self.fail_hosting {
            return Err(PublisherError::Api {
                operation: "enable pages".to_string(),
                status: 500,
                body: "boom".to_string(),
            });
        }
        Ok(self.hosting_url(name))
    }

    fn repo_url(&self, name: &str) -> String {
        format!("https://github.com/{OWNER}/{name}")
    }

    fn hosting_url(&self, name: &str) -> String {
        format!("https://{OWNER}.github.io/{name}/")
    }
}

struct FakeNotifier {
    delay: Duration,
    deliver: bool,
    sent: Mutex<Vec<(String, NotificationPayload)>>,
}

impl FakeNotifier {
    fn instant() -> Arc<Self> {
        Self::new(Duration::ZERO, true)
    }

    fn new(delay: Duration, deliver: bool) -> Arc<Self> {
        Arc::new(Self {
            delay,
            deliver,
            sent: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl CallbackNotifier for FakeNotifier {
    async fn notify(
        &self,
        url: &str,
        payload: &NotificationPayload,
    ) -> Result<NotificationReceipt, NotifyError> {
        self.sent
            .lock()
            .unwrap()
            .push((url.to_string(), payload.clone()));
        tokio::time::sleep(self.delay).await;
        let elapsed_ms = self.delay.as_millis() as u64;
        if self.deliver {
            Ok(NotificationReceipt {
                attempts: 1,
                elapsed_ms,
            })
        } else {
            Err(NotifyError::CeilingReached {
                attempts: 1,
                elapsed_ms,
            })
        }
    }
}

/// Status store that keeps every record it hands out.
#[derive(Default)]
struct RecordingStatus {
    table: StatusTable,
    history: Mutex<Vec<TaskStatusRecord>>,
}

impl RecordingStatus {
    fn history_for(&self, nonce: &str) -> Vec<TaskStatusRecord> {
        self.history
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.nonce == nonce)
            .cloned()
            .collect()
    }
}

impl StatusStore for RecordingStatus {
    fn update(&self, nonce: &str, status: TaskStatus, message: &str) -> TaskStatusRecord {
        let record = self.table.update(nonce, status, message);
        self.history.lock().unwrap().push(record.clone());
        record
    }

    fn get(&self, nonce: &str) -> Option<TaskStatusRecord> {
        self.table.get(nonce)
    }

    fn list_all(&self) -> Vec<TaskStatusRecord> {
        self.table.list_all()
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

struct Harness {
    generator: Arc<FakeGenerator>,
    publisher: Arc<FakePublisher>,
    notifier: Arc<FakeNotifier>,
    status: Arc<RecordingStatus>,
    orchestrator: TaskOrchestrator,
}

fn harness(reply: Reply, publisher: FakePublisher, notifier: Arc<FakeNotifier>) -> Harness {
    harness_with(reply, publisher, notifier, PipelineSettings::default())
}

fn harness_with(
    reply: Reply,
    publisher: FakePublisher,
    notifier: Arc<FakeNotifier>,
    settings: PipelineSettings,
) -> Harness {
    let generator = FakeGenerator::new(reply);
    let publisher = Arc::new(publisher);
    let status = Arc::new(RecordingStatus::default());
    let orchestrator = TaskOrchestrator::new(
        generator.clone(),
        publisher.clone(),
        notifier.clone(),
        status.clone(),
        settings,
    )
    .unwrap();
    Harness {
        generator,
        publisher,
        notifier,
        status,
        orchestrator,
    }
}

fn task(nonce: &str, round: u32) -> TaskDescription {
    TaskDescription {
        nonce: nonce.to_string(),
        task_id: "demo".to_string(),
        round,
        brief: "Show a greeting in #greeting".to_string(),
        attachments: Vec::new(),
        checks: vec![json!("Page has #greeting")],
        email: "alice@x.com".to_string(),
        evaluation_url: "https://evaluator.example.com/notify".to_string(),
    }
}

fn paths(call: &Call) -> Vec<&str> {
    match call {
        Call::Publish { files, .. } => files.iter().map(|(p, _)| p.as_str()).collect(),
        other => panic!("not a publish call: {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn round_one_publishes_and_completes() {
    let h = harness(Reply::Page, FakePublisher::default(), FakeNotifier::instant());

    let outcome = h.orchestrator.process_task_tracked(&task("n-1", 1)).await;
    let result = outcome.result;

    assert!(result.success, "pipeline failed: {:?}", result.error);
    assert_eq!(result.repo_url.as_deref(), Some("https://github.com/octo/tds-demo-alice"));
    assert_eq!(result.pages_url.as_deref(), Some("https://octo.github.io/tds-demo-alice/"));
    assert_eq!(result.commit_ref.as_deref(), Some("sha-1"));
    assert_eq!(result.round, Some(1));

    assert_eq!(h.publisher.created(), vec!["tds-demo-alice"]);
    let publishes = h.publisher.publishes();
    assert_eq!(publishes.len(), 1);
    assert_eq!(paths(&publishes[0]), vec!["index.html", "README.md", "LICENSE"]);
    if let Call::Publish { message, .. } = &publishes[0] {
        assert!(message.starts_with("Round 1: Show a greeting"));
    }
    assert!(h.publisher.calls().contains(&Call::Hosting("tds-demo-alice".to_string())));

    let record = h.status.get("n-1").unwrap();
    assert_eq!(record.status, TaskStatus::Completed);

    let receipt = outcome.notification.unwrap().outcome().await.unwrap();
    assert_eq!(receipt.attempts, 1);
    let sent = h.notifier.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    let (url, payload) = &sent[0];
    assert_eq!(url, "https://evaluator.example.com/notify");
    assert_eq!(payload.task, "demo");
    assert_eq!(payload.round, 1);
    assert_eq!(payload.nonce, "n-1");
    assert_eq!(payload.commit_sha, "sha-1");
    assert_eq!(payload.pages_url, "https://octo.github.io/tds-demo-alice/");
}

#[tokio::test]
async fn round_two_updates_the_round_one_repository() {
    let h = harness(Reply::Page, FakePublisher::default(), FakeNotifier::instant());

    let first = h.orchestrator.process_task(&task("n-1", 1)).await;
    let second = h.orchestrator.process_task(&task("n-2", 2)).await;

    assert!(first.success && second.success);
    assert_eq!(first.repo_url, second.repo_url);
    assert_eq!(h.publisher.created().len(), 1, "round 2 must not create");
    assert!(h.publisher.calls().contains(&Call::Exists("tds-demo-alice".to_string())));

    let publishes = h.publisher.publishes();
    assert_eq!(publishes.len(), 2);
    assert_eq!(
        paths(&publishes[1]),
        vec!["index.html", "README.md", "round2-updates.md"]
    );
    match &publishes[1] {
        Call::Publish { name, updated, message, .. } => {
            assert_eq!(name, "tds-demo-alice");
            assert_eq!(updated, &vec!["index.html".to_string(), "README.md".to_string()]);
            assert!(message.starts_with("Round 2: "));
        }
        other => panic!("unexpected call {other:?}"),
    }
    assert!(
        !paths(&publishes[0]).contains(&"round2-updates.md"),
        "round 2 notes never appear in round 1"
    );
}

#[tokio::test]
async fn overrunning_the_soft_budget_still_completes() {
    let settings = PipelineSettings {
        soft_budget: Duration::ZERO,
        ..PipelineSettings::default()
    };
    let h = harness_with(
        Reply::Page,
        FakePublisher::default(),
        FakeNotifier::instant(),
        settings,
    );

    let outcome = h.orchestrator.process_task_tracked(&task("n-slow", 1)).await;

    assert!(outcome.result.success, "pipeline failed: {:?}", outcome.result.error);
    assert!(outcome.result.error.is_none());
    assert_eq!(h.status.get("n-slow").unwrap().status, TaskStatus::Completed);
    assert!(outcome.notification.is_some(), "callback still goes out");
}

#[tokio::test]
async fn round_two_creates_a_missing_repository() {
    let h = harness(Reply::Page, FakePublisher::default(), FakeNotifier::instant());

    let result = h.orchestrator.process_task(&task("n-2", 2)).await;

    assert!(result.success, "pipeline failed: {:?}", result.error);
    assert_eq!(h.publisher.created(), vec!["tds-demo-alice"]);
    assert_eq!(h.publisher.calls()[0], Call::Exists("tds-demo-alice".to_string()));
}

#[tokio::test]
async fn taken_name_gets_a_suffix() {
    let publisher = FakePublisher::default().with_repo("tds-demo-alice");
    let h = harness(Reply::Page, publisher, FakeNotifier::instant());

    let result = h.orchestrator.process_task(&task("n-1", 1)).await;

    assert!(result.success);
    assert_eq!(h.publisher.created(), vec!["tds-demo-alice", "tds-demo-alice-2"]);
    assert_eq!(
        result.repo_url.as_deref(),
        Some("https://github.com/octo/tds-demo-alice-2")
    );
}

#[tokio::test]
async fn collision_retries_are_bounded() {
    let publisher = FakePublisher {
        always_taken: true,
        ..FakePublisher::default()
    };
    let h = harness(Reply::Page, publisher, FakeNotifier::instant());

    let outcome = h.orchestrator.process_task_tracked(&task("n-1", 1)).await;

    assert!(!outcome.result.success);
    assert!(outcome.notification.is_none());
    assert_eq!(
        h.publisher.created(),
        vec!["tds-demo-alice", "tds-demo-alice-2", "tds-demo-alice-3"]
    );
    assert!(h.publisher.publishes().is_empty());
    assert!(outcome.result.error.unwrap().contains("3 attempts"));
    assert_eq!(h.status.get("n-1").unwrap().status, TaskStatus::Failed);
}

#[tokio::test]
async fn invalid_round_touches_no_collaborator() {
    let h = harness(Reply::Page, FakePublisher::default(), FakeNotifier::instant());

    for round in [0, 3, 42] {
        let nonce = format!("bad-{round}");
        let result = h.orchestrator.process_task(&task(&nonce, round)).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("Invalid round"));
        assert_eq!(h.status.get(&nonce).unwrap().status, TaskStatus::Failed);
    }

    assert_eq!(h.generator.calls(), 0);
    assert!(h.publisher.calls().is_empty());
    assert!(h.notifier.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn generator_failure_falls_back_to_template() {
    for reply in [Reply::Fail, Reply::Short] {
        let h = harness(reply, FakePublisher::default(), FakeNotifier::instant());

        let result = h.orchestrator.process_task(&task("n-1", 1)).await;

        assert!(result.success, "pipeline failed: {:?}", result.error);
        let publishes = h.publisher.publishes();
        let Call::Publish { files, .. } = &publishes[0] else {
            panic!("expected a publish call");
        };
        let (path, html) = &files[0];
        assert_eq!(path, "index.html");
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains(r#"id="greeting""#), "fallback keeps required ids");
        assert!(html.chars().count() >= 100);
    }
}

#[tokio::test]
async fn double_generation_failure_fails_the_task() {
    let h = harness(Reply::Fail, FakePublisher::default(), FakeNotifier::instant());
    let orchestrator = h.orchestrator.with_fallback(FakeGenerator::new(Reply::Fail));

    let result = orchestrator.process_task(&task("n-1", 1)).await;

    assert!(!result.success);
    assert!(result.error.unwrap().starts_with("Generation failed"));
    assert!(h.publisher.calls().is_empty());
}

#[tokio::test]
async fn hosting_failure_is_not_fatal() {
    let publisher = FakePublisher {
        fail_hosting: true,
        ..FakePublisher::default()
    };
    let h = harness(Reply::Page, publisher, FakeNotifier::instant());

    let result = h.orchestrator.process_task(&task("n-1", 1)).await;

    assert!(result.success);
    assert_eq!(result.pages_url.as_deref(), Some("https://octo.github.io/tds-demo-alice/"));
}

#[tokio::test]
async fn publish_failure_is_fatal() {
    let publisher = FakePublisher {
        fail_publish: true,
        ..FakePublisher::default()
    };
    let h = harness(Reply::Page, publisher, FakeNotifier::instant());

    let result = h.orchestrator.process_task(&task("n-1", 1)).await;

    assert!(!result.success);
    assert!(result.error.unwrap().contains("HTTP 403"));
    assert!(
        !h.publisher.calls().iter().any(|c| matches!(c, Call::Hosting(_))),
        "hosting is not attempted after a failed publish"
    );
    assert!(h.notifier.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn notification_does_not_delay_the_result() {
    let notifier = FakeNotifier::new(Duration::from_secs(30), false);
    let h = harness(Reply::Page, FakePublisher::default(), notifier);

    let started = Instant::now();
    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        h.orchestrator.process_task_tracked(&task("n-1", 1)),
    )
    .await
    .expect("pipeline must not wait for the callback");

    assert!(outcome.result.success);
    assert!(started.elapsed() < Duration::from_secs(5));
    let handle = outcome.notification.unwrap();
    assert!(!handle.is_finished());
    assert_eq!(h.status.get("n-1").unwrap().status, TaskStatus::Completed);
}

#[tokio::test]
async fn status_moves_forward_and_ends_once() {
    let h = harness(Reply::Page, FakePublisher::default(), FakeNotifier::instant());

    h.orchestrator.process_task(&task("n-1", 1)).await;

    let history = h.status.history_for("n-1");
    assert!(history.len() >= 5, "every phase should be recorded");
    for pair in history.windows(2) {
        assert!(pair[1].updated_at >= pair[0].updated_at);
        assert_eq!(pair[1].created_at, pair[0].created_at);
    }
    let terminal: Vec<_> = history.iter().filter(|r| r.status.is_terminal()).collect();
    assert_eq!(terminal.len(), 1);
    assert_eq!(history.last().unwrap().status, TaskStatus::Completed);
    assert!(
        history[..history.len() - 1]
            .iter()
            .all(|r| r.status == TaskStatus::Processing)
    );
}

#[tokio::test]
async fn concurrent_tasks_do_not_interfere() {
    let h = harness(Reply::Page, FakePublisher::default(), FakeNotifier::instant());
    let first = task("n-a", 1);
    let mut other = task("n-b", 1);
    other.task_id = "other".to_string();

    let (a, b) = tokio::join!(
        h.orchestrator.process_task(&first),
        h.orchestrator.process_task(&other)
    );

    assert!(a.success && b.success);
    assert_ne!(a.repo_url, b.repo_url);
    assert_eq!(h.status.list_all().len(), 2);
}

#[tokio::test]
async fn http_notifier_receives_pipeline_payload() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/notify")
        .match_body(mockito::Matcher::PartialJson(json!({
            "email": "alice@x.com",
            "task": "demo",
            "round": 1,
            "nonce": "n-1",
            "repo_url": "https://github.com/octo/tds-demo-alice",
            "commit_sha": "sha-1",
            "pages_url": "https://octo.github.io/tds-demo-alice/"
        })))
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let notifier = HttpNotifier::new(
        BackoffPolicy {
            initial_delay: Duration::from_millis(10),
            multiplier: 2.0,
            max_delay: Duration::from_millis(50),
            ceiling: Duration::from_secs(2),
        },
        Duration::from_secs(5),
    )
    .unwrap();
    let orchestrator = TaskOrchestrator::new(
        FakeGenerator::new(Reply::Page),
        Arc::new(FakePublisher::default()),
        Arc::new(notifier),
        StatusTable::shared(),
        PipelineSettings::default(),
    )
    .unwrap();

    let mut t = task("n-1", 1);
    t.evaluation_url = format!("{}/notify", server.url());
    let outcome = orchestrator.process_task_tracked(&t).await;

    assert!(outcome.result.success);
    outcome.notification.unwrap().outcome().await.unwrap();
    mock.assert_async().await;
}
