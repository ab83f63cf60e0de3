use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::redaction::redact_error_message;

/// Library-level error type with rich context and user-friendly reporting.
///
/// `PagesmithError` is what pagesmith library operations hand back to the
/// CLI and the HTTP front door. It provides:
/// - Detailed error information for programmatic handling
/// - User-friendly messages with context and suggestions
/// - Mapping to CLI exit codes for consistent error reporting
///
/// # Exit Code Mapping
///
/// | Exit Code | Error Type |
/// |-----------|------------|
/// | 2 | Configuration errors, LLM misconfiguration |
/// | 3 | Pipeline failures |
/// | 4 | Task request validation |
/// | 1 | Other errors |
///
/// # Example
///
/// ```rust
/// use pagesmith_utils::error::{ConfigError, PagesmithError};
/// use pagesmith_utils::ExitCode;
///
/// let err = PagesmithError::Config(ConfigError::MissingRequired("github.username".into()));
/// assert_eq!(err.to_exit_code(), ExitCode::CLI_ARGS);
/// assert!(err.display_for_user().contains("github.username"));
/// ```
///
/// Library code returns `PagesmithError` and does NOT call `std::process::exit()`.
#[derive(Error, Debug)]
pub enum PagesmithError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("LLM backend error: {0}")]
    Llm(#[from] LlmError),

    #[error("Content generation error: {0}")]
    Generator(#[from] GeneratorError),

    #[error("Repository publisher error: {0}")]
    Publisher(#[from] PublisherError),

    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait for providing user-friendly error reporting with context and suggestions
pub trait UserFriendlyError {
    /// Get a user-friendly error message
    fn user_message(&self) -> String;

    /// Get contextual information about the error
    fn context(&self) -> Option<String>;

    /// Get suggested actions to resolve the error
    fn suggestions(&self) -> Vec<String>;

    /// Get the error category for grouping similar errors
    fn category(&self) -> ErrorCategory;
}

/// Categories of errors for better organization and handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Validation,
    Generation,
    Repository,
    Notification,
    LlmIntegration,
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "Configuration"),
            Self::Validation => write!(f, "Validation"),
            Self::Generation => write!(f, "Content Generation"),
            Self::Repository => write!(f, "Repository"),
            Self::Notification => write!(f, "Notification"),
            Self::LlmIntegration => write!(f, "LLM Integration"),
            Self::Internal => write!(f, "Internal"),
        }
    }
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration file: {0}")]
    InvalidFile(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found at {path}")]
    NotFound { path: String },

    #[error("Configuration discovery failed: {reason}")]
    DiscoveryFailed { reason: String },

    #[error("Configuration validation failed: {error_count} errors")]
    ValidationFailed {
        errors: Vec<String>,
        error_count: usize,
    },
}

impl UserFriendlyError for ConfigError {
    fn user_message(&self) -> String {
        match self {
            Self::InvalidFile(reason) => {
                format!("Configuration file has invalid format: {reason}")
            }
            Self::MissingRequired(key) => {
                format!("Required configuration '{key}' is missing")
            }
            Self::InvalidValue { key, value } => {
                format!("Configuration '{key}' has invalid value: {value}")
            }
            Self::NotFound { path } => {
                format!("Configuration file not found: {path}")
            }
            Self::DiscoveryFailed { reason } => {
                format!("Failed to discover configuration: {reason}")
            }
            Self::ValidationFailed { errors, .. } => {
                format!(
                    "Configuration validation failed with {} errors: {}",
                    errors.len(),
                    errors.join(", ")
                )
            }
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::InvalidFile(_) => Some(
                "Configuration files are TOML with [server], [github], [llm], [pipeline] and [notifier] sections."
                    .to_string(),
            ),
            Self::MissingRequired(_) => {
                Some("Some values have no sensible default and must be provided.".to_string())
            }
            Self::InvalidValue { key, .. } => Some(format!(
                "The '{key}' option has range or format requirements."
            )),
            Self::NotFound { .. } => Some(
                "An explicit --config path was given but nothing exists there.".to_string(),
            ),
            Self::DiscoveryFailed { .. } => Some(
                "pagesmith looks for $PAGESMITH_HOME/config.toml, then .pagesmith/config.toml in parent directories."
                    .to_string(),
            ),
            Self::ValidationFailed { .. } => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::InvalidFile(_) => vec![
                "Check the file for TOML syntax errors".to_string(),
                "Run 'pagesmith config' to see the effective configuration".to_string(),
            ],
            Self::MissingRequired(key) => vec![
                format!("Add '{key}' to .pagesmith/config.toml"),
                "Or pass the matching CLI flag / environment variable".to_string(),
            ],
            Self::InvalidValue { key, .. } => {
                vec![format!("Correct the value of '{key}' and try again")]
            }
            Self::NotFound { path } => vec![
                format!("Create {path} or drop the --config flag"),
            ],
            Self::DiscoveryFailed { .. } => vec![
                "Pass --config <path> explicitly".to_string(),
            ],
            Self::ValidationFailed { errors, .. } => errors
                .iter()
                .map(|e| format!("Fix: {e}"))
                .collect(),
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Configuration
    }
}

/// A task request that could not be turned into a `TaskDescription`.
///
/// Collects every problem rather than stopping at the first one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid task request: {}", .issues.join("; "))]
pub struct ValidationError {
    pub issues: Vec<String>,
}

impl ValidationError {
    #[must_use]
    pub fn new(issues: Vec<String>) -> Self {
        Self { issues }
    }
}

impl UserFriendlyError for ValidationError {
    fn user_message(&self) -> String {
        format!(
            "The task request has {} problem(s): {}",
            self.issues.len(),
            self.issues.join("; ")
        )
    }

    fn context(&self) -> Option<String> {
        Some(
            "A task needs email, task, round, nonce, brief and evaluation_url.".to_string(),
        )
    }

    fn suggestions(&self) -> Vec<String> {
        vec!["Fix the listed fields and resubmit with a fresh nonce".to_string()]
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Validation
    }
}

/// LLM backend errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    /// Transport-level failure (HTTP connectivity, unreadable response)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Provider authentication failure (401, 403, missing API key)
    #[error("Provider authentication error: {0}")]
    ProviderAuth(String),

    /// Provider quota/rate limit exceeded (429)
    #[error("Provider quota exceeded: {0}")]
    ProviderQuota(String),

    /// Provider service outage (5xx errors)
    #[error("Provider outage: {0}")]
    ProviderOutage(String),

    /// Invocation timed out
    #[error("Timeout after {duration:?}")]
    Timeout { duration: Duration },

    /// Configuration error
    #[error("Misconfiguration: {0}")]
    Misconfiguration(String),
}

impl UserFriendlyError for LlmError {
    fn user_message(&self) -> String {
        match self {
            Self::Transport(msg) => format!("LLM transport error: {msg}"),
            Self::ProviderAuth(msg) => format!("LLM provider authentication failed: {msg}"),
            Self::ProviderQuota(msg) => format!("LLM provider quota exceeded: {msg}"),
            Self::ProviderOutage(msg) => format!("LLM provider service outage: {msg}"),
            Self::Timeout { duration } => {
                format!("LLM call timed out after {}s", duration.as_secs())
            }
            Self::Misconfiguration(msg) => format!("LLM backend misconfigured: {msg}"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::ProviderAuth(_) => {
                Some("The API key is read from the variable named by llm.api_key_env.".to_string())
            }
            Self::Timeout { .. } => {
                Some("Generation falls back to a template when the model is slow.".to_string())
            }
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::ProviderAuth(_) => vec!["Export LLM_API_KEY (or your llm.api_key_env)".to_string()],
            Self::ProviderQuota(_) => vec!["Wait and retry, or switch model with --model".to_string()],
            Self::Timeout { .. } => vec!["Raise llm.timeout_secs".to_string()],
            Self::Misconfiguration(_) => vec!["Check the [llm] section".to_string()],
            Self::Transport(_) | Self::ProviderOutage(_) => {
                vec!["Check llm.base_url and network connectivity".to_string()]
            }
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Misconfiguration(_) => ErrorCategory::Configuration,
            _ => ErrorCategory::LlmIntegration,
        }
    }
}

/// Content generator errors
#[derive(Error, Debug)]
pub enum GeneratorError {
    #[error("LLM generation failed: {0}")]
    Llm(#[from] LlmError),

    #[error("Generated content too short: {length} chars (minimum {minimum})")]
    InsufficientOutput { length: usize, minimum: usize },

    #[error("Template rendering failed: {0}")]
    Template(String),

    #[error("Attachment '{name}' could not be decoded: {reason}")]
    Attachment { name: String, reason: String },
}

impl UserFriendlyError for GeneratorError {
    fn user_message(&self) -> String {
        self.to_string()
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::Template(_) => {
                Some("The fallback template failed after the model also failed.".to_string())
            }
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Llm(inner) => inner.suggestions(),
            Self::InsufficientOutput { .. } => {
                vec!["Try a more capable model with --model".to_string()]
            }
            Self::Template(_) => vec!["Report this as a bug".to_string()],
            Self::Attachment { .. } => {
                vec!["Send attachments as data:<mime>;base64,<payload> URLs".to_string()]
            }
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Llm(inner) => inner.category(),
            _ => ErrorCategory::Generation,
        }
    }
}

/// Repository publisher errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublisherError {
    /// The remote rejected creation because the name is in use
    #[error("Repository name '{name}' is already taken")]
    NameTaken { name: String },

    /// The remote answered with an unexpected status
    #[error("{operation} failed with HTTP {status}: {body}")]
    Api {
        operation: String,
        status: u16,
        body: String,
    },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Misconfiguration: {0}")]
    Misconfiguration(String),
}

impl UserFriendlyError for PublisherError {
    fn user_message(&self) -> String {
        self.to_string()
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::Api { status: 401 | 403, .. } => Some(
                "The GitHub token is read from the variable named by github.token_env.".to_string(),
            ),
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::NameTaken { .. } => vec!["Delete the stale repository or change pipeline.repo_prefix".to_string()],
            Self::Api { status: 401 | 403, .. } => {
                vec!["Export GITHUB_TOKEN with the 'repo' scope".to_string()]
            }
            Self::Api { .. } | Self::Transport(_) => {
                vec!["Check github.api_base_url and GitHub status".to_string()]
            }
            Self::Misconfiguration(_) => vec!["Check the [github] section".to_string()],
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Misconfiguration(_) => ErrorCategory::Configuration,
            _ => ErrorCategory::Repository,
        }
    }
}

/// Callback notification errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    #[error("Callback transport error: {0}")]
    Transport(String),

    #[error("Callback answered HTTP {status}")]
    Rejected { status: u16 },

    #[error("Gave up after {attempts} attempts in {elapsed_ms}ms")]
    CeilingReached { attempts: u32, elapsed_ms: u64 },
}

impl UserFriendlyError for NotifyError {
    fn user_message(&self) -> String {
        format!("Evaluation callback was not delivered: {self}")
    }

    fn context(&self) -> Option<String> {
        Some("Callback delivery never changes the task's own outcome.".to_string())
    }

    fn suggestions(&self) -> Vec<String> {
        vec!["Check that evaluation_url accepts a JSON POST and answers 200".to_string()]
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Notification
    }
}

/// Unrecovered failures of the task pipeline.
///
/// These are flattened into the failed status record and the
/// `PipelineResult::error` text; they never escape `process_task`.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid round {round}: must be 1 or 2")]
    InvalidRound { round: u32 },

    #[error("Generation failed: {0}")]
    Generation(#[from] GeneratorError),

    #[error("Repository lookup failed: {0}")]
    RepositoryLookup(PublisherError),

    #[error("Repository creation failed: {0}")]
    RepositoryCreation(PublisherError),

    #[error("Repository name '{name}' still taken after {attempts} attempts")]
    NameCollisionExhausted { name: String, attempts: u32 },

    #[error("Publishing files failed: {0}")]
    Publish(PublisherError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl UserFriendlyError for PipelineError {
    fn user_message(&self) -> String {
        self.to_string()
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::Publish(_) => Some(
                "Files published before the failure stay in the repository; a round 2 run repairs them."
                    .to_string(),
            ),
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::InvalidRound { .. } => vec!["Submit round 1 or round 2".to_string()],
            Self::Generation(inner) => inner.suggestions(),
            Self::RepositoryLookup(inner)
            | Self::RepositoryCreation(inner)
            | Self::Publish(inner) => inner.suggestions(),
            Self::NameCollisionExhausted { .. } => {
                vec!["Raise pipeline.max_create_attempts or clean up old repositories".to_string()]
            }
            Self::Internal(_) => vec!["Re-run with --verbose and report the log".to_string()],
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidRound { .. } => ErrorCategory::Validation,
            Self::Generation(inner) => inner.category(),
            Self::RepositoryLookup(inner)
            | Self::RepositoryCreation(inner)
            | Self::Publish(inner) => inner.category(),
            Self::NameCollisionExhausted { .. } => ErrorCategory::Repository,
            Self::Internal(_) => ErrorCategory::Internal,
        }
    }
}

impl UserFriendlyError for PagesmithError {
    fn user_message(&self) -> String {
        match self {
            Self::Config(e) => e.user_message(),
            Self::Validation(e) => e.user_message(),
            Self::Llm(e) => e.user_message(),
            Self::Generator(e) => e.user_message(),
            Self::Publisher(e) => e.user_message(),
            Self::Notify(e) => e.user_message(),
            Self::Pipeline(e) => e.user_message(),
            Self::Io(e) => format!("IO error: {e}"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::Config(e) => e.context(),
            Self::Validation(e) => e.context(),
            Self::Llm(e) => e.context(),
            Self::Generator(e) => e.context(),
            Self::Publisher(e) => e.context(),
            Self::Notify(e) => e.context(),
            Self::Pipeline(e) => e.context(),
            Self::Io(_) => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Config(e) => e.suggestions(),
            Self::Validation(e) => e.suggestions(),
            Self::Llm(e) => e.suggestions(),
            Self::Generator(e) => e.suggestions(),
            Self::Publisher(e) => e.suggestions(),
            Self::Notify(e) => e.suggestions(),
            Self::Pipeline(e) => e.suggestions(),
            Self::Io(_) => vec!["Check file paths and permissions".to_string()],
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(e) => e.category(),
            Self::Validation(e) => e.category(),
            Self::Llm(e) => e.category(),
            Self::Generator(e) => e.category(),
            Self::Publisher(e) => e.category(),
            Self::Notify(e) => e.category(),
            Self::Pipeline(e) => e.category(),
            Self::Io(_) => ErrorCategory::Internal,
        }
    }
}

impl PagesmithError {
    /// Get a user-friendly error message with context and actionable suggestions.
    ///
    /// The rendered text is passed through [`redact_error_message`] before it
    /// is returned.
    #[must_use]
    pub fn display_for_user(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("Error: {}\n", self.user_message()));

        if let Some(ctx) = self.context() {
            output.push_str(&format!("\nContext: {ctx}\n"));
        }

        let suggestions = self.suggestions();
        if !suggestions.is_empty() {
            output.push_str("\nSuggestions:\n");
            for suggestion in suggestions {
                output.push_str(&format!("  • {suggestion}\n"));
            }
        }

        redact_error_message(&output)
    }

    /// Map this error to the appropriate CLI exit code.
    #[must_use]
    pub fn to_exit_code(&self) -> crate::exit_codes::ExitCode {
        use crate::exit_codes::ExitCode;

        match self {
            PagesmithError::Config(_) => ExitCode::CLI_ARGS,
            PagesmithError::Validation(_) => ExitCode::VALIDATION,
            PagesmithError::Llm(LlmError::Misconfiguration(_)) => ExitCode::CLI_ARGS,
            PagesmithError::Publisher(PublisherError::Misconfiguration(_)) => ExitCode::CLI_ARGS,
            PagesmithError::Pipeline(PipelineError::Internal(_)) => ExitCode::INTERNAL,
            PagesmithError::Pipeline(_) => ExitCode::TASK_FAILED,
            _ => ExitCode::INTERNAL,
        }
    }
}
