use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use pagesmith_utils::types::ConfigSource;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 7860;
pub const DEFAULT_SECRET_ENV: &str = "PAGESMITH_SECRET";
pub const DEFAULT_TOKEN_ENV: &str = "GITHUB_TOKEN";
pub const DEFAULT_GITHUB_API: &str = "https://api.github.com";
pub const DEFAULT_BRANCH: &str = "main";
pub const DEFAULT_LLM_BASE_URL: &str = "https://aipipe.org/openai/v1";
pub const DEFAULT_LLM_MODEL: &str = "gpt-5-nano";
pub const DEFAULT_LLM_KEY_ENV: &str = "LLM_API_KEY";
pub const DEFAULT_REPO_PREFIX: &str = "tds";

/// Configuration for pagesmith.
///
/// `Config` provides hierarchical configuration with discovery and precedence:
/// CLI arguments > environment > config file > built-in defaults.
///
/// # Discovery
///
/// Use [`Config::discover()`] for CLI-like behavior that:
/// - Honours an explicit `--config` path
/// - Respects the `PAGESMITH_HOME` environment variable
/// - Searches for `.pagesmith/config.toml` upward from the current directory
/// - Applies built-in defaults for unspecified values
///
/// # Secrets
///
/// Tokens are never read from the file. The file names the environment
/// variables (`token_env`, `api_key_env`, `secret_env`) and discovery
/// resolves them into [`Secrets`].
///
/// # Configuration File Format
///
/// ```toml
/// [server]
/// port = 7860
///
/// [github]
/// username = "pages-bot"
///
/// [llm]
/// model = "gpt-5-nano"
///
/// [pipeline]
/// soft_budget_secs = 600
///
/// [notifier]
/// ceiling_secs = 600
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub github: GitHubConfig,
    pub llm: LlmConfig,
    pub pipeline: PipelineConfig,
    pub notifier: NotifierConfig,
    pub secrets: Secrets,
    /// The config file that was loaded, if any.
    pub config_path: Option<PathBuf>,
    /// Source attribution for each setting (for `pagesmith config`).
    pub source_attribution: HashMap<String, ConfigSource>,
}

/// `[server]` section
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Environment variable holding the shared secret callers must present.
    pub secret_env: String,
}

/// `[github]` section
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GitHubConfig {
    /// Account that owns created repositories. Required to publish.
    pub username: Option<String>,
    pub token_env: String,
    pub api_base_url: String,
    pub branch: String,
    pub private: bool,
}

/// `[llm]` section
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LlmConfig {
    /// OpenAI-compatible API root; `/chat/completions` is appended.
    pub base_url: String,
    pub model: String,
    pub api_key_env: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub timeout_secs: u64,
}

/// `[pipeline]` section
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PipelineConfig {
    pub soft_budget_secs: u64,
    /// Fraction of the soft budget after which a warning is logged.
    pub budget_warning_ratio: f64,
    /// Artifacts shorter than this are replaced by the fallback renderer.
    pub min_artifact_chars: usize,
    pub max_create_attempts: u32,
    pub repo_prefix: String,
    /// Copyright holder written into generated LICENSE files.
    pub license_holder: String,
}

/// `[notifier]` section
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct NotifierConfig {
    pub initial_delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_ms: u64,
    /// Total time after which callback delivery is abandoned.
    pub ceiling_secs: u64,
    pub request_timeout_secs: u64,
}

/// Credentials resolved from the environment.
///
/// `Debug` never prints the values.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secrets {
    pub github_token: Option<String>,
    pub llm_api_key: Option<String>,
    pub shared_secret: Option<String>,
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secrets")
            .field("github_token", &presence(&self.github_token))
            .field("llm_api_key", &presence(&self.llm_api_key))
            .field("shared_secret", &presence(&self.shared_secret))
            .finish()
    }
}

pub(crate) fn presence(value: &Option<String>) -> &'static str {
    match value {
        Some(v) if !v.is_empty() => "set",
        _ => "unset",
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            secret_env: DEFAULT_SECRET_ENV.to_string(),
        }
    }
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            username: None,
            token_env: DEFAULT_TOKEN_ENV.to_string(),
            api_base_url: DEFAULT_GITHUB_API.to_string(),
            branch: DEFAULT_BRANCH.to_string(),
            private: false,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_LLM_BASE_URL.to_string(),
            model: DEFAULT_LLM_MODEL.to_string(),
            api_key_env: DEFAULT_LLM_KEY_ENV.to_string(),
            max_tokens: None,
            temperature: None,
            timeout_secs: 120,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            soft_budget_secs: 600,
            budget_warning_ratio: 0.8,
            min_artifact_chars: 100,
            max_create_attempts: 3,
            repo_prefix: DEFAULT_REPO_PREFIX.to_string(),
            license_holder: "pagesmith contributors".to_string(),
        }
    }
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1_000,
            multiplier: 2.0,
            max_delay_ms: 60_000,
            ceiling_secs: 600,
            request_timeout_secs: 30,
        }
    }
}

impl LlmConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl PipelineConfig {
    #[must_use]
    pub fn soft_budget(&self) -> Duration {
        Duration::from_secs(self.soft_budget_secs)
    }
}

impl NotifierConfig {
    #[must_use]
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    #[must_use]
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    #[must_use]
    pub fn ceiling(&self) -> Duration {
        Duration::from_secs(self.ceiling_secs)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// One line of `pagesmith config` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigEntry {
    pub key: String,
    pub value: String,
    pub source: ConfigSource,
}

impl Config {
    /// Every effective setting with its source, sorted by key.
    ///
    /// Secrets appear only as `set` / `unset`.
    #[must_use]
    pub fn effective_entries(&self) -> Vec<ConfigEntry> {
        let opt = |v: &Option<String>| v.clone().unwrap_or_else(|| "(unset)".to_string());
        let opt_num = |v: Option<String>| v.unwrap_or_else(|| "(provider default)".to_string());

        let values: Vec<(&str, String)> = vec![
            ("server.host", self.server.host.clone()),
            ("server.port", self.server.port.to_string()),
            ("server.secret_env", self.server.secret_env.clone()),
            ("github.username", opt(&self.github.username)),
            ("github.token_env", self.github.token_env.clone()),
            ("github.api_base_url", self.github.api_base_url.clone()),
            ("github.branch", self.github.branch.clone()),
            ("github.private", self.github.private.to_string()),
            ("llm.base_url", self.llm.base_url.clone()),
            ("llm.model", self.llm.model.clone()),
            ("llm.api_key_env", self.llm.api_key_env.clone()),
            ("llm.max_tokens", opt_num(self.llm.max_tokens.map(|v| v.to_string()))),
            ("llm.temperature", opt_num(self.llm.temperature.map(|v| v.to_string()))),
            ("llm.timeout_secs", self.llm.timeout_secs.to_string()),
            ("pipeline.soft_budget_secs", self.pipeline.soft_budget_secs.to_string()),
            ("pipeline.budget_warning_ratio", self.pipeline.budget_warning_ratio.to_string()),
            ("pipeline.min_artifact_chars", self.pipeline.min_artifact_chars.to_string()),
            ("pipeline.max_create_attempts", self.pipeline.max_create_attempts.to_string()),
            ("pipeline.repo_prefix", self.pipeline.repo_prefix.clone()),
            ("pipeline.license_holder", self.pipeline.license_holder.clone()),
            ("notifier.initial_delay_ms", self.notifier.initial_delay_ms.to_string()),
            ("notifier.multiplier", self.notifier.multiplier.to_string()),
            ("notifier.max_delay_ms", self.notifier.max_delay_ms.to_string()),
            ("notifier.ceiling_secs", self.notifier.ceiling_secs.to_string()),
            ("notifier.request_timeout_secs", self.notifier.request_timeout_secs.to_string()),
            ("secrets.github_token", presence(&self.secrets.github_token).to_string()),
            ("secrets.llm_api_key", presence(&self.secrets.llm_api_key).to_string()),
            ("secrets.shared_secret", presence(&self.secrets.shared_secret).to_string()),
        ];

        let mut entries: Vec<ConfigEntry> = values
            .into_iter()
            .map(|(key, value)| ConfigEntry {
                key: key.to_string(),
                value,
                source: self
                    .source_attribution
                    .get(key)
                    .copied()
                    .unwrap_or(ConfigSource::Default),
            })
            .collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        entries
    }

    /// The GitHub account, or an error naming the missing key.
    pub fn github_username(&self) -> Result<&str, pagesmith_utils::error::ConfigError> {
        self.github
            .username
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| {
                pagesmith_utils::error::ConfigError::MissingRequired("github.username".to_string())
            })
    }
}
