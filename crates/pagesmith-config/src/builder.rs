use std::collections::HashMap;
use std::time::Duration;

use pagesmith_utils::error::ConfigError;

use super::{
    Config, ConfigSource, GitHubConfig, LlmConfig, NotifierConfig, PipelineConfig, Secrets,
    ServerConfig,
};

impl Config {
    /// Create a builder for programmatic configuration.
    ///
    /// Use this when pagesmith is embedded or under test and must not read
    /// environment variables or config files.
    ///
    /// # Example
    ///
    /// ```rust
    /// use pagesmith_config::Config;
    ///
    /// let config = Config::builder()
    ///     .github_username("pages-bot")
    ///     .github_token("ghp_example")
    ///     .model("gpt-4o-mini")
    ///     .build()
    ///     .expect("valid config");
    /// assert_eq!(config.llm.model, "gpt-4o-mini");
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }
}

/// Builder for programmatic configuration of pagesmith.
///
/// All values set via the builder are attributed to
/// `ConfigSource::Programmatic`.
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    server: ServerConfig,
    github: GitHubConfig,
    llm: LlmConfig,
    pipeline: PipelineConfig,
    notifier: NotifierConfig,
    secrets: Secrets,
    touched: Vec<&'static str>,
}

impl ConfigBuilder {
    /// Create a new `ConfigBuilder` with every value at its default.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn mark(mut self, key: &'static str) -> Self {
        self.touched.push(key);
        self
    }

    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.server.host = host.into();
        self.mark("server.host")
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.server.port = port;
        self.mark("server.port")
    }

    #[must_use]
    pub fn shared_secret(mut self, secret: impl Into<String>) -> Self {
        self.secrets.shared_secret = Some(secret.into());
        self.mark("secrets.shared_secret")
    }

    #[must_use]
    pub fn github_username(mut self, username: impl Into<String>) -> Self {
        self.github.username = Some(username.into());
        self.mark("github.username")
    }

    #[must_use]
    pub fn github_token(mut self, token: impl Into<String>) -> Self {
        self.secrets.github_token = Some(token.into());
        self.mark("secrets.github_token")
    }

    /// Point the GitHub client somewhere else, e.g. a mock server.
    #[must_use]
    pub fn github_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.github.api_base_url = url.into();
        self.mark("github.api_base_url")
    }

    #[must_use]
    pub fn branch(mut self, branch: impl Into<String>) -> Self {
        self.github.branch = branch.into();
        self.mark("github.branch")
    }

    #[must_use]
    pub fn llm_base_url(mut self, url: impl Into<String>) -> Self {
        self.llm.base_url = url.into();
        self.mark("llm.base_url")
    }

    #[must_use]
    pub fn llm_api_key(mut self, key: impl Into<String>) -> Self {
        self.secrets.llm_api_key = Some(key.into());
        self.mark("secrets.llm_api_key")
    }

    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.llm.model = model.into();
        self.mark("llm.model")
    }

    #[must_use]
    pub fn llm_timeout(mut self, timeout: Duration) -> Self {
        self.llm.timeout_secs = timeout.as_secs().max(1);
        self.mark("llm.timeout_secs")
    }

    #[must_use]
    pub fn soft_budget(mut self, budget: Duration) -> Self {
        self.pipeline.soft_budget_secs = budget.as_secs();
        self.mark("pipeline.soft_budget_secs")
    }

    #[must_use]
    pub fn max_create_attempts(mut self, attempts: u32) -> Self {
        self.pipeline.max_create_attempts = attempts;
        self.mark("pipeline.max_create_attempts")
    }

    #[must_use]
    pub fn repo_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.pipeline.repo_prefix = prefix.into();
        self.mark("pipeline.repo_prefix")
    }

    #[must_use]
    pub fn license_holder(mut self, holder: impl Into<String>) -> Self {
        self.pipeline.license_holder = holder.into();
        self.mark("pipeline.license_holder")
    }

    /// Replace the whole `[notifier]` section.
    #[must_use]
    pub fn notifier(mut self, notifier: NotifierConfig) -> Self {
        self.notifier = notifier;
        self.mark("notifier.initial_delay_ms")
            .mark("notifier.multiplier")
            .mark("notifier.max_delay_ms")
            .mark("notifier.ceiling_secs")
            .mark("notifier.request_timeout_secs")
    }

    /// Build and validate the configuration.
    pub fn build(self) -> Result<Config, ConfigError> {
        let source_attribution: HashMap<String, ConfigSource> = self
            .touched
            .iter()
            .map(|key| ((*key).to_string(), ConfigSource::Programmatic))
            .collect();

        let config = Config {
            server: self.server,
            github: self.github,
            llm: self.llm,
            pipeline: self.pipeline,
            notifier: self.notifier,
            secrets: self.secrets,
            config_path: None,
            source_attribution,
        };

        config.validate()?;
        Ok(config)
    }
}
