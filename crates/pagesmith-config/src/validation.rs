use pagesmith_utils::error::ConfigError;

use super::Config;

fn invalid(key: &str, value: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.into(),
    }
}

impl Config {
    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(invalid("server.port", "must be greater than 0"));
        }

        for (key, url) in [
            ("github.api_base_url", &self.github.api_base_url),
            ("llm.base_url", &self.llm.base_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(invalid(key, format!("'{url}' is not an http(s) URL")));
            }
        }

        if self.github.branch.trim().is_empty() {
            return Err(invalid("github.branch", "must not be empty"));
        }

        if self.llm.model.trim().is_empty() {
            return Err(invalid("llm.model", "must not be empty"));
        }

        if let Some(temperature) = self.llm.temperature
            && !(0.0..=2.0).contains(&temperature)
        {
            return Err(invalid("llm.temperature", "must be between 0.0 and 2.0"));
        }

        if self.llm.timeout_secs == 0 {
            return Err(invalid("llm.timeout_secs", "must be greater than 0"));
        }

        let ratio = self.pipeline.budget_warning_ratio;
        if !(ratio > 0.0 && ratio <= 1.0) {
            return Err(invalid(
                "pipeline.budget_warning_ratio",
                format!("{ratio} is outside (0, 1]"),
            ));
        }

        if self.pipeline.soft_budget_secs == 0 {
            return Err(invalid("pipeline.soft_budget_secs", "must be greater than 0"));
        }

        if self.pipeline.max_create_attempts == 0 || self.pipeline.max_create_attempts > 10 {
            return Err(invalid(
                "pipeline.max_create_attempts",
                "must be between 1 and 10",
            ));
        }

        let prefix = self.pipeline.repo_prefix.trim();
        if prefix.is_empty() {
            return Err(invalid("pipeline.repo_prefix", "must not be empty"));
        }
        if !prefix.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(invalid(
                "pipeline.repo_prefix",
                format!("'{prefix}' may only contain letters, digits and '-'"),
            ));
        }

        if !(self.notifier.multiplier >= 1.0) {
            return Err(invalid("notifier.multiplier", "must be at least 1.0"));
        }

        if self.notifier.initial_delay_ms == 0 {
            return Err(invalid("notifier.initial_delay_ms", "must be greater than 0"));
        }

        if self.notifier.max_delay_ms < self.notifier.initial_delay_ms {
            return Err(invalid(
                "notifier.max_delay_ms",
                "must not be shorter than notifier.initial_delay_ms",
            ));
        }

        if self.notifier.ceiling() < self.notifier.initial_delay() {
            return Err(invalid(
                "notifier.ceiling_secs",
                "must not be shorter than notifier.initial_delay_ms",
            ));
        }

        if self.notifier.request_timeout_secs == 0 {
            return Err(invalid("notifier.request_timeout_secs", "must be greater than 0"));
        }

        Ok(())
    }
}
