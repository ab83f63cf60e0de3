use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use pagesmith_utils::error::ConfigError;

use super::{
    CliArgs, Config, ConfigSource, GitHubConfig, LlmConfig, NotifierConfig, PipelineConfig,
    Secrets, ServerConfig,
};

pub const HOME_ENV: &str = "PAGESMITH_HOME";
pub const HOST_ENV: &str = "PAGESMITH_HOST";
pub const PORT_ENV: &str = "PAGESMITH_PORT";
pub const GITHUB_USERNAME_ENV: &str = "GITHUB_USERNAME";
pub const LLM_BASE_URL_ENV: &str = "PAGESMITH_LLM_BASE_URL";
pub const LLM_MODEL_ENV: &str = "PAGESMITH_LLM_MODEL";

/// TOML configuration file structure
#[derive(Debug, Default, Deserialize)]
struct TomlConfig {
    server: Option<FileServer>,
    github: Option<FileGitHub>,
    llm: Option<FileLlm>,
    pipeline: Option<FilePipeline>,
    notifier: Option<FileNotifier>,
}

#[derive(Debug, Default, Deserialize)]
struct FileServer {
    host: Option<String>,
    port: Option<u16>,
    secret_env: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FileGitHub {
    username: Option<String>,
    token_env: Option<String>,
    api_base_url: Option<String>,
    branch: Option<String>,
    private: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct FileLlm {
    base_url: Option<String>,
    model: Option<String>,
    api_key_env: Option<String>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct FilePipeline {
    soft_budget_secs: Option<u64>,
    budget_warning_ratio: Option<f64>,
    min_artifact_chars: Option<usize>,
    max_create_attempts: Option<u32>,
    repo_prefix: Option<String>,
    license_holder: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FileNotifier {
    initial_delay_ms: Option<u64>,
    multiplier: Option<f64>,
    max_delay_ms: Option<u64>,
    ceiling_secs: Option<u64>,
    request_timeout_secs: Option<u64>,
}

/// Records where each key's final value came from.
struct Layer<'a> {
    attribution: &'a mut HashMap<String, ConfigSource>,
    source: ConfigSource,
}

impl Layer<'_> {
    fn set<T>(&mut self, key: &str, target: &mut T, value: Option<T>) {
        if let Some(value) = value {
            *target = value;
            self.attribution.insert(key.to_string(), self.source);
        }
    }

    fn set_opt<T>(&mut self, key: &str, target: &mut Option<T>, value: Option<T>) {
        if value.is_some() {
            *target = value;
            self.attribution.insert(key.to_string(), self.source);
        }
    }
}

impl Config {
    /// Discover and load configuration with precedence: CLI > env > file > defaults
    ///
    /// Uses the current working directory and the process environment.
    pub fn discover(cli_args: &CliArgs) -> Result<Self, ConfigError> {
        let start_dir = std::env::current_dir().map_err(|e| ConfigError::DiscoveryFailed {
            reason: format!("cannot read current directory: {e}"),
        })?;
        Self::discover_from(&start_dir, cli_args, |key| std::env::var(key).ok())
    }

    /// Discover configuration from a given directory and environment lookup.
    ///
    /// This is the path-driven variant used by tests to avoid process-global
    /// state; `env` stands in for `std::env::var`.
    pub fn discover_from<F>(start_dir: &Path, cli_args: &CliArgs, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());
        let mut source_attribution = HashMap::new();

        let mut server = ServerConfig::default();
        let mut github = GitHubConfig::default();
        let mut llm = LlmConfig::default();
        let mut pipeline = PipelineConfig::default();
        let mut notifier = NotifierConfig::default();

        let config_path = match &cli_args.config_path {
            Some(explicit) => {
                if !explicit.exists() {
                    return Err(ConfigError::NotFound {
                        path: explicit.display().to_string(),
                    });
                }
                Some(explicit.clone())
            }
            None => match env(HOME_ENV) {
                Some(home) => {
                    let candidate = PathBuf::from(home).join("config.toml");
                    if candidate.exists() {
                        Some(candidate)
                    } else {
                        Self::discover_config_file_from(start_dir)
                    }
                }
                None => Self::discover_config_file_from(start_dir),
            },
        };

        if let Some(path) = &config_path {
            debug!(path = %path.display(), "Loading config file");
            let file = Self::load_config_file(path)?;
            let mut layer = Layer {
                attribution: &mut source_attribution,
                source: ConfigSource::Config,
            };

            if let Some(s) = file.server {
                layer.set("server.host", &mut server.host, s.host);
                layer.set("server.port", &mut server.port, s.port);
                layer.set("server.secret_env", &mut server.secret_env, s.secret_env);
            }
            if let Some(g) = file.github {
                layer.set_opt("github.username", &mut github.username, g.username);
                layer.set("github.token_env", &mut github.token_env, g.token_env);
                layer.set("github.api_base_url", &mut github.api_base_url, g.api_base_url);
                layer.set("github.branch", &mut github.branch, g.branch);
                layer.set("github.private", &mut github.private, g.private);
            }
            if let Some(l) = file.llm {
                layer.set("llm.base_url", &mut llm.base_url, l.base_url);
                layer.set("llm.model", &mut llm.model, l.model);
                layer.set("llm.api_key_env", &mut llm.api_key_env, l.api_key_env);
                layer.set_opt("llm.max_tokens", &mut llm.max_tokens, l.max_tokens);
                layer.set_opt("llm.temperature", &mut llm.temperature, l.temperature);
                layer.set("llm.timeout_secs", &mut llm.timeout_secs, l.timeout_secs);
            }
            if let Some(p) = file.pipeline {
                layer.set("pipeline.soft_budget_secs", &mut pipeline.soft_budget_secs, p.soft_budget_secs);
                layer.set(
                    "pipeline.budget_warning_ratio",
                    &mut pipeline.budget_warning_ratio,
                    p.budget_warning_ratio,
                );
                layer.set(
                    "pipeline.min_artifact_chars",
                    &mut pipeline.min_artifact_chars,
                    p.min_artifact_chars,
                );
                layer.set(
                    "pipeline.max_create_attempts",
                    &mut pipeline.max_create_attempts,
                    p.max_create_attempts,
                );
                layer.set("pipeline.repo_prefix", &mut pipeline.repo_prefix, p.repo_prefix);
                layer.set("pipeline.license_holder", &mut pipeline.license_holder, p.license_holder);
            }
            if let Some(n) = file.notifier {
                layer.set("notifier.initial_delay_ms", &mut notifier.initial_delay_ms, n.initial_delay_ms);
                layer.set("notifier.multiplier", &mut notifier.multiplier, n.multiplier);
                layer.set("notifier.max_delay_ms", &mut notifier.max_delay_ms, n.max_delay_ms);
                layer.set("notifier.ceiling_secs", &mut notifier.ceiling_secs, n.ceiling_secs);
                layer.set(
                    "notifier.request_timeout_secs",
                    &mut notifier.request_timeout_secs,
                    n.request_timeout_secs,
                );
            }
        }

        // Environment overrides the file
        {
            let mut layer = Layer {
                attribution: &mut source_attribution,
                source: ConfigSource::Env,
            };
            layer.set("server.host", &mut server.host, env(HOST_ENV));
            let port = match env(PORT_ENV) {
                Some(raw) => Some(raw.trim().parse::<u16>().map_err(|_| ConfigError::InvalidValue {
                    key: PORT_ENV.to_string(),
                    value: raw.clone(),
                })?),
                None => None,
            };
            layer.set("server.port", &mut server.port, port);
            layer.set_opt("github.username", &mut github.username, env(GITHUB_USERNAME_ENV));
            layer.set("llm.base_url", &mut llm.base_url, env(LLM_BASE_URL_ENV));
            layer.set("llm.model", &mut llm.model, env(LLM_MODEL_ENV));
        }

        // CLI overrides everything
        {
            let mut layer = Layer {
                attribution: &mut source_attribution,
                source: ConfigSource::Cli,
            };
            layer.set("server.host", &mut server.host, cli_args.host.clone());
            layer.set("server.port", &mut server.port, cli_args.port);
            layer.set("llm.model", &mut llm.model, cli_args.model.clone());
            layer.set_opt(
                "github.username",
                &mut github.username,
                cli_args.github_username.clone(),
            );
        }

        let secrets = Secrets {
            github_token: env(github.token_env.as_str()),
            llm_api_key: env(llm.api_key_env.as_str()),
            shared_secret: env(server.secret_env.as_str()),
        };
        for key in ["secrets.github_token", "secrets.llm_api_key", "secrets.shared_secret"] {
            source_attribution.insert(key.to_string(), ConfigSource::Env);
        }

        let config = Self {
            server,
            github,
            llm,
            pipeline,
            notifier,
            secrets,
            config_path,
            source_attribution,
        };

        config.validate()?;

        Ok(config)
    }

    /// Walk up from `start_dir` looking for `.pagesmith/config.toml`.
    ///
    /// Stops at repository root markers (`.git`, `.hg`) or the filesystem root.
    #[must_use]
    pub fn discover_config_file_from(start_dir: &Path) -> Option<PathBuf> {
        let mut current = Some(start_dir);

        while let Some(dir) = current {
            let candidate = dir.join(".pagesmith").join("config.toml");
            if candidate.exists() {
                return Some(candidate);
            }
            if dir.join(".git").exists() || dir.join(".hg").exists() {
                break;
            }
            current = dir.parent();
        }

        None
    }

    fn load_config_file(path: &Path) -> Result<TomlConfig, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::InvalidFile(format!("cannot read {}: {e}", path.display()))
        })?;
        toml::from_str(&content)
            .map_err(|e| ConfigError::InvalidFile(format!("{}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults_without_any_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();

        let config = Config::discover_from(dir.path(), &CliArgs::default(), no_env).unwrap();
        assert!(config.config_path.is_none());
        assert_eq!(config.server.port, 7860);
        assert_eq!(config.source_attribution.get("server.port"), None);
        assert!(config.secrets.github_token.is_none());
    }

    #[test]
    fn test_upward_search_finds_parent_config() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        fs::create_dir(dir.path().join(".pagesmith")).unwrap();
        fs::write(
            dir.path().join(".pagesmith/config.toml"),
            "[github]\nusername = \"pages-bot\"\n",
        )
        .unwrap();
        let nested = dir.path().join("a/b");
        fs::create_dir_all(&nested).unwrap();

        let found = Config::discover_config_file_from(&nested).unwrap();
        assert_eq!(found, dir.path().join(".pagesmith/config.toml"));
    }

    #[test]
    fn test_search_stops_at_repository_root() {
        let outer = tempfile::tempdir().unwrap();
        fs::create_dir(outer.path().join(".pagesmith")).unwrap();
        fs::write(outer.path().join(".pagesmith/config.toml"), "").unwrap();
        let repo = outer.path().join("repo");
        fs::create_dir_all(repo.join(".git")).unwrap();

        assert!(Config::discover_config_file_from(&repo).is_none());
    }

    #[test]
    fn test_unknown_port_env_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        let env = |key: &str| (key == PORT_ENV).then(|| "not-a-port".to_string());

        let err = Config::discover_from(dir.path(), &CliArgs::default(), env).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == PORT_ENV));
    }
}
