//! Configuration management for pagesmith
//!
//! Hierarchical configuration with discovery and precedence:
//! CLI > environment > file > defaults. Config files are TOML with
//! `[server]`, `[github]`, `[llm]`, `[pipeline]` and `[notifier]` sections.

mod builder;
mod cli_args;
mod discovery;
mod model;
mod validation;

pub use builder::ConfigBuilder;
pub use cli_args::CliArgs;
pub use discovery::{
    GITHUB_USERNAME_ENV, HOME_ENV, HOST_ENV, LLM_BASE_URL_ENV, LLM_MODEL_ENV, PORT_ENV,
};
pub use model::*;
pub use pagesmith_utils::types::ConfigSource;
