use std::path::PathBuf;

/// CLI-level overrides fed into [`Config::discover`](crate::Config::discover).
///
/// Every field is optional; `None` means "fall through to env / file / default".
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    pub config_path: Option<PathBuf>,
    pub model: Option<String>,
    pub github_username: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
}
