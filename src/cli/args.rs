//! CLI argument definitions and parsing structures

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use pagesmith_utils::logging::LogFormat;

/// pagesmith - LLM-built single-page apps, published to GitHub Pages
#[derive(Parser, Debug)]
#[command(name = "pagesmith")]
#[command(about = "Turn task briefs into single-page apps published on GitHub Pages")]
#[command(long_about = r#"
pagesmith accepts task briefs, has an LLM write a self-contained HTML page,
commits it with a README and LICENSE to a GitHub repository, enables GitHub
Pages and reports the result to the task's evaluation URL.

EXAMPLES:
  # Run the HTTP front door
  pagesmith serve --host 127.0.0.1 --port 7860

  # Process one task from a file and wait for the evaluation callback
  pagesmith run task.json --wait-notify

  # Show effective configuration and where each value came from
  pagesmith config --json

CONFIGURATION:
  Precedence: CLI flags > environment > config file > defaults
  The config file is --config, else $PAGESMITH_HOME/config.toml, else the
  nearest .pagesmith/config.toml above the working directory.
  Secrets come only from the environment: GITHUB_TOKEN, LLM_API_KEY and
  PAGESMITH_SECRET unless renamed in the config file.

ROUNDS:
  Round 1 creates the repository; round 2 revises the same repository
  and adds round2-updates.md.
"#)]
#[command(version)]
pub struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log output format (compact or json)
    #[arg(long, global = true, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,

    /// LLM model to request
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// GitHub account that owns published repositories
    #[arg(long, global = true)]
    pub github_username: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP front door
    Serve {
        /// Address to bind
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,
    },

    /// Process a single task read from a JSON file
    Run {
        /// Task request file (same body as POST /task)
        task_file: PathBuf,

        /// Wait for the evaluation callback to finish before exiting
        #[arg(long)]
        wait_notify: bool,
    },

    /// Show effective configuration with sources
    Config {
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_serve_with_globals_after_subcommand() {
        let cli = Cli::try_parse_from([
            "pagesmith",
            "serve",
            "--port",
            "9000",
            "--github-username",
            "octo",
            "--log-format",
            "json",
        ])
        .unwrap();

        assert_eq!(cli.github_username.as_deref(), Some("octo"));
        assert_eq!(cli.log_format, LogFormat::Json);
        match cli.command {
            Commands::Serve { host, port } => {
                assert_eq!(host, None);
                assert_eq!(port, Some(9000));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn parses_run_with_wait_flag() {
        let cli = Cli::try_parse_from(["pagesmith", "run", "task.json", "--wait-notify"]).unwrap();
        assert!(!cli.verbose);
        assert_eq!(cli.log_format, LogFormat::Compact);
        match cli.command {
            Commands::Run {
                task_file,
                wait_notify,
            } => {
                assert_eq!(task_file, PathBuf::from("task.json"));
                assert!(wait_notify);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_log_format() {
        assert!(Cli::try_parse_from(["pagesmith", "config", "--log-format", "xml"]).is_err());
    }

    #[test]
    fn subcommand_is_required() {
        assert!(Cli::try_parse_from(["pagesmith"]).is_err());
    }
}
