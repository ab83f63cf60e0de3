//! CLI entry point and dispatch logic
//!
//! `run()` parses arguments, initialises logging, discovers configuration,
//! creates the tokio runtime, dispatches to a command and prints every
//! error itself. `main.rs` only exits with the returned code.

use anyhow::Result;
use clap::Parser;

use pagesmith_config::{CliArgs, Config};
use pagesmith_utils::error::PagesmithError;
use pagesmith_utils::exit_codes::ExitCode;
use pagesmith_utils::logging::init_tracing;
use pagesmith_utils::redaction::redact_error_message;

use super::args::{Cli, Commands};
use super::commands;
use super::report::{create_contextual_report, enhance_error_context};

/// Main CLI execution function.
///
/// Returns `Err(ExitCode)` after printing a report; never exits the process.
pub fn run() -> Result<(), ExitCode> {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.verbose, cli.log_format) {
        eprintln!("✗ Failed to initialise logging: {e}");
        return Err(ExitCode::INTERNAL);
    }

    let (host, port) = match &cli.command {
        Commands::Serve { host, port } => (host.clone(), *port),
        _ => (None, None),
    };
    let cli_args = CliArgs {
        config_path: cli.config.clone(),
        model: cli.model.clone(),
        github_username: cli.github_username.clone(),
        host,
        port,
    };

    let config = match Config::discover(&cli_args) {
        Ok(config) => config,
        Err(err) => {
            let err = PagesmithError::from(err);
            eprintln!("{}", create_contextual_report(&err, "config"));
            return Err(err.to_exit_code());
        }
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("✗ Failed to create async runtime: {e}");
            return Err(ExitCode::INTERNAL);
        }
    };

    let operation = match &cli.command {
        Commands::Serve { .. } => "serve",
        Commands::Run { .. } => "run",
        Commands::Config { .. } => "config",
    };

    let result: Result<ExitCode> = rt.block_on(async {
        match cli.command {
            Commands::Serve { .. } => {
                commands::execute_serve_command(&config).await?;
                Ok(ExitCode::SUCCESS)
            }
            Commands::Run {
                task_file,
                wait_notify,
            } => {
                let succeeded =
                    commands::execute_run_command(&task_file, wait_notify, &config).await?;
                Ok(if succeeded {
                    ExitCode::SUCCESS
                } else {
                    ExitCode::TASK_FAILED
                })
            }
            Commands::Config { json } => {
                commands::execute_config_command(&config, json)?;
                Ok(ExitCode::SUCCESS)
            }
        }
    });

    match result {
        Ok(code) if code == ExitCode::SUCCESS => Ok(()),
        Ok(code) => Err(code),
        Err(error) => {
            if let Some(pagesmith_error) = error.downcast_ref::<PagesmithError>() {
                eprintln!("{}", create_contextual_report(pagesmith_error, operation));
                return Err(pagesmith_error.to_exit_code());
            }

            eprintln!(
                "✗ Unexpected error: {}",
                redact_error_message(&format!("{error:#}"))
            );
            if let Some(suggestions) = enhance_error_context(&error) {
                eprintln!("\n  Suggestions:");
                for (i, suggestion) in suggestions.iter().enumerate() {
                    eprintln!("    {}. {}", i + 1, suggestion);
                }
            }
            eprintln!("\n  Run with --verbose for more detailed output");

            Err(ExitCode::INTERNAL)
        }
    }
}
