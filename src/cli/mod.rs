//! Command-line interface for pagesmith
//!
//! - `args.rs` - clap definitions
//! - `run.rs` - `run()`: parse, discover config, dispatch, report errors
//! - `commands/` - one file per subcommand
//! - `report.rs` - contextual error reports for the terminal

pub mod args;
mod commands;
mod report;
mod run;

pub use args::{Cli, Commands};
pub use report::create_contextual_report;
pub use run::run;
