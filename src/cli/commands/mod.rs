//! CLI command implementations
//!
//! One file per subcommand; `run.rs` calls the `execute_*` functions.

mod config_cmd;
mod run_task;
mod serve;

pub use config_cmd::execute_config_command;
pub use run_task::{execute_run_command, load_task};
pub use serve::execute_serve_command;
