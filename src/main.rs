//! pagesmith binary entry point
//!
//! All output, including error reports, is produced by `cli::run()`;
//! this file only turns its exit code into a process exit.

fn main() {
    if let Err(code) = pagesmith::cli::run() {
        std::process::exit(code.as_i32());
    }
}
