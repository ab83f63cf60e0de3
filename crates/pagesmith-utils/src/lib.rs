//! Foundation utilities for pagesmith
//!
//! This crate holds everything the other pagesmith crates share:
//!
//! - [`types`] - domain types for tasks, rounds, status records and results
//! - [`request`] - the untyped inbound request body and its validation
//! - [`error`] - the error taxonomy and user-facing error reporting
//! - [`exit_codes`] - stable CLI exit codes
//! - [`logging`] - tracing subscriber setup and structured log helpers
//! - [`redaction`] - scrubbing credentials out of error text

pub mod error;
pub mod exit_codes;
pub mod logging;
pub mod redaction;
pub mod request;
pub mod types;

pub use error::{PagesmithError, UserFriendlyError};
pub use exit_codes::ExitCode;
pub use types::{
    Attachment, ConfigSource, NotificationPayload, PipelineResult, Round, TaskDescription,
    TaskStatus, TaskStatusRecord,
};
