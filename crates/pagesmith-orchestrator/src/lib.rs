//! Task pipeline for pagesmith
//!
//! This crate sequences one task through generation, repository
//! publication, hosting activation and callback notification.
//!
//! # Module Organization
//!
//! - `orchestrator.rs`: [`TaskOrchestrator`], the pipeline itself
//! - `naming.rs`: deterministic repository names shared by both rounds
//! - `retry.rs`: pure retry policies for name collisions and callbacks
//! - `notifier.rs`: detached callback delivery with its own handle
//! - `handle.rs`: [`OrchestratorHandle`], wiring real collaborators from config
//!
//! # Integration Rule
//!
//! **Outside this crate, use `OrchestratorHandle` for production wiring.**
//! Building a `TaskOrchestrator` by hand is for tests and custom collaborators.

mod handle;
pub mod naming;
mod notifier;
mod orchestrator;
pub mod retry;

pub use handle::OrchestratorHandle;
pub use notifier::{CallbackNotifier, HttpNotifier, NotificationHandle, NotificationReceipt};
pub use orchestrator::{
    INDEX_FILE, LICENSE_FILE, PipelineSettings, README_FILE, ROUND2_FILE, TaskOrchestrator,
    TaskOutcome,
};
pub use retry::{BackoffPolicy, CollisionPolicy, NextStep, RetryPolicy};
