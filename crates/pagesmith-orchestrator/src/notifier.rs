//! Evaluation callback delivery
//!
//! [`HttpNotifier`] POSTs the [`NotificationPayload`] to the caller's URL and
//! retries under a [`BackoffPolicy`] until the endpoint answers exactly
//! `200 OK` or the ceiling is reached. 4xx and 5xx answers are retried alike.
//! Each attempt is cut off at whatever is left of the ceiling, so a callback
//! endpoint that never answers cannot hold delivery past it.
//!
//! The pipeline never awaits delivery: it starts a [`NotificationHandle`]
//! and moves on. The handle logs the outcome itself and can be awaited by
//! callers that want it (tests, `pagesmith run --wait-notify`).

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info, warn};

use pagesmith_config::NotifierConfig;
use pagesmith_utils::error::NotifyError;
use pagesmith_utils::redaction::redact_error_message;
use pagesmith_utils::types::NotificationPayload;

use crate::retry::{BackoffPolicy, NextStep, RetryPolicy};

/// Successful delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NotificationReceipt {
    pub attempts: u32,
    pub elapsed_ms: u64,
}

#[async_trait]
pub trait CallbackNotifier: Send + Sync {
    /// Deliver `payload` to `url`, retrying as the implementation sees fit.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::CeilingReached` once retrying stops without a
    /// successful answer.
    async fn notify(
        &self,
        url: &str,
        payload: &NotificationPayload,
    ) -> Result<NotificationReceipt, NotifyError>;
}

/// JSON-over-HTTP notifier with capped exponential backoff.
#[derive(Clone)]
pub struct HttpNotifier {
    client: Client,
    policy: BackoffPolicy,
    request_timeout: Duration,
}

impl HttpNotifier {
    /// # Errors
    ///
    /// Returns `NotifyError::Transport` if the HTTP client cannot be built.
    pub fn new(policy: BackoffPolicy, request_timeout: Duration) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .user_agent(concat!("pagesmith/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| NotifyError::Transport(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            policy,
            request_timeout,
        })
    }

    /// # Errors
    ///
    /// Returns `NotifyError::Transport` if the HTTP client cannot be built.
    pub fn from_config(config: &NotifierConfig) -> Result<Self, NotifyError> {
        Self::new(BackoffPolicy::from_config(config), config.request_timeout())
    }

    #[must_use]
    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    async fn post_once(
        &self,
        url: &str,
        payload: &NotificationPayload,
        timeout: Duration,
    ) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(url)
            .timeout(timeout)
            .json(payload)
            .send()
            .await
            .map_err(|e| NotifyError::Transport(redact_error_message(&e.to_string())))?;

        let status = response.status();
        if status == StatusCode::OK {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            debug!(status = status.as_u16(), body = %redact_error_message(&body), "Callback rejected");
            Err(NotifyError::Rejected {
                status: status.as_u16(),
            })
        }
    }
}

#[async_trait]
impl CallbackNotifier for HttpNotifier {
    async fn notify(
        &self,
        url: &str,
        payload: &NotificationPayload,
    ) -> Result<NotificationReceipt, NotifyError> {
        let started = Instant::now();
        let mut attempt: u32 = 1;

        loop {
            let remaining = self.policy.ceiling.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                return Err(NotifyError::CeilingReached {
                    attempts: attempt - 1,
                    elapsed_ms: elapsed_ms(started),
                });
            }

            info!(nonce = %payload.nonce, attempt, "Posting evaluation callback");

            let timeout = self.request_timeout.min(remaining);
            let err = match self.post_once(url, payload, timeout).await {
                Ok(()) => {
                    return Ok(NotificationReceipt {
                        attempts: attempt,
                        elapsed_ms: elapsed_ms(started),
                    });
                }
                Err(err) => err,
            };

            match self.policy.next(attempt, started.elapsed()) {
                NextStep::RetryAfter(delay) => {
                    warn!(
                        nonce = %payload.nonce,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Callback attempt failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                NextStep::GiveUp => {
                    return Err(NotifyError::CeilingReached {
                        attempts: attempt,
                        elapsed_ms: elapsed_ms(started),
                    });
                }
            }
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// A notification running detached from the pipeline that started it.
///
/// Dropping the handle does not cancel delivery.
#[derive(Debug)]
pub struct NotificationHandle {
    nonce: String,
    join: JoinHandle<Result<NotificationReceipt, NotifyError>>,
}

impl NotificationHandle {
    /// Start delivering `payload` on the current Tokio runtime.
    pub fn spawn(
        notifier: Arc<dyn CallbackNotifier>,
        url: String,
        payload: NotificationPayload,
    ) -> Self {
        let nonce = payload.nonce.clone();
        let task = async move {
            let outcome = notifier.notify(&url, &payload).await;
            match &outcome {
                Ok(receipt) => info!(
                    nonce = %payload.nonce,
                    attempts = receipt.attempts,
                    elapsed_ms = receipt.elapsed_ms,
                    "Evaluation callback delivered"
                ),
                Err(err) => warn!(
                    nonce = %payload.nonce,
                    error = %err,
                    "Evaluation callback not delivered"
                ),
            }
            outcome
        };
        Self {
            nonce,
            join: tokio::spawn(task.instrument(tracing::Span::current())),
        }
    }

    #[must_use]
    pub fn nonce(&self) -> &str {
        &self.nonce
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for delivery to finish.
    ///
    /// # Errors
    ///
    /// Returns the notifier's error, or `NotifyError::Transport` if the
    /// delivery task panicked or was aborted.
    pub async fn outcome(self) -> Result<NotificationReceipt, NotifyError> {
        self.join.await.unwrap_or_else(|e| {
            Err(NotifyError::Transport(format!(
                "notification task ended abnormally: {e}"
            )))
        })
    }
}
