// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Retry logic with exponential backoff for NextDNS API calls.
//!
//! This module provides utilities for retrying transient API errors (timeouts,
//! connection failures, 429, 5xx) with bounded exponential backoff, while failing
//! fast on permanent errors (400, 401, 403, 404) and on anything unclassified.
//!
//! Every attempt and every inter-attempt delay observes a [`CancellationToken`]:
//! once it fires, the policy returns [`RewriteApiError::Cancelled`] without making
//! another attempt.

use std::future::Future;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::constants::RETRY_DELAYS;
use crate::errors::{classify_error, ErrorClass, RewriteApiError};
use crate::metrics;

/// Bounded backoff schedule.
///
/// The number of attempts is `delays.len() + 1`; `delays[n]` is waited between
/// attempt `n + 1` and attempt `n + 2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delays between consecutive attempts
    pub delays: Vec<Duration>,
}

impl Default for RetryPolicy {
    /// Initial attempt plus 3 retries after 1s, 2s and 4s.
    fn default() -> Self {
        Self {
            delays: RETRY_DELAYS.to_vec(),
        }
    }
}

impl RetryPolicy {
    /// Create a policy with a custom delay schedule.
    #[must_use]
    pub fn with_delays(delays: impl Into<Vec<Duration>>) -> Self {
        Self {
            delays: delays.into(),
        }
    }

    /// Policy that never retries.
    #[must_use]
    pub fn no_retry() -> Self {
        Self { delays: Vec::new() }
    }

    /// Total number of attempts this policy makes.
    #[must_use]
    pub fn max_attempts(&self) -> usize {
        self.delays.len() + 1
    }

    /// Run `operation` until it succeeds, fails terminally, runs out of attempts
    /// or `cancel` fires.
    ///
    /// # Arguments
    ///
    /// * `cancel` - Cancellation signal checked before each attempt and raced against each delay
    /// * `operation_name` - Human-readable name for logging (e.g., "ListRewrites")
    /// * `operation` - Async function that performs the API call
    ///
    /// # Errors
    ///
    /// Returns:
    /// - the error itself if it is not transient (no further attempts)
    /// - the *last* error once all attempts are exhausted
    /// - [`RewriteApiError::Cancelled`] if `cancel` fires
    pub async fn run<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        operation_name: &str,
        mut operation: F,
    ) -> Result<T, RewriteApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RewriteApiError>>,
    {
        let start_time = Instant::now();
        let max_attempts = self.max_attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;

            if cancel.is_cancelled() {
                debug!(
                    operation = operation_name,
                    attempt = attempt,
                    "Cancelled before attempt"
                );
                return Err(RewriteApiError::Cancelled);
            }

            let err = match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(
                            operation = operation_name,
                            attempt = attempt,
                            elapsed = ?start_time.elapsed(),
                            "Operation succeeded after retry"
                        );
                    }
                    return Ok(value);
                }
                Err(e) => e,
            };

            let class = classify_error(&err);
            metrics::record_api_error(operation_name, class);

            if class != ErrorClass::Transient {
                debug!(
                    operation = operation_name,
                    class = class.as_str(),
                    error = %err,
                    "Non-retryable error encountered, failing immediately"
                );
                return Err(err);
            }

            let Some(delay) = self.delays.get(attempt - 1).copied() else {
                error!(
                    operation = operation_name,
                    max_attempts = max_attempts,
                    elapsed = ?start_time.elapsed(),
                    error = %err,
                    "All retry attempts exhausted"
                );
                return Err(err);
            };

            warn!(
                operation = operation_name,
                attempt = attempt,
                retry_after = ?delay,
                error = %err,
                "Retryable error encountered, will retry after delay"
            );
            metrics::record_api_retry(operation_name);

            tokio::select! {
                () = cancel.cancelled() => {
                    debug!(
                        operation = operation_name,
                        attempt = attempt,
                        "Cancelled while waiting to retry"
                    );
                    return Err(RewriteApiError::Cancelled);
                }
                () = tokio::time::sleep(delay) => {}
            }
        }
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod retry_tests;
