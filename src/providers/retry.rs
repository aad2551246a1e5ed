// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Retry logic with exponential backoff for provider API calls.
//!
//! Transient failures (429, 5xx, connection errors) are retried with
//! exponential backoff and jitter; every other error fails fast.

use crate::errors::{ProviderError, ProviderResult};
use rand::Rng;
use reqwest::StatusCode;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// First delay between two attempts
const FIRST_DELAY: Duration = Duration::from_millis(50);

/// Delays stop doubling here
const DELAY_CAP: Duration = Duration::from_secs(10);

/// No attempt starts after this much time spent retrying
const RETRY_BUDGET: Duration = Duration::from_secs(120);

/// Each delay is drawn from `[d * (1 - JITTER), d * (1 + JITTER)]`
const JITTER: f64 = 0.1;

/// Doubling delays with jitter, bounded by a total time budget.
#[derive(Debug)]
pub struct Backoff {
    next_delay: Duration,
    jitter: f64,
    started: Instant,
}

impl Backoff {
    /// Backoff used for every provider HTTP call.
    #[must_use]
    pub fn for_provider_calls() -> Self {
        Self {
            next_delay: FIRST_DELAY,
            jitter: JITTER,
            started: Instant::now(),
        }
    }

    /// Same schedule with exact delays.
    #[must_use]
    pub fn without_jitter(mut self) -> Self {
        self.jitter = 0.0;
        self
    }

    /// Delay before the next attempt, or `None` once the budget is spent.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.started.elapsed() >= RETRY_BUDGET {
            return None;
        }
        let base = self.next_delay;
        self.next_delay = (base * 2).min(DELAY_CAP);
        Some(self.jittered(base))
    }

    fn jittered(&self, base: Duration) -> Duration {
        if self.jitter == 0.0 {
            return base;
        }
        let ratio = rand::rng().random_range(1.0 - self.jitter..=1.0 + self.jitter);
        base.mul_f64(ratio)
    }
}

/// Retry a provider call with exponential backoff.
///
/// Retries while [`ProviderError::is_transient`] holds and the backoff budget
/// is not exhausted; the last error is returned otherwise.
///
/// # Errors
///
/// Returns the first non-transient error, or the last transient error once
/// the backoff is exhausted.
pub async fn retry_provider_call<T, F, Fut>(
    mut operation: F,
    operation_name: &str,
) -> ProviderResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ProviderResult<T>>,
{
    let mut backoff = Backoff::for_provider_calls();
    let start_time = Instant::now();
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(
                        operation = operation_name,
                        attempt = attempt,
                        elapsed = ?start_time.elapsed(),
                        "Provider call succeeded after retries"
                    );
                }
                return Ok(value);
            }
            Err(e) => {
                if !e.is_transient() {
                    return Err(e);
                }

                if let Some(duration) = backoff.next_delay() {
                    warn!(
                        operation = operation_name,
                        attempt = attempt,
                        retry_after = ?duration,
                        error = %e,
                        "Retryable provider error, will retry"
                    );
                    tokio::time::sleep(duration).await;
                } else {
                    error!(
                        operation = operation_name,
                        attempt = attempt,
                        elapsed = ?start_time.elapsed(),
                        error = %e,
                        "Backoff exhausted, giving up"
                    );
                    return Err(e);
                }
            }
        }
    }
}

/// Shorthand used by clients to report a failed status.
pub(crate) fn status_error(method: &str, url: &str, status: StatusCode, body: String) -> ProviderError {
    ProviderError::Http {
        method: method.to_string(),
        url: url.to_string(),
        status: status.as_u16(),
        body,
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod retry_tests;
