//! Bounded retry with exponential backoff for outgoing requests.
//!
//! Retried: timeouts, connection failures, requests dropped mid-flight,
//! 5xx, 408 and 429.
//! Not retried: other 4xx responses, request-building and redirect errors.

use std::future::Future;
use std::time::Duration;

use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_RETRIES: u32 = 5;
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 200;
pub const DEFAULT_MAX_DELAY_MS: u64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts after the first one.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on every following one.
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay_ms: DEFAULT_INITIAL_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
        }
    }
}

impl RetryConfig {
    pub fn new(max_retries: u32, initial_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_retries,
            initial_delay_ms,
            max_delay_ms,
        }
    }

    /// Delay to wait after failed attempt number `attempt` (0-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt);
        let delay_ms = self.initial_delay_ms.saturating_mul(factor);
        Duration::from_millis(delay_ms.min(self.max_delay_ms))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    NoRetry,
}

pub fn is_retryable_error(error: &reqwest::Error) -> RetryDecision {
    if error.is_builder() || error.is_redirect() {
        return RetryDecision::NoRetry;
    }

    // A reset or closed connection while sending or awaiting the response
    // surfaces as a request or body error rather than a connect error.
    if error.is_timeout() || error.is_connect() || error.is_request() || error.is_body() {
        return RetryDecision::Retry;
    }

    match error.status() {
        Some(status) => is_retryable_status(status),
        None => RetryDecision::NoRetry,
    }
}

pub fn is_retryable_status(status: StatusCode) -> RetryDecision {
    if status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
    {
        RetryDecision::Retry
    } else {
        RetryDecision::NoRetry
    }
}

/// Run `operation` until it yields a non-retryable outcome or the retry
/// budget is spent. The last response or error is returned as-is, so a
/// final 5xx comes back as `Ok` and the caller decides what to do with it.
pub async fn with_retry<F, Fut>(config: &RetryConfig, operation: F) -> Result<Response, reqwest::Error>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<Response, reqwest::Error>>,
{
    let mut attempt = 0;

    loop {
        let budget_left = attempt < config.max_retries;

        match operation().await {
            Ok(response) => {
                let status = response.status();
                if !budget_left || is_retryable_status(status) == RetryDecision::NoRetry {
                    if attempt > 0 {
                        tracing::info!(attempt, %status, "request finished after retries");
                    }
                    return Ok(response);
                }
                tracing::warn!(
                    %status,
                    "retryable status on attempt {} of {}",
                    attempt + 1,
                    config.max_retries + 1
                );
            }
            Err(e) => {
                if !budget_left || is_retryable_error(&e) == RetryDecision::NoRetry {
                    if budget_left {
                        tracing::debug!(error = %e, "non-retryable request error");
                    } else {
                        tracing::error!("all {} attempts failed", config.max_retries + 1);
                    }
                    return Err(e);
                }
                tracing::warn!(
                    error = %e,
                    "retryable error on attempt {} of {}",
                    attempt + 1,
                    config.max_retries + 1
                );
            }
        }

        let delay = config.delay_for_attempt(attempt);
        tracing::debug!(?delay, "waiting before next attempt");
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
