//! Retry logic for inference requests

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

/// Retry timing
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    pub max_attempts: usize,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    /// Per-attempt timeout is `timeout_factor × current delay`...
    pub timeout_factor: u64,
    /// ...capped at this many milliseconds.
    pub max_timeout_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1_000,
            max_delay_ms: 8_000,
            multiplier: 2.0,
            timeout_factor: 25,
            max_timeout_ms: 60_000,
        }
    }
}

/// Backoff state for one operation
pub struct RetryPolicy {
    config: RetryConfig,
    current_attempt: usize,
    current_delay_ms: u64,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            current_delay_ms: config.initial_delay_ms,
            current_attempt: 0,
            config,
        }
    }

    /// Timeout for the attempt about to start.
    pub fn attempt_timeout(&self) -> Duration {
        let ms = self
            .config
            .timeout_factor
            .saturating_mul(self.current_delay_ms)
            .min(self.config.max_timeout_ms);
        Duration::from_millis(ms)
    }

    /// Record a failed attempt; returns the backoff before the next one, or
    /// `None` once `max_attempts` have been made.
    pub fn next_delay(&mut self) -> Option<Duration> {
        self.current_attempt += 1;
        if self.current_attempt >= self.config.max_attempts {
            return None;
        }

        let delay = Duration::from_millis(self.current_delay_ms);

        self.current_delay_ms = ((self.current_delay_ms as f64) * self.config.multiplier)
            .min(self.config.max_delay_ms as f64) as u64;

        Some(delay)
    }

    /// Failed attempts so far.
    pub fn attempt(&self) -> usize {
        self.current_attempt
    }
}

/// A failed attempt that will be retried
#[derive(Debug, Clone, Copy)]
pub struct RetryAttempt<'a> {
    pub attempt: usize,
    pub delay: Duration,
    pub error: &'a str,
}

/// Why [`with_retry`] gave up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryError<E> {
    /// Not retryable; returned as soon as it happened.
    Fatal(E),
    /// Every attempt failed or timed out.
    Exhausted { attempts: usize, last_error: String },
}

/// Run `operation` under [`RetryConfig`]: each attempt is bounded by the
/// policy's timeout, timeouts and errors accepted by `is_retryable` are
/// retried after a backoff, anything else is returned immediately.
pub async fn with_retry<F, Fut, T, E>(
    mut operation: F,
    config: &RetryConfig,
    is_retryable: impl Fn(&E) -> bool,
    mut on_retry: impl FnMut(RetryAttempt<'_>),
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut policy = RetryPolicy::new(config.clone());

    loop {
        let timeout = policy.attempt_timeout();
        let error = match tokio::time::timeout(timeout, operation()).await {
            Ok(Ok(result)) => return Ok(result),
            Ok(Err(e)) if !is_retryable(&e) => return Err(RetryError::Fatal(e)),
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("request timed out after {}ms", timeout.as_millis()),
        };

        if let Some(delay) = policy.next_delay() {
            warn!(
                attempt = policy.attempt(),
                delay_ms = delay.as_millis(),
                error = %error,
                "Request failed, retrying"
            );
            on_retry(RetryAttempt {
                attempt: policy.attempt(),
                delay,
                error: &error,
            });
            tokio::time::sleep(delay).await;
        } else {
            debug!(attempts = policy.attempt(), error = %error, "Request failed after all retries");
            return Err(RetryError::Exhausted {
                attempts: policy.attempt(),
                last_error: error,
            });
        }
    }
}
