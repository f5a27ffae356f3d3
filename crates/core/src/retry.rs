//! Retry policy with jittered exponential backoff
//!
//! A single parameterized primitive shared by part uploads, range
//! downloads and per-item directory copies, so transient-failure behavior
//! is consistent and testable in one place. Only errors classified as
//! retryable by [`Error::is_retryable`] are retried; fatal errors surface
//! immediately.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff() -> u64 {
    100
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_max_backoff() -> u64 {
    10_000
}

fn default_jitter() -> f64 {
    0.25
}

/// Retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts (first try included)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial backoff duration in milliseconds
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Backoff multiplier applied per attempt
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Maximum backoff duration in milliseconds
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,

    /// Jitter as a fraction of the computed delay, in `[0, 1]`
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            multiplier: default_multiplier(),
            max_backoff_ms: default_max_backoff(),
            jitter: default_jitter(),
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries. Used for single-shot probes.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Backoff delay before retrying after the given failed attempt
    /// (1-based). Exponential with cap, spread by the jitter fraction.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        let base = self.initial_backoff_ms as f64 * self.multiplier.powi(exp as i32);
        let capped = base.min(self.max_backoff_ms as f64);
        let jitter = self.jitter.clamp(0.0, 1.0);
        let factor = if jitter > 0.0 {
            rand::rng().random_range(1.0 - jitter..=1.0 + jitter)
        } else {
            1.0
        };
        Duration::from_millis((capped * factor) as u64)
    }

    /// Run `op` until it succeeds, fails fatally, or the attempt budget
    /// is exhausted. The last transient error becomes the terminal error.
    pub async fn run<T, F, Fut>(&self, what: &str, op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.run_observed(what, op, |_| {}).await
    }

    /// Like [`run`](Self::run), but invokes `on_transient` for every
    /// transient failure observed, including the final one. The download
    /// engine feeds its throttling signal through this hook.
    pub async fn run_observed<T, F, Fut, O>(&self, what: &str, mut op: F, on_transient: O) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
        O: Fn(&Error),
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() => {
                    on_transient(&err);
                    if attempt >= attempts {
                        tracing::warn!("{what}: giving up after {attempt} attempt(s): {err}");
                        return Err(err);
                    }
                    let delay = self.backoff_for(attempt);
                    tracing::debug!(
                        "{what}: attempt {attempt}/{attempts} failed ({err}), retrying in {delay:?}"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Wrap a network call in a per-call timeout, mapping elapse to the
/// retryable [`Error::Timeout`].
pub async fn with_timeout<T>(
    what: &str,
    timeout: Duration,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout(format!("{what} exceeded {timeout:?}"))),
    }
}
