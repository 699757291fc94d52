//! Retry policy for calls that can fail transiently.

use carelink_log::debug;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use crate::error::PaymentError;

/// Retry configuration.
///
/// `max_retries` counts attempts after the first one, so an operation runs at
/// most `max_retries + 1` times.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,
    /// Backoff strategy.
    pub backoff: BackoffStrategy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::linear(2, Duration::from_millis(1000))
    }
}

impl RetryConfig {
    /// Linear backoff: retry `k` waits `step * k`.
    pub fn linear(max_retries: u32, step: Duration) -> Self {
        Self {
            max_retries,
            backoff: BackoffStrategy::Linear {
                step,
                max: Duration::from_secs(30),
            },
        }
    }

    /// Retry without waiting.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff: BackoffStrategy::None,
        }
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay_before_retry(&self, retry: u32) -> Duration {
        self.backoff.delay_before_retry(retry)
    }

    /// Run `op` until it succeeds, fails permanently, or retries run out.
    ///
    /// `op` receives the 1-based attempt number.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        let mut attempt = 1;

        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_retryable() => {
                    return Err(RetryError::Aborted {
                        attempts: attempt,
                        error: e,
                    });
                }
                Err(e) => {
                    let retry = attempt;
                    if retry > self.max_retries {
                        return Err(RetryError::Exhausted {
                            attempts: attempt,
                            last: e,
                        });
                    }

                    let delay = self.delay_before_retry(retry);
                    debug!(
                        "attempt {} failed ({}), retrying in {}ms",
                        attempt,
                        e,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// How long to wait between attempts.
#[derive(Debug, Clone, PartialEq)]
pub enum BackoffStrategy {
    None,
    /// Delay grows by `step` with each retry, capped at `max`.
    Linear { step: Duration, max: Duration },
}

impl BackoffStrategy {
    /// Delay before retry number `retry` (1-based).
    pub fn delay_before_retry(&self, retry: u32) -> Duration {
        match self {
            Self::None => Duration::ZERO,
            Self::Linear { step, max } => step.saturating_mul(retry.max(1)).min(*max),
        }
    }
}

/// Errors that know whether repeating the call can help.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for PaymentError {
    fn is_retryable(&self) -> bool {
        self.is_transient()
    }
}

/// Why [`RetryConfig::run`] gave up.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryError<E> {
    /// A non-retryable error stopped the loop.
    Aborted { attempts: u32, error: E },
    /// Every allowed attempt failed with a retryable error.
    Exhausted { attempts: u32, last: E },
}

impl<E> RetryError<E> {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Aborted { attempts, .. } | Self::Exhausted { attempts, .. } => *attempts,
        }
    }

    pub fn into_inner(self) -> E {
        match self {
            Self::Aborted { error, .. } => error,
            Self::Exhausted { last, .. } => last,
        }
    }
}
