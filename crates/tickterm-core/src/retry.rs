//! Bounded retry policy applied by the orchestrator to transient fetch failures.

use std::time::Duration;

use crate::data_source::FetchError;

/// Backoff strategy between attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    Fixed {
        delay: Duration,
    },
    /// `base * factor^attempt`, capped at `max`, optionally with +/- 50% jitter.
    Exponential {
        base: Duration,
        factor: f64,
        max: Duration,
        jitter: bool,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_millis(250),
            factor: 2.0,
            max: Duration::from_secs(4),
            jitter: true,
        }
    }
}

impl Backoff {
    /// Delay before retry number `attempt` (0-based).
    pub fn delay(self, attempt: u32) -> Duration {
        match self {
            Self::Fixed { delay } => delay,
            Self::Exponential {
                base,
                factor,
                max,
                jitter,
            } => {
                let scale = factor.powi(attempt as i32);
                let seconds = (base.as_secs_f64() * scale).min(max.as_secs_f64());
                let delay = Duration::from_secs_f64(seconds);

                if !jitter {
                    return delay;
                }

                let half_ms = (delay.as_millis() / 2) as u64;
                let offset = fastrand::u64(0..=half_ms * 2);
                let total_ms = delay.as_millis() as u64 + offset;
                Duration::from_millis(total_ms.saturating_sub(half_ms))
            }
        }
    }
}

/// Retry bounds for `RateLimited` and `Unavailable` fetch failures.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Retries after the first attempt; total attempts = `max_retries + 1`.
    pub max_retries: u32,
    pub backoff: Backoff,
    /// Ceiling for provider-supplied retry-after hints.
    pub max_hint: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff: Backoff::default(),
            max_hint: Duration::from_secs(10),
        }
    }
}

impl RetryConfig {
    pub fn exponential(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    pub fn fixed(delay: Duration, max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff: Backoff::Fixed { delay },
            ..Self::default()
        }
    }

    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Whether `error` permits another attempt after `attempt` retries so far.
    pub fn should_retry(&self, error: &FetchError, attempt: u32) -> bool {
        error.retryable() && attempt < self.max_retries
    }

    /// Delay before retry `attempt`; a retry-after hint wins over the backoff.
    pub fn delay_for(&self, error: &FetchError, attempt: u32) -> Duration {
        match error.retry_after() {
            Some(hint) => hint.min(self.max_hint),
            None => self.backoff.delay(attempt),
        }
    }
}
