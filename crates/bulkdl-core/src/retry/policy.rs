use rand::Rng;
use std::time::Duration;

use crate::config::{bounded_secs, RetryConfig, MAX_WAIT};

/// Largest accepted jitter ratio (+100%).
pub const MAX_JITTER: f64 = 1.0;

/// Base delay used when a configured one is unusable.
const FALLBACK_BASE_DELAY: Duration = Duration::from_secs(1);

/// High-level classification of a failed attempt for retry purposes.
///
/// Callers map HTTP status codes, curl errors, or IO failures into these kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Operation timed out (connect/read).
    Timeout,
    /// Server asked us to slow down (429, 503).
    Throttled,
    /// Network-level failure (connection reset, refused, DNS).
    Connection,
    /// HTTP status that is retryable but not strictly throttling (5xx).
    Http5xx(u16),
    /// Anything else. Never retried.
    Other,
}

impl ErrorKind {
    pub fn is_retryable(self) -> bool {
        !matches!(self, ErrorKind::Other)
    }
}

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Do not retry this error.
    NoRetry,
    /// Retry after the given delay.
    RetryAfter(Duration),
}

/// Exponential backoff with a ceiling, jitter and a bounded number of tries.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_tries: u32,
    /// Base delay for backoff.
    pub base_delay: Duration,
    /// Upper bound on the exponential part of the delay.
    pub max_delay: Duration,
    /// Upper bound of the random fraction added on top of each delay (0.25 = up to +25%).
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryConfig::default().into()
    }
}

impl From<RetryConfig> for RetryPolicy {
    fn from(cfg: RetryConfig) -> Self {
        Self {
            max_tries: cfg.max_tries.max(1),
            base_delay: bounded_secs(cfg.base_delay_secs).unwrap_or(FALLBACK_BASE_DELAY),
            max_delay: Duration::from_secs(cfg.max_delay_secs).min(MAX_WAIT),
            jitter: clamp_jitter(cfg.jitter),
        }
    }
}

impl RetryPolicy {
    /// Decide whether attempt `attempt` (1-based) should be followed by another one.
    ///
    /// A server rate-limit `hint` is a floor on the wait: the result is never shorter
    /// than the hint, and never shorter than the plain exponential backoff either.
    pub fn decide(&self, attempt: u32, kind: ErrorKind, hint: Option<Duration>) -> RetryDecision {
        if !kind.is_retryable() || attempt >= self.max_tries {
            return RetryDecision::NoRetry;
        }
        let base = self.backoff(attempt);
        let wait = match hint {
            Some(h) => h.max(base),
            None => base,
        };
        RetryDecision::RetryAfter(self.with_jitter(wait))
    }

    /// Plain backoff for `attempt` without jitter: `base * 2^(attempt-1)`, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(exp).min(self.max_delay)
    }

    fn with_jitter(&self, wait: Duration) -> Duration {
        let jitter = clamp_jitter(self.jitter);
        if jitter == 0.0 || wait.is_zero() {
            return wait;
        }
        let fraction = rand::thread_rng().gen_range(0.0..=jitter);
        let extra = Duration::try_from_secs_f64(wait.as_secs_f64() * fraction).unwrap_or(Duration::ZERO);
        wait.saturating_add(extra)
    }
}

/// NaN and negative ratios disable jitter; large ones are capped at [`MAX_JITTER`].
fn clamp_jitter(jitter: f64) -> f64 {
    if jitter > 0.0 {
        jitter.min(MAX_JITTER)
    } else {
        0.0
    }
}
