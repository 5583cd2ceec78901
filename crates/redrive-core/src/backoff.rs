//! Backoff delay strategies.
//!
//! A strategy is a pure function from a 1-based attempt number to a wait
//! duration. The exponential variants wait nothing before the first attempt
//! and then grow as `base * 2^(attempt - 2)`, capped at the configured max.

use std::time::Duration;

/// Effective attempt numbers are capped here so the exponent can never
/// overflow; beyond this the delay stays in the same range.
const ATTEMPT_CEILING: u32 = 30;

/// Stateless backoff delay algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffStrategy {
    /// Uniform random delay in `[0, min(max, base * 2^(attempt-2))]`.
    ExponentialJitter { base: Duration, max: Duration },
    /// Exactly `min(max, base * 2^(attempt-2))`.
    ExponentialNoJitter { base: Duration, max: Duration },
    /// Uniform random delay in `[0, max]` for every attempt.
    FixedJitter { max: Duration },
    /// Always zero.
    Immediate,
}

impl BackoffStrategy {
    /// Default base delay for the exponential strategies (100ms).
    pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(100);
    /// Default delay cap (20s).
    pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(20);

    /// Exponential backoff with full jitter and the default base/cap.
    pub fn default_exponential() -> Self {
        Self::ExponentialJitter {
            base: Self::DEFAULT_BASE_DELAY,
            max: Self::DEFAULT_MAX_DELAY,
        }
    }

    /// Compute the wait before the given 1-based attempt. Attempt 1 (and,
    /// defensively, attempt 0) never waits under the exponential variants.
    pub fn compute_delay(&self, attempt: u32) -> Duration {
        match *self {
            BackoffStrategy::ExponentialJitter { base, max } => {
                jitter(exponential_ceiling(base, max, attempt))
            }
            BackoffStrategy::ExponentialNoJitter { base, max } => {
                exponential_ceiling(base, max, attempt)
            }
            BackoffStrategy::FixedJitter { max } => jitter(max),
            BackoffStrategy::Immediate => Duration::ZERO,
        }
    }

    /// Upper bound this strategy can ever return, if it has one.
    pub fn max_delay(&self) -> Option<Duration> {
        match *self {
            BackoffStrategy::ExponentialJitter { max, .. }
            | BackoffStrategy::ExponentialNoJitter { max, .. }
            | BackoffStrategy::FixedJitter { max } => Some(max),
            BackoffStrategy::Immediate => Some(Duration::ZERO),
        }
    }
}

/// `min(max, base * 2^(attempt-2))`, zero for attempts 0 and 1.
fn exponential_ceiling(base: Duration, max: Duration, attempt: u32) -> Duration {
    if attempt <= 1 {
        return Duration::ZERO;
    }
    let exponent = attempt.min(ATTEMPT_CEILING) - 2;
    base.saturating_mul(1u32 << exponent).min(max)
}

/// Uniform random duration in `[0, upper]`.
fn jitter(upper: Duration) -> Duration {
    if upper.is_zero() {
        return Duration::ZERO;
    }
    let upper_nanos = upper.as_nanos().min(u64::MAX as u128) as u64;
    Duration::from_nanos(fastrand::u64(0..=upper_nanos))
}
