//! Retry strategy orchestrator.
//!
//! A built strategy is an immutable configuration bundle (attempt ceiling,
//! backoff selection, classifier, token bucket) with one decision entry
//! point: after each failed attempt the caller asks [`RetryStrategy::should_retry`]
//! and either waits the returned delay and tries again, or surfaces the
//! give-up reason. The caller owns the loop; the strategy only decides timing
//! and admission, so one instance can serve many concurrent operations.

mod adaptive;
mod builder;

pub use builder::{AdaptiveBuilder, ConfigError, LegacyBuilder, StandardBuilder};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::backoff::BackoffStrategy;
use crate::bucket::TokenBucket;
use crate::classify::{Classification, Classifier};
use crate::fault::Fault;

use adaptive::ThrottleRate;

/// Predicate promoting a retryable fault to the throttling path.
pub type ThrottlePredicate = Arc<dyn Fn(&Fault) -> bool + Send + Sync>;

/// Outcome of consulting the strategy after a failed attempt.
#[derive(Debug)]
pub enum Decision {
    /// Wait `delay`, then try again. `debited` is the number of tokens taken
    /// from the bucket for this admission; if the retry is abandoned (e.g.
    /// cancelled mid-wait) pass it to [`RetryStrategy::refund`].
    Retry { delay: Duration, debited: u32 },
    /// Stop retrying; the reason carries the last fault.
    GiveUp(GiveUpReason),
}

/// Why the strategy gave up.
#[derive(Debug, Clone)]
pub enum GiveUpReason {
    /// The classifier ruled the fault out.
    NonRetryable(Fault),
    /// The attempt counter hit the configured ceiling.
    MaxAttemptsExhausted(Fault),
    /// The circuit breaker denied the retry budget.
    RetryBudgetExhausted(Fault),
}

impl GiveUpReason {
    /// The underlying fault that triggered the give-up.
    pub fn fault(&self) -> &Fault {
        match self {
            GiveUpReason::NonRetryable(f)
            | GiveUpReason::MaxAttemptsExhausted(f)
            | GiveUpReason::RetryBudgetExhausted(f) => f,
        }
    }
}

impl fmt::Display for GiveUpReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GiveUpReason::NonRetryable(fault) => write!(f, "fault is not retryable: {}", fault),
            GiveUpReason::MaxAttemptsExhausted(fault) => {
                write!(f, "no attempts remain; last fault: {}", fault)
            }
            GiveUpReason::RetryBudgetExhausted(fault) => {
                write!(f, "retry budget exhausted; last fault: {}", fault)
            }
        }
    }
}

/// Shared configuration driving every variant's decisions.
pub(crate) struct Core {
    pub(crate) max_attempts: u32,
    pub(crate) backoff: BackoffStrategy,
    pub(crate) throttling_backoff: Option<BackoffStrategy>,
    pub(crate) classifier: Classifier,
    pub(crate) bucket: TokenBucket,
    pub(crate) treat_as_throttling: Option<ThrottlePredicate>,
    /// Whether throttling faults debit the bucket (standard yes, legacy no).
    pub(crate) debit_throttling: bool,
}

impl Core {
    /// Classification with the `treat_as_throttling` promotion applied.
    fn effective_classification(&self, fault: &Fault) -> Classification {
        let class = self.classifier.classify(fault);
        if class == Classification::Retryable {
            if let Some(pred) = &self.treat_as_throttling {
                if pred(fault) {
                    return Classification::RetryableThrottling;
                }
            }
        }
        class
    }

    fn backoff_for(&self, throttled: bool) -> BackoffStrategy {
        if throttled {
            self.throttling_backoff.unwrap_or(self.backoff)
        } else {
            self.backoff
        }
    }

    fn decide(&self, attempt: u32, fault: &Fault) -> Decision {
        if attempt >= self.max_attempts {
            tracing::debug!(attempt, max_attempts = self.max_attempts, "attempts exhausted");
            return Decision::GiveUp(GiveUpReason::MaxAttemptsExhausted(fault.clone()));
        }

        let throttled = match self.effective_classification(fault) {
            Classification::NonRetryable => {
                tracing::debug!(%fault, "fault classified non-retryable");
                return Decision::GiveUp(GiveUpReason::NonRetryable(fault.clone()));
            }
            Classification::RetryableThrottling => true,
            Classification::Retryable => false,
        };

        let debited = if throttled && !self.debit_throttling {
            0
        } else {
            self.bucket.retry_cost()
        };
        if debited > 0 && !self.bucket.try_acquire(debited) {
            tracing::warn!(%fault, level = self.bucket.level(), "circuit breaker denied retry");
            return Decision::GiveUp(GiveUpReason::RetryBudgetExhausted(fault.clone()));
        }

        // Delay is computed for the attempt about to run; attempt 2 is the
        // first one that can wait.
        let delay = self.backoff_for(throttled).compute_delay(attempt + 1);
        tracing::debug!(attempt, throttled, ?delay, "retry scheduled");
        Decision::Retry { delay, debited }
    }

    fn on_success(&self) {
        self.bucket.release(self.bucket.success_refill());
    }
}

/// Standard strategy: all retryable faults share one backoff and one token
/// cost; the breaker is on by default.
pub struct Standard {
    core: Core,
}

/// Legacy strategy: throttling faults get their own backoff and do not debit
/// the token bucket.
pub struct Legacy {
    core: Core,
}

/// Adaptive strategy: legacy policy plus delay scaling driven by the
/// observed throttling rate.
pub struct Adaptive {
    core: Core,
    rate: ThrottleRate,
}

/// A built, shareable retry strategy.
pub enum RetryStrategy {
    Standard(Standard),
    Legacy(Legacy),
    Adaptive(Adaptive),
}

impl fmt::Debug for RetryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryStrategy::Standard(_) => f.write_str("RetryStrategy::Standard"),
            RetryStrategy::Legacy(_) => f.write_str("RetryStrategy::Legacy"),
            RetryStrategy::Adaptive(_) => f.write_str("RetryStrategy::Adaptive"),
        }
    }
}

impl RetryStrategy {
    pub fn standard() -> StandardBuilder {
        StandardBuilder::new()
    }

    pub fn legacy() -> LegacyBuilder {
        LegacyBuilder::new()
    }

    pub fn adaptive() -> AdaptiveBuilder {
        AdaptiveBuilder::new()
    }

    fn core(&self) -> &Core {
        match self {
            RetryStrategy::Standard(s) => &s.core,
            RetryStrategy::Legacy(s) => &s.core,
            RetryStrategy::Adaptive(s) => &s.core,
        }
    }

    /// Decide whether to retry after `attempt` (1-based, counting the initial
    /// attempt) failed with `fault`.
    pub fn should_retry(&self, attempt: u32, fault: &Fault) -> Decision {
        match self {
            RetryStrategy::Standard(s) => s.core.decide(attempt, fault),
            RetryStrategy::Legacy(s) => s.core.decide(attempt, fault),
            RetryStrategy::Adaptive(s) => s.should_retry(attempt, fault),
        }
    }

    /// Notify the strategy that an operation ultimately succeeded, crediting
    /// the token bucket.
    pub fn on_success(&self) {
        match self {
            RetryStrategy::Standard(s) => s.core.on_success(),
            RetryStrategy::Legacy(s) => s.core.on_success(),
            RetryStrategy::Adaptive(s) => s.on_success(),
        }
    }

    /// Return tokens debited for a retry that was abandoned before running.
    pub fn refund(&self, debited: u32) {
        self.core().bucket.release(debited);
    }

    pub fn max_attempts(&self) -> u32 {
        self.core().max_attempts
    }

    /// The embedded circuit-breaker bucket.
    pub fn bucket(&self) -> &TokenBucket {
        &self.core().bucket
    }
}

impl Adaptive {
    fn should_retry(&self, attempt: u32, fault: &Fault) -> Decision {
        let class = self.core.effective_classification(fault);
        if class != Classification::NonRetryable {
            self.rate
                .observe(class == Classification::RetryableThrottling);
        }
        match self.core.decide(attempt, fault) {
            Decision::Retry { delay, debited } => {
                let throttled = class == Classification::RetryableThrottling;
                let cap = self.core.backoff_for(throttled).max_delay();
                let scaled = delay.saturating_mul(self.rate.multiplier());
                let delay = cap.map_or(scaled, |c| scaled.min(c));
                Decision::Retry { delay, debited }
            }
            give_up => give_up,
        }
    }

    fn on_success(&self) {
        self.rate.observe(false);
        self.core.on_success();
    }
}

impl Standard {
    pub(crate) fn from_core(core: Core) -> Self {
        Self { core }
    }
}

impl Legacy {
    pub(crate) fn from_core(core: Core) -> Self {
        Self { core }
    }
}

impl Adaptive {
    pub(crate) fn from_core(core: Core) -> Self {
        Self {
            core,
            rate: ThrottleRate::default(),
        }
    }
}
