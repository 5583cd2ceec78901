//! Builders for the retry strategy variants.
//!
//! Configuration mistakes are rejected here, at build time, so decision time
//! never fails: a built strategy always returns a `Decision`.

use std::time::Duration;

use crate::backoff::BackoffStrategy;
use crate::bucket::{self, TokenBucket};
use crate::classify::{Classifier, MatchMode, Rule};
use crate::fault::{Fault, FaultKind};

use super::{Adaptive, Core, Legacy, RetryStrategy, Standard, ThrottlePredicate};

/// Invalid builder arguments, reported when the strategy is built.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("max_attempts must be at least 1")]
    ZeroMaxAttempts,
    #[error("bucket retry cost must be at least 1 when the circuit breaker is enabled")]
    ZeroRetryCost,
    #[error("bucket retry cost {cost} exceeds capacity {capacity}")]
    RetryCostExceedsCapacity { cost: u32, capacity: u32 },
    #[error("backoff base delay {base:?} exceeds max delay {max:?}")]
    BaseDelayExceedsMax { base: Duration, max: Duration },
}

/// Common knobs shared by all three variant builders.
struct CommonBuilder {
    max_attempts: Option<u32>,
    backoff: Option<BackoffStrategy>,
    throttling_backoff: Option<BackoffStrategy>,
    classifier: Classifier,
    circuit_breaker: bool,
    capacity: Option<u32>,
    retry_cost: Option<u32>,
    success_refill: Option<u32>,
    treat_as_throttling: Option<ThrottlePredicate>,
}

impl Default for CommonBuilder {
    fn default() -> Self {
        Self {
            max_attempts: None,
            backoff: None,
            throttling_backoff: None,
            classifier: Classifier::default(),
            circuit_breaker: true,
            capacity: None,
            retry_cost: None,
            success_refill: None,
            treat_as_throttling: None,
        }
    }
}

fn validate_backoff(backoff: &BackoffStrategy) -> Result<(), ConfigError> {
    match *backoff {
        BackoffStrategy::ExponentialJitter { base, max }
        | BackoffStrategy::ExponentialNoJitter { base, max }
            if base > max =>
        {
            Err(ConfigError::BaseDelayExceedsMax { base, max })
        }
        _ => Ok(()),
    }
}

impl CommonBuilder {
    fn build_core(self, debit_throttling: bool) -> Result<Core, ConfigError> {
        let max_attempts = self.max_attempts.unwrap_or(3);
        if max_attempts == 0 {
            return Err(ConfigError::ZeroMaxAttempts);
        }

        let backoff = self
            .backoff
            .unwrap_or_else(BackoffStrategy::default_exponential);
        validate_backoff(&backoff)?;
        if let Some(throttling) = &self.throttling_backoff {
            validate_backoff(throttling)?;
        }

        let bucket = if self.circuit_breaker {
            let capacity = self.capacity.unwrap_or(bucket::DEFAULT_CAPACITY);
            let retry_cost = self.retry_cost.unwrap_or(bucket::DEFAULT_RETRY_COST);
            let success_refill = self.success_refill.unwrap_or(bucket::DEFAULT_SUCCESS_REFILL);
            if retry_cost == 0 {
                return Err(ConfigError::ZeroRetryCost);
            }
            // Capacity 0 with a nonzero cost is a deliberately closed breaker,
            // but a cost above a nonzero capacity can never be granted.
            if capacity > 0 && retry_cost > capacity {
                return Err(ConfigError::RetryCostExceedsCapacity {
                    cost: retry_cost,
                    capacity,
                });
            }
            TokenBucket::new(capacity, retry_cost, success_refill)
        } else {
            TokenBucket::disabled()
        };

        Ok(Core {
            max_attempts,
            backoff,
            throttling_backoff: self.throttling_backoff,
            classifier: self.classifier,
            bucket,
            treat_as_throttling: self.treat_as_throttling,
            debit_throttling,
        })
    }
}

macro_rules! common_builder_methods {
    () => {
        /// Maximum attempts, counting the initial one. Default 3.
        pub fn max_attempts(mut self, n: u32) -> Self {
            self.common.max_attempts = Some(n);
            self
        }

        /// Backoff for retryable faults. Default: exponential with full
        /// jitter, 100ms base, 20s cap.
        pub fn backoff(mut self, strategy: BackoffStrategy) -> Self {
            self.common.backoff = Some(strategy);
            self
        }

        /// Enable or disable the token-bucket circuit breaker. Default on.
        pub fn circuit_breaker(mut self, enabled: bool) -> Self {
            self.common.circuit_breaker = enabled;
            self
        }

        /// Bucket capacity. Default 500.
        pub fn bucket_capacity(mut self, capacity: u32) -> Self {
            self.common.capacity = Some(capacity);
            self
        }

        /// Tokens debited per admitted retry. Default 5.
        pub fn bucket_retry_cost(mut self, cost: u32) -> Self {
            self.common.retry_cost = Some(cost);
            self
        }

        /// Tokens credited per successful operation. Default 1.
        pub fn bucket_success_refill(mut self, refill: u32) -> Self {
            self.common.success_refill = Some(refill);
            self
        }

        /// Retry when the fault's kind is exactly `kind`.
        pub fn retry_on(self, kind: &'static FaultKind) -> Self {
            self.classify_rule(Rule::new(MatchMode::Exact, kind))
        }

        /// Retry when the fault's kind is `kind` or a subkind of it.
        pub fn retry_on_instance_of(self, kind: &'static FaultKind) -> Self {
            self.classify_rule(Rule::new(MatchMode::InstanceOf, kind))
        }

        /// Retry when the fault or its immediate cause is exactly `kind`.
        pub fn retry_on_cause(self, kind: &'static FaultKind) -> Self {
            self.classify_rule(Rule::new(MatchMode::CauseExact, kind))
        }

        /// Retry when the fault or its immediate cause is a `kind`.
        pub fn retry_on_cause_instance_of(self, kind: &'static FaultKind) -> Self {
            self.classify_rule(Rule::new(MatchMode::CauseInstanceOf, kind))
        }

        /// Retry when any link of the cause chain is exactly `kind`.
        pub fn retry_on_root_cause(self, kind: &'static FaultKind) -> Self {
            self.classify_rule(Rule::new(MatchMode::RootCause, kind))
        }

        /// Retry when any link of the cause chain is a `kind`.
        pub fn retry_on_root_cause_instance_of(self, kind: &'static FaultKind) -> Self {
            self.classify_rule(Rule::new(MatchMode::RootCauseInstanceOf, kind))
        }

        /// Append an arbitrary classification rule (e.g. a throttling rule).
        pub fn classify_rule(mut self, rule: Rule) -> Self {
            self.common.classifier.push(rule);
            self
        }
    };
}

macro_rules! throttling_builder_methods {
    () => {
        /// Separate backoff for throttling faults. Falls back to the default
        /// backoff when unset.
        pub fn throttling_backoff(mut self, strategy: BackoffStrategy) -> Self {
            self.common.throttling_backoff = Some(strategy);
            self
        }

        /// Promote retryable faults matching `pred` to the throttling path.
        pub fn treat_as_throttling<F>(mut self, pred: F) -> Self
        where
            F: Fn(&Fault) -> bool + Send + Sync + 'static,
        {
            self.common.treat_as_throttling = Some(std::sync::Arc::new(pred));
            self
        }
    };
}

/// Builder for the standard strategy.
#[derive(Default)]
pub struct StandardBuilder {
    common: CommonBuilder,
}

impl StandardBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    common_builder_methods!();

    pub fn build(self) -> Result<RetryStrategy, ConfigError> {
        let core = self.common.build_core(true)?;
        Ok(RetryStrategy::Standard(Standard::from_core(core)))
    }
}

/// Builder for the legacy strategy.
#[derive(Default)]
pub struct LegacyBuilder {
    common: CommonBuilder,
}

impl LegacyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    common_builder_methods!();
    throttling_builder_methods!();

    pub fn build(self) -> Result<RetryStrategy, ConfigError> {
        let core = self.common.build_core(false)?;
        Ok(RetryStrategy::Legacy(Legacy::from_core(core)))
    }
}

/// Builder for the adaptive strategy.
#[derive(Default)]
pub struct AdaptiveBuilder {
    common: CommonBuilder,
}

impl AdaptiveBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    common_builder_methods!();
    throttling_builder_methods!();

    pub fn build(self) -> Result<RetryStrategy, ConfigError> {
        let core = self.common.build_core(false)?;
        Ok(RetryStrategy::Adaptive(Adaptive::from_core(core)))
    }
}
