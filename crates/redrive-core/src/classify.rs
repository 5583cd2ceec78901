//! Classify faults into retryable / throttling / non-retryable.
//!
//! A classifier is an ordered list of rules; each rule pairs a match mode with
//! a target kind. The first matching rule decides the classification, and an
//! unmatched fault is never retried.

use crate::fault::{Fault, FaultKind};

/// High-level classification of a fault for retry purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Safe to retry.
    Retryable,
    /// Safe to retry; the server asked us to slow down.
    RetryableThrottling,
    /// Do not retry.
    NonRetryable,
}

/// How a rule's target kind is tested against a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// The fault's own kind equals the target.
    Exact,
    /// The fault's own kind is the target or a subkind of it.
    InstanceOf,
    /// The fault or its immediate cause equals the target.
    CauseExact,
    /// The fault or its immediate cause is the target or a subkind.
    CauseInstanceOf,
    /// Any link in the cause chain equals the target.
    RootCause,
    /// Any link in the cause chain is the target or a subkind.
    RootCauseInstanceOf,
}

/// A single classification rule.
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    mode: MatchMode,
    target: &'static FaultKind,
    throttling: bool,
}

impl Rule {
    pub fn new(mode: MatchMode, target: &'static FaultKind) -> Self {
        Self {
            mode,
            target,
            throttling: false,
        }
    }

    /// Mark matches of this rule as throttling rather than plain retryable.
    pub fn throttling(mut self) -> Self {
        self.throttling = true;
        self
    }

    fn matches(&self, fault: &Fault) -> bool {
        let target = self.target;
        match self.mode {
            MatchMode::Exact => fault.kind() == target,
            MatchMode::InstanceOf => fault.kind().is_a(target),
            MatchMode::CauseExact => {
                fault.kind() == target || fault.cause().is_some_and(|c| c.kind() == target)
            }
            MatchMode::CauseInstanceOf => {
                fault.kind().is_a(target) || fault.cause().is_some_and(|c| c.kind().is_a(target))
            }
            MatchMode::RootCause => fault.chain().any(|f| f.kind() == target),
            MatchMode::RootCauseInstanceOf => fault.chain().any(|f| f.kind().is_a(target)),
        }
    }
}

/// Ordered rule list; first match wins.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    rules: Vec<Rule>,
}

impl Classifier {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn push(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn classify(&self, fault: &Fault) -> Classification {
        for rule in &self.rules {
            if rule.matches(fault) {
                return if rule.throttling {
                    Classification::RetryableThrottling
                } else {
                    Classification::Retryable
                };
            }
        }
        Classification::NonRetryable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static IO: FaultKind = FaultKind::new("io");
    static SOCKET: FaultKind = FaultKind::subkind("socket", &IO);
    static CONNECT: FaultKind = FaultKind::subkind("connect", &SOCKET);
    static WRAPPER: FaultKind = FaultKind::new("wrapper");
    static THROTTLE: FaultKind = FaultKind::new("throttle");

    #[test]
    fn exact_does_not_match_subkinds() {
        let c = Classifier::new(vec![Rule::new(MatchMode::Exact, &SOCKET)]);
        assert_eq!(
            c.classify(&Fault::new(&SOCKET, "reset")),
            Classification::Retryable
        );
        // CONNECT is a subkind of SOCKET but Exact requires identity.
        assert_eq!(
            c.classify(&Fault::new(&CONNECT, "refused")),
            Classification::NonRetryable
        );
    }

    #[test]
    fn instance_of_matches_subkinds() {
        let c = Classifier::new(vec![Rule::new(MatchMode::InstanceOf, &IO)]);
        assert_eq!(
            c.classify(&Fault::new(&CONNECT, "refused")),
            Classification::Retryable
        );
    }

    #[test]
    fn cause_exact_looks_one_level_deep_only() {
        let c = Classifier::new(vec![Rule::new(MatchMode::CauseExact, &SOCKET)]);
        let one_deep = Fault::with_cause(&WRAPPER, "wrapped", Fault::new(&SOCKET, "reset"));
        assert_eq!(c.classify(&one_deep), Classification::Retryable);

        // Cause is CONNECT, a subkind of SOCKET, but CauseExact requires identity.
        let subkind_cause = Fault::with_cause(&WRAPPER, "wrapped", Fault::new(&CONNECT, "refused"));
        assert_eq!(c.classify(&subkind_cause), Classification::NonRetryable);

        // Two levels deep is out of reach for the immediate-cause modes.
        let two_deep = Fault::with_cause(
            &WRAPPER,
            "outer",
            Fault::with_cause(&WRAPPER, "inner", Fault::new(&SOCKET, "reset")),
        );
        assert_eq!(c.classify(&two_deep), Classification::NonRetryable);
    }

    #[test]
    fn cause_instance_of_accepts_subkind_cause() {
        let c = Classifier::new(vec![Rule::new(MatchMode::CauseInstanceOf, &IO)]);
        let fault = Fault::with_cause(&WRAPPER, "wrapped", Fault::new(&CONNECT, "refused"));
        assert_eq!(c.classify(&fault), Classification::Retryable);
    }

    #[test]
    fn root_cause_walks_the_whole_chain() {
        let c = Classifier::new(vec![Rule::new(MatchMode::RootCause, &IO)]);
        let deep = Fault::with_cause(
            &WRAPPER,
            "outer",
            Fault::with_cause(&WRAPPER, "inner", Fault::new(&IO, "broken pipe")),
        );
        assert_eq!(c.classify(&deep), Classification::Retryable);

        // SOCKET at the root is not IO exactly.
        let deep_sub = Fault::with_cause(
            &WRAPPER,
            "outer",
            Fault::with_cause(&WRAPPER, "inner", Fault::new(&SOCKET, "reset")),
        );
        assert_eq!(c.classify(&deep_sub), Classification::NonRetryable);
    }

    #[test]
    fn root_cause_instance_of_accepts_subkinds_anywhere() {
        let c = Classifier::new(vec![Rule::new(MatchMode::RootCauseInstanceOf, &IO)]);
        let deep = Fault::with_cause(
            &WRAPPER,
            "outer",
            Fault::with_cause(&WRAPPER, "inner", Fault::new(&CONNECT, "refused")),
        );
        assert_eq!(c.classify(&deep), Classification::Retryable);
    }

    #[test]
    fn first_matching_rule_wins() {
        let c = Classifier::new(vec![
            Rule::new(MatchMode::Exact, &THROTTLE).throttling(),
            Rule::new(MatchMode::InstanceOf, &THROTTLE),
        ]);
        assert_eq!(
            c.classify(&Fault::new(&THROTTLE, "429")),
            Classification::RetryableThrottling
        );
    }

    #[test]
    fn unmatched_is_non_retryable() {
        let c = Classifier::new(vec![Rule::new(MatchMode::InstanceOf, &IO)]);
        assert_eq!(
            c.classify(&Fault::new(&THROTTLE, "429")),
            Classification::NonRetryable
        );
        assert_eq!(
            Classifier::default().classify(&Fault::new(&IO, "any")),
            Classification::NonRetryable
        );
    }
}
