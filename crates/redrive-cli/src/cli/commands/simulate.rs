//! `redrive simulate` – drive the configured strategy with synthetic faults.

use anyhow::{Context, Result};
use redrive_core::classify::{MatchMode, Rule};
use redrive_core::config;
use redrive_core::fault::{Fault, FaultKind};
use redrive_core::run::{run_with_retry, RunError};
use redrive_core::strategy::GiveUpReason;

/// Synthetic fault kinds for the simulation.
static TRANSIENT: FaultKind = FaultKind::new("transient");
static THROTTLE: FaultKind = FaultKind::subkind("throttle", &TRANSIENT);

#[derive(Debug, Default)]
struct Totals {
    succeeded: u32,
    non_retryable: u32,
    attempts_exhausted: u32,
    budget_exhausted: u32,
    attempts: u64,
}

pub fn run_simulate(ops: u32, fail_rate: f64, throttle_rate: f64, seed: Option<u64>) -> Result<()> {
    let cfg = config::load_or_init()?;
    tracing::debug!("loaded config: {:?}", cfg);

    let rules = vec![
        Rule::new(MatchMode::Exact, &THROTTLE).throttling(),
        Rule::new(MatchMode::InstanceOf, &TRANSIENT),
    ];
    let strategy = cfg
        .build_strategy(rules)
        .context("building retry strategy from config")?;

    let mut rng = match seed {
        Some(seed) => fastrand::Rng::with_seed(seed),
        None => fastrand::Rng::new(),
    };

    let mut totals = Totals::default();
    for _ in 0..ops {
        let mut attempts = 0u64;
        let result = run_with_retry(&strategy, None, || {
            attempts += 1;
            if rng.f64() < fail_rate {
                if rng.f64() < throttle_rate {
                    Err(Fault::new(&THROTTLE, "simulated throttle"))
                } else {
                    Err(Fault::new(&TRANSIENT, "simulated transient failure"))
                }
            } else {
                Ok(())
            }
        });
        totals.attempts += attempts;
        match result {
            Ok(()) => totals.succeeded += 1,
            Err(RunError::GaveUp { reason, .. }) => match reason {
                GiveUpReason::NonRetryable(_) => totals.non_retryable += 1,
                GiveUpReason::MaxAttemptsExhausted(_) => totals.attempts_exhausted += 1,
                GiveUpReason::RetryBudgetExhausted(_) => totals.budget_exhausted += 1,
            },
            Err(RunError::Cancelled) => unreachable!("simulation runs without an abort token"),
        }
    }

    println!(
        "  {:>10}  {:>10}  {:>10}  {:>10}  {:>10}",
        "Succeeded", "NoRetry", "MaxAtt", "Budget", "Attempts"
    );
    println!(
        "  {}  {}  {}  {}  {}",
        "----------", "----------", "----------", "----------", "----------"
    );
    println!(
        "  {:>10}  {:>10}  {:>10}  {:>10}  {:>10}",
        totals.succeeded,
        totals.non_retryable,
        totals.attempts_exhausted,
        totals.budget_exhausted,
        totals.attempts
    );
    println!(
        "Bucket level after run: {}/{}",
        strategy.bucket().level(),
        strategy.bucket().capacity()
    );
    Ok(())
}
