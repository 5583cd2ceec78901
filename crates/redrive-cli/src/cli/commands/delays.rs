//! `redrive delays` – print a backoff table.

use std::time::Duration;

use anyhow::Result;
use redrive_core::backoff::BackoffStrategy;

use crate::cli::BackoffKind;

pub fn run_delays(kind: BackoffKind, base_ms: u64, max_ms: u64, attempts: u32) -> Result<()> {
    let base = Duration::from_millis(base_ms);
    let max = Duration::from_millis(max_ms);
    let strategy = match kind {
        BackoffKind::Exp => BackoffStrategy::ExponentialJitter { base, max },
        BackoffKind::ExpNoJitter => BackoffStrategy::ExponentialNoJitter { base, max },
        BackoffKind::Fixed => BackoffStrategy::FixedJitter { max },
        BackoffKind::Immediate => BackoffStrategy::Immediate,
    };

    println!("  {:>7}  {:>12}", "Attempt", "Delay(ms)");
    println!("  {}  {}", "-------", "------------");
    for attempt in 1..=attempts.max(1) {
        let delay = strategy.compute_delay(attempt);
        println!("  {:>7}  {:>12}", attempt, delay.as_millis());
    }
    Ok(())
}
