//! Integration test: one shared strategy driving many concurrent operations.
//!
//! Exercises the token bucket under thread contention and the full retry loop
//! end to end, the way a client with many parallel requests would share a
//! single built strategy.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use redrive_core::backoff::BackoffStrategy;
use redrive_core::fault::{Fault, FaultKind};
use redrive_core::run::{run_with_retry, RunError};
use redrive_core::strategy::{Decision, GiveUpReason, RetryStrategy};

static TRANSIENT: FaultKind = FaultKind::new("transient");
static THROTTLE: FaultKind = FaultKind::subkind("throttle", &TRANSIENT);

#[test]
fn shared_bucket_never_over_grants_across_threads() {
    // Capacity 40 at cost 1: across all threads at most 40 retries may be
    // admitted before any success refills the bucket.
    let strategy = Arc::new(
        RetryStrategy::standard()
            .max_attempts(u32::MAX)
            .backoff(BackoffStrategy::Immediate)
            .bucket_capacity(40)
            .bucket_retry_cost(1)
            .retry_on_instance_of(&TRANSIENT)
            .build()
            .unwrap(),
    );

    let admitted = Arc::new(AtomicU32::new(0));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let strategy = Arc::clone(&strategy);
            let admitted = Arc::clone(&admitted);
            std::thread::spawn(move || {
                for attempt in 1..=20 {
                    match strategy.should_retry(attempt, &Fault::new(&TRANSIENT, "flaky")) {
                        Decision::Retry { .. } => {
                            admitted.fetch_add(1, Ordering::Relaxed);
                        }
                        Decision::GiveUp(GiveUpReason::RetryBudgetExhausted(_)) => {}
                        other => panic!("unexpected decision: {other:?}"),
                    }
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(admitted.load(Ordering::Relaxed), 40);
    assert_eq!(strategy.bucket().level(), 0);
}

#[test]
fn successes_restore_budget_for_later_operations() {
    let strategy = RetryStrategy::standard()
        .max_attempts(4)
        .backoff(BackoffStrategy::Immediate)
        .bucket_capacity(10)
        .bucket_retry_cost(5)
        .bucket_success_refill(5)
        .retry_on_instance_of(&TRANSIENT)
        .build()
        .unwrap();

    // Two operations each fail once then succeed; each drains 5 and restores 5.
    for _ in 0..2 {
        let mut calls = 0;
        let result = run_with_retry(&strategy, None, || {
            calls += 1;
            if calls == 1 {
                Err(Fault::new(&TRANSIENT, "flaky"))
            } else {
                Ok(())
            }
        });
        assert!(result.is_ok());
    }
    assert_eq!(strategy.bucket().level(), 10);
}

#[test]
fn parallel_retry_loops_share_one_strategy() {
    let strategy = Arc::new(
        RetryStrategy::legacy()
            .max_attempts(5)
            .backoff(BackoffStrategy::FixedJitter {
                max: Duration::from_millis(2),
            })
            .retry_on_instance_of(&TRANSIENT)
            .build()
            .unwrap(),
    );

    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let strategy = Arc::clone(&strategy);
            std::thread::spawn(move || {
                let mut calls = 0u32;
                run_with_retry(&strategy, None, || {
                    calls += 1;
                    // Workers need a different number of attempts to succeed.
                    if calls <= worker % 4 {
                        Err(Fault::new(&TRANSIENT, "flaky"))
                    } else {
                        Ok(worker)
                    }
                })
            })
        })
        .collect();

    for (worker, h) in handles.into_iter().enumerate() {
        let result = h.join().unwrap();
        assert_eq!(result.unwrap(), worker as u32);
    }
}

#[test]
fn throttling_operations_leave_the_legacy_bucket_untouched() {
    let strategy = RetryStrategy::legacy()
        .max_attempts(3)
        .backoff(BackoffStrategy::Immediate)
        .throttling_backoff(BackoffStrategy::Immediate)
        .classify_rule(
            redrive_core::classify::Rule::new(redrive_core::classify::MatchMode::Exact, &THROTTLE)
                .throttling(),
        )
        .build()
        .unwrap();

    let level = strategy.bucket().level();
    let err = run_with_retry::<(), _>(&strategy, None, || Err(Fault::new(&THROTTLE, "slow down")))
        .unwrap_err();
    assert!(matches!(
        err,
        RunError::GaveUp {
            reason: GiveUpReason::MaxAttemptsExhausted(_),
            ..
        }
    ));
    assert_eq!(strategy.bucket().level(), level);
}
