//! Retry loop: run a closure until success, give-up, or cancellation.
//!
//! The strategy only decides; this loop owns the attempt counter, the backoff
//! sleep, and the abort check. The abort token is the same shared
//! `Arc<AtomicBool>` pattern used for job control: set it from another thread
//! and the loop stops promptly, even mid-wait.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::fault::Fault;
use crate::strategy::{Decision, GiveUpReason, RetryStrategy};

/// Upper bound on a single sleep slice so abort requests interrupt long
/// backoff waits promptly.
const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// Terminal outcome of a retried operation that never succeeded.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// The abort token was set before or during a backoff wait.
    #[error("operation cancelled")]
    Cancelled,
    /// The strategy decided to stop.
    #[error("giving up after {attempts} attempts: {reason}")]
    GaveUp { attempts: u32, reason: GiveUpReason },
}

impl RunError {
    /// The last underlying fault, when the strategy gave up.
    pub fn fault(&self) -> Option<&Fault> {
        match self {
            RunError::Cancelled => None,
            RunError::GaveUp { reason, .. } => Some(reason.fault()),
        }
    }
}

/// Run `op` until it succeeds or the strategy says stop. On success at any
/// attempt the strategy is credited; on cancellation mid-wait the admission
/// debited for the abandoned attempt is refunded.
pub fn run_with_retry<T, F>(
    strategy: &RetryStrategy,
    abort: Option<&AtomicBool>,
    mut op: F,
) -> Result<T, RunError>
where
    F: FnMut() -> Result<T, Fault>,
{
    let mut attempt = 1u32;
    loop {
        if is_aborted(abort) {
            return Err(RunError::Cancelled);
        }
        match op() {
            Ok(value) => {
                strategy.on_success();
                return Ok(value);
            }
            Err(fault) => match strategy.should_retry(attempt, &fault) {
                Decision::Retry { delay, debited } => {
                    if !sleep_unless_aborted(delay, abort) {
                        strategy.refund(debited);
                        return Err(RunError::Cancelled);
                    }
                    attempt += 1;
                }
                Decision::GiveUp(reason) => {
                    tracing::debug!(attempt, %reason, "giving up");
                    return Err(RunError::GaveUp {
                        attempts: attempt,
                        reason,
                    });
                }
            },
        }
    }
}

fn is_aborted(abort: Option<&AtomicBool>) -> bool {
    abort.is_some_and(|a| a.load(Ordering::Relaxed))
}

/// Sleep for `delay` in short slices, returning false as soon as the abort
/// token is seen set.
fn sleep_unless_aborted(delay: Duration, abort: Option<&AtomicBool>) -> bool {
    let deadline = Instant::now() + delay;
    loop {
        if is_aborted(abort) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        std::thread::sleep((deadline - now).min(SLEEP_SLICE));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoff::BackoffStrategy;
    use crate::fault::FaultKind;
    use std::sync::Arc;

    static TRANSIENT: FaultKind = FaultKind::new("transient");
    static FATAL: FaultKind = FaultKind::new("fatal");

    fn strategy(max_attempts: u32) -> RetryStrategy {
        RetryStrategy::standard()
            .max_attempts(max_attempts)
            .backoff(BackoffStrategy::Immediate)
            .retry_on_instance_of(&TRANSIENT)
            .build()
            .unwrap()
    }

    #[test]
    fn succeeds_after_transient_failures() {
        let s = strategy(5);
        let mut calls = 0;
        let result = run_with_retry(&s, None, || {
            calls += 1;
            if calls < 3 {
                Err(Fault::new(&TRANSIENT, "flaky"))
            } else {
                Ok(42)
            }
        });
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls, 3);
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let s = strategy(3);
        let mut calls = 0;
        let err = run_with_retry::<(), _>(&s, None, || {
            calls += 1;
            Err(Fault::new(&TRANSIENT, "flaky"))
        })
        .unwrap_err();
        assert_eq!(calls, 3);
        match err {
            RunError::GaveUp { attempts, reason } => {
                assert_eq!(attempts, 3);
                assert!(matches!(reason, GiveUpReason::MaxAttemptsExhausted(_)));
            }
            other => panic!("expected give-up, got {other:?}"),
        }
    }

    #[test]
    fn non_retryable_stops_on_first_attempt() {
        let s = strategy(5);
        let mut calls = 0;
        let err = run_with_retry::<(), _>(&s, None, || {
            calls += 1;
            Err(Fault::new(&FATAL, "bad request"))
        })
        .unwrap_err();
        assert_eq!(calls, 1);
        assert!(err.fault().is_some());
        assert!(matches!(
            err,
            RunError::GaveUp {
                reason: GiveUpReason::NonRetryable(_),
                ..
            }
        ));
    }

    #[test]
    fn pre_set_abort_cancels_before_the_first_call() {
        let s = strategy(5);
        let abort = AtomicBool::new(true);
        let mut calls = 0;
        let err = run_with_retry::<(), _>(&s, Some(&abort), || {
            calls += 1;
            Err(Fault::new(&TRANSIENT, "flaky"))
        })
        .unwrap_err();
        assert_eq!(calls, 0);
        assert!(matches!(err, RunError::Cancelled));
    }

    #[test]
    fn abort_during_wait_cancels_and_refunds_the_debit() {
        let s = RetryStrategy::standard()
            .max_attempts(5)
            .backoff(BackoffStrategy::ExponentialNoJitter {
                base: Duration::from_secs(5),
                max: Duration::from_secs(5),
            })
            .retry_on_instance_of(&TRANSIENT)
            .build()
            .unwrap();
        let level_before = s.bucket().level();
        let abort = Arc::new(AtomicBool::new(false));

        let flipper = {
            let abort = Arc::clone(&abort);
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(100));
                abort.store(true, Ordering::Relaxed);
            })
        };

        let started = Instant::now();
        let err = run_with_retry::<(), _>(&s, Some(&abort), || {
            Err(Fault::new(&TRANSIENT, "flaky"))
        })
        .unwrap_err();
        flipper.join().unwrap();

        assert!(matches!(err, RunError::Cancelled));
        // Interrupted well before the 5s backoff elapsed.
        assert!(started.elapsed() < Duration::from_secs(2));
        // The abandoned attempt's debit was returned.
        assert_eq!(s.bucket().level(), level_before);
    }
}
