//! Token-bucket circuit breaker shared across concurrent operations.
//!
//! One bucket lives inside each built strategy and bounds how much retry
//! budget all in-flight operations may drain together. Retries debit the
//! bucket; successes credit it back, clamped at capacity. When the bucket
//! runs dry, retries are denied even though the attempt ceiling has not been
//! reached.

use std::sync::atomic::{AtomicU32, Ordering};

/// Default bucket capacity.
pub const DEFAULT_CAPACITY: u32 = 500;
/// Default tokens debited per admitted retry.
pub const DEFAULT_RETRY_COST: u32 = 5;
/// Default tokens credited per ultimately-successful operation.
pub const DEFAULT_SUCCESS_REFILL: u32 = 1;

/// Shared retry budget. All mutation goes through CAS loops so concurrent
/// debits and credits never drive the level outside `[0, capacity]` and never
/// double-grant the last unit of budget.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: u32,
    current: AtomicU32,
    retry_cost: u32,
    success_refill: u32,
    enabled: bool,
}

impl TokenBucket {
    /// A full bucket with the given sizing.
    pub fn new(capacity: u32, retry_cost: u32, success_refill: u32) -> Self {
        Self {
            capacity,
            current: AtomicU32::new(capacity),
            retry_cost,
            success_refill,
            enabled: true,
        }
    }

    /// A disabled breaker: acquisition always succeeds, release is a no-op.
    pub fn disabled() -> Self {
        Self {
            capacity: 0,
            current: AtomicU32::new(0),
            retry_cost: 0,
            success_refill: 0,
            enabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn retry_cost(&self) -> u32 {
        self.retry_cost
    }

    pub fn success_refill(&self) -> u32 {
        self.success_refill
    }

    /// Current token level. Racy by nature; intended for logs and tests.
    pub fn level(&self) -> u32 {
        self.current.load(Ordering::Relaxed)
    }

    /// Take `cost` tokens if available. Returns false without mutating when
    /// the level is short; the caller must then give up.
    pub fn try_acquire(&self, cost: u32) -> bool {
        if !self.enabled || cost == 0 {
            return true;
        }
        let mut current = self.current.load(Ordering::Relaxed);
        loop {
            if current < cost {
                return false;
            }
            match self.current.compare_exchange_weak(
                current,
                current - cost,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// Credit `amount` tokens back, clamped at capacity.
    pub fn release(&self, amount: u32) {
        if !self.enabled || amount == 0 {
            return;
        }
        let mut current = self.current.load(Ordering::Relaxed);
        loop {
            let next = current.saturating_add(amount).min(self.capacity);
            if next == current {
                return;
            }
            match self.current.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }
}

impl Default for TokenBucket {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_RETRY_COST, DEFAULT_SUCCESS_REFILL)
    }
}
