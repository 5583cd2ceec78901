//! Throttle-rate feedback for the adaptive strategy.
//!
//! Keeps a decaying window of recent retryable outcomes and derives a delay
//! multiplier from the fraction that were throttling. The counters are
//! intentionally approximate under races; the feedback only needs to track
//! pressure, not count exactly.

use std::sync::atomic::{AtomicU32, Ordering};

/// Once this many samples accumulate, both counters are halved so old
/// pressure ages out.
const DECAY_AT: u32 = 32;

#[derive(Debug, Default)]
pub(super) struct ThrottleRate {
    throttles: AtomicU32,
    samples: AtomicU32,
}

impl ThrottleRate {
    /// Record one retryable outcome (throttling or not).
    pub(super) fn observe(&self, throttled: bool) {
        if throttled {
            self.throttles.fetch_add(1, Ordering::Relaxed);
        }
        let samples = self.samples.fetch_add(1, Ordering::Relaxed) + 1;
        if samples >= DECAY_AT {
            self.samples.store(samples / 2, Ordering::Relaxed);
            let throttles = self.throttles.load(Ordering::Relaxed);
            self.throttles.store(throttles / 2, Ordering::Relaxed);
        }
    }

    /// Delay multiplier: 1 while calm, stepping to 4 under heavy throttling.
    pub(super) fn multiplier(&self) -> u32 {
        let samples = self.samples.load(Ordering::Relaxed).max(1);
        let throttles = self.throttles.load(Ordering::Relaxed).min(samples);
        let rate = f64::from(throttles) / f64::from(samples);
        if rate >= 0.5 {
            4
        } else if rate >= 0.25 {
            2
        } else {
            1
        }
    }
}
