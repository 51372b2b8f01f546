use std::thread;
use std::time::{Duration, Instant};

/// Monotonic clock abstraction for every settle, poll and regulation sleep.
///
/// - now(): returns a monotonic Instant
/// - sleep(): blocks for the provided duration (implementations may simulate)
/// - ms_since(): helper to compute elapsed milliseconds from an epoch Instant
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, d: Duration);

    /// Milliseconds elapsed since `epoch`, saturating at 0 on underflow.
    fn ms_since(&self, epoch: Instant) -> u64 {
        let dur = self.now().saturating_duration_since(epoch);
        u64::try_from(dur.as_millis()).unwrap_or(u64::MAX)
    }

    /// Convenience for the millisecond constants used by the gas path.
    fn sleep_ms(&self, ms: u64) {
        self.sleep(Duration::from_millis(ms));
    }
}

/// Default, real-time monotonic clock backed by std::time::Instant.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl MonotonicClock {
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

impl Clock for MonotonicClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }

    #[inline]
    fn sleep(&self, d: Duration) {
        if d.is_zero() {
            return;
        }
        thread::sleep(d);
    }
}

pub mod test_clock {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Default)]
    struct Ticks {
        offset: Duration,
        slept: Duration,
        sleeps: u64,
    }

    /// Deterministic clock for tests and simulation runs.
    ///
    /// now() = origin + offset. sleep(d) advances the offset by d without
    /// blocking and accumulates the total slept time, so tests can assert on
    /// settle intervals without waiting for them. Clones share one timeline.
    #[derive(Debug, Clone)]
    pub struct TestClock {
        origin: Instant,
        ticks: Arc<Mutex<Ticks>>,
    }

    impl Default for TestClock {
        fn default() -> Self {
            Self::new()
        }
    }

    impl TestClock {
        pub fn new() -> Self {
            Self {
                origin: Instant::now(),
                ticks: Arc::new(Mutex::new(Ticks::default())),
            }
        }

        /// Advance the clock without counting it as a sleep.
        pub fn advance(&self, d: Duration) {
            if let Ok(mut t) = self.ticks.lock() {
                t.offset = t.offset.saturating_add(d);
            }
        }

        /// Total time passed to `sleep` so far.
        pub fn slept(&self) -> Duration {
            self.ticks.lock().map(|t| t.slept).unwrap_or_default()
        }

        /// Number of `sleep` calls so far.
        pub fn sleep_count(&self) -> u64 {
            self.ticks.lock().map(|t| t.sleeps).unwrap_or_default()
        }
    }

    impl Clock for TestClock {
        fn now(&self) -> Instant {
            let off = self.ticks.lock().map(|t| t.offset).unwrap_or_default();
            self.origin + off
        }

        fn sleep(&self, d: Duration) {
            if let Ok(mut t) = self.ticks.lock() {
                t.offset = t.offset.saturating_add(d);
                t.slept = t.slept.saturating_add(d);
                t.sleeps += 1;
            }
            // Let other threads sharing this timeline make progress.
            thread::yield_now();
        }
    }

}
