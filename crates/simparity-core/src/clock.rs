//! Clocks for workload replay.
//!
//! [`MonotonicClock`] reads the host's monotonic clock and really sleeps.
//! [`ManualClock`] is a virtual clock that advances only when slept on or
//! advanced explicitly, which makes a full replay deterministic and
//! instantaneous regardless of host machine speed.

use simparity_backends::Clock;
use std::cell::Cell;
use std::time::{Duration, Instant};

/// Host monotonic clock anchored at construction time.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ns(&self) -> u64 {
        self.origin.elapsed().as_nanos() as u64
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Virtual replay clock.
///
/// Interior mutability lets the replay loop and a backend share one instance
/// through `Rc` while both advance it.
#[derive(Debug, Default)]
pub struct ManualClock {
    current_ns: Cell<u64>,
    sleeps: Cell<u64>,
    longest_sleep_ns: Cell<u64>,
}

impl ManualClock {
    /// Create a new clock starting at time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a clock starting at a specific time in nanoseconds.
    pub fn starting_at_ns(ns: u64) -> Self {
        let clock = Self::new();
        clock.current_ns.set(ns);
        clock
    }

    /// Advance the clock to an absolute time.
    ///
    /// # Panics
    ///
    /// Panics in debug mode if `ns` is in the past.
    pub fn advance_to_ns(&self, ns: u64) {
        debug_assert!(
            ns >= self.current_ns.get(),
            "Cannot move clock backwards: current={}ns, target={}ns",
            self.current_ns.get(),
            ns,
        );
        self.current_ns.set(ns);
    }

    /// Advance the clock by a duration in nanoseconds.
    pub fn advance_by_ns(&self, delta_ns: u64) {
        self.current_ns.set(self.current_ns.get() + delta_ns);
    }

    /// Number of `sleep` calls observed.
    pub fn sleep_count(&self) -> u64 {
        self.sleeps.get()
    }

    /// Longest single `sleep` observed, in nanoseconds.
    pub fn longest_sleep_ns(&self) -> u64 {
        self.longest_sleep_ns.get()
    }
}

impl Clock for ManualClock {
    fn now_ns(&self) -> u64 {
        self.current_ns.get()
    }

    fn sleep(&self, duration: Duration) {
        let ns = duration.as_nanos() as u64;
        self.advance_by_ns(ns);
        self.sleeps.set(self.sleeps.get() + 1);
        self.longest_sleep_ns
            .set(self.longest_sleep_ns.get().max(ns));
    }
}
