//! Simulated time.
//!
//! The combat controller is polled with a timestamp in seconds. Headless
//! drivers feed it from a [`SimClock`] instead of the wall clock so runs are
//! fast and reproducible.

/// Smallest allowed step, in seconds.
pub const MIN_STEP: f64 = 0.001;

/// Fixed-step simulated clock.
#[derive(Debug, Clone, PartialEq)]
pub struct SimClock {
    /// Current time in seconds
    now: f64,
    /// Seconds added per tick
    step: f64,
    /// Ticks taken so far
    ticks: u64,
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new(0.1)
    }
}

impl SimClock {
    /// Create a clock at time zero.
    #[must_use]
    pub fn new(step: f64) -> Self {
        let step = if step.is_finite() { step.max(MIN_STEP) } else { 0.1 };
        Self { now: 0.0, step, ticks: 0 }
    }

    /// Current time in seconds.
    #[must_use]
    pub const fn now(&self) -> f64 {
        self.now
    }

    /// Seconds per tick.
    #[must_use]
    pub const fn step(&self) -> f64 {
        self.step
    }

    /// Ticks taken so far.
    #[must_use]
    pub const fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Advance one step. Returns the new time.
    pub fn tick(&mut self) -> f64 {
        self.ticks += 1;
        // now is always ticks * step
        self.now = self.ticks as f64 * self.step;
        self.now
    }

    /// Advance by whole steps until `target` is reached. Time never moves
    /// backwards. Returns the number of steps taken.
    pub fn advance_to(&mut self, target: f64) -> u64 {
        if !target.is_finite() || target <= self.now {
            return 0;
        }
        let needed = ((target - self.now) / self.step).ceil() as u64;
        self.ticks += needed;
        self.now = self.ticks as f64 * self.step;
        needed
    }
}
