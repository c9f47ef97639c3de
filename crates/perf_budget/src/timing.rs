//! Timing utilities for performance measurement

use std::time::{Duration, Instant};

/// A timer that measures elapsed wall-clock time from creation.
///
/// The timer logs its elapsed time at `trace` level when dropped, unless it
/// was consumed with [`PerfTimer::stop`]. Owners that forward the
/// measurement elsewhere call `stop` from their own `Drop`.
///
/// # Example
///
/// ```rust
/// use perf_budget::PerfTimer;
///
/// let timer = PerfTimer::new("fetch_orders");
/// // ... work ...
/// let elapsed_ms = timer.stop();
/// assert!(elapsed_ms >= 0.0);
/// ```
#[derive(Debug)]
pub struct PerfTimer {
    name: String,
    start: Instant,
    stopped: bool,
}

impl PerfTimer {
    /// Create a new timer with the given name.
    ///
    /// The timer starts immediately upon creation.
    #[inline]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: Instant::now(),
            stopped: false,
        }
    }

    /// Get the elapsed time in milliseconds.
    #[inline]
    pub fn elapsed_ms(&self) -> f64 {
        duration_ms(self.start.elapsed())
    }

    /// Get the name of this timer.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stop the timer and return the elapsed milliseconds without logging.
    #[inline]
    pub fn stop(mut self) -> f64 {
        self.stopped = true;
        self.elapsed_ms()
    }
}

impl Drop for PerfTimer {
    fn drop(&mut self) {
        if self.stopped {
            return;
        }

        tracing::trace!(
            target: "perf",
            name = %self.name,
            elapsed_ms = self.elapsed_ms(),
            "timer completed"
        );
    }
}

/// Convert a duration to fractional milliseconds.
#[inline]
pub fn duration_ms(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}
