//! Run statistics — two-timestamp markers and aggregate counters.

use std::time::{Duration, Instant};

/// A two-timestamp marker carried by every runnable.
///
/// The first [`mark`](Marker::mark) records the start, the second records the
/// end; further calls are no-ops.
#[derive(Debug, Clone, Copy, Default)]
pub struct Marker {
    start: Option<Instant>,
    end: Option<Instant>,
}

impl Marker {
    pub fn mark(&mut self) {
        if self.start.is_none() {
            self.start = Some(Instant::now());
        } else if self.end.is_none() {
            self.end = Some(Instant::now());
        }
    }

    pub fn started(&self) -> bool {
        self.start.is_some()
    }

    pub fn ended(&self) -> bool {
        self.end.is_some()
    }

    /// Duration between the two marks, zero until both exist. Clock skew
    /// clamps to zero rather than underflowing.
    pub fn duration(&self) -> Duration {
        match (self.start, self.end) {
            (Some(start), Some(end)) => end.saturating_duration_since(start),
            _ => Duration::ZERO,
        }
    }

    /// Live duration while running, the frozen [`duration`](Marker::duration)
    /// once ended.
    pub fn elapsed(&self) -> Duration {
        match (self.start, self.end) {
            (Some(start), None) => start.elapsed(),
            _ => self.duration(),
        }
    }
}

/// Aggregate counters for one run.
///
/// `failures` counts failed hooks as well as failed tests; `tests` counts
/// only tests that reached a terminal outcome.
#[derive(Debug, Clone, Default)]
pub struct Stats {
    pub marker: Marker,
    pub suites: usize,
    pub tests: usize,
    pub passes: usize,
    pub pending: usize,
    pub failures: usize,
}

impl Stats {
    /// Total terminal outcomes, hooks included.
    pub fn total(&self) -> usize {
        self.passes + self.pending + self.failures
    }
}
