//! Time and tick sources for the acquisition loop.
//!
//! The engine never reads the wall clock directly. Production code uses
//! [`MonotonicClock`] and [`IntervalTicker`]; tests drive [`ManualClock`]
//! and [`ManualTicker`] so runs are deterministic.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic time source.
pub trait Clock {
    /// Time elapsed since an arbitrary fixed epoch.
    fn now(&self) -> Duration;
}

/// [`Clock`] backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    epoch: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    nanos: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.nanos.fetch_add(duration_nanos(by), Ordering::SeqCst);
    }

    pub fn set(&self, to: Duration) {
        self.nanos.store(duration_nanos(to), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }
}

fn duration_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

/// Source of scheduling ticks.
pub trait Ticker {
    /// Block until the next tick is due. `false` ends the run.
    fn wait_next(&mut self) -> bool;
}

/// Fixed-period ticker on the real clock.
///
/// A tick that comes due while the previous one is still running fires
/// immediately, and the schedule restarts from there instead of bursting
/// to catch up.
#[derive(Debug)]
pub struct IntervalTicker {
    period: Duration,
    next: Option<Instant>,
}

impl IntervalTicker {
    pub fn new(period: Duration) -> Self {
        Self { period, next: None }
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

impl Ticker for IntervalTicker {
    fn wait_next(&mut self) -> bool {
        let now = Instant::now();
        let due = match self.next {
            None => now,
            Some(due) if due > now => {
                std::thread::sleep(due - now);
                due
            }
            Some(_) => now,
        };
        self.next = Some(due + self.period);
        true
    }
}

/// Ticker that advances a [`ManualClock`] by one period per tick.
#[derive(Debug)]
pub struct ManualTicker {
    clock: ManualClock,
    period: Duration,
    remaining: Option<u64>,
    first: bool,
}

impl ManualTicker {
    /// Tick forever, `period` apart. The first tick fires at the current time.
    pub fn new(clock: ManualClock, period: Duration) -> Self {
        Self {
            clock,
            period,
            remaining: None,
            first: true,
        }
    }

    /// Stop after `ticks` ticks.
    pub fn with_limit(mut self, ticks: u64) -> Self {
        self.remaining = Some(ticks);
        self
    }
}

impl Ticker for ManualTicker {
    fn wait_next(&mut self) -> bool {
        if let Some(remaining) = self.remaining.as_mut() {
            if *remaining == 0 {
                return false;
            }
            *remaining -= 1;
        }
        if self.first {
            self.first = false;
        } else {
            self.clock.advance(self.period);
        }
        true
    }
}
