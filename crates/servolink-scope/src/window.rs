use std::collections::VecDeque;
use std::time::Duration;

/// One telemetry value and the time its request was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    /// Send time of the request, relative to acquisition start.
    pub timestamp: Duration,
    pub value: i32,
}

/// Rolling, time-windowed sample series with a vertical center.
///
/// The window covers `[origin, origin + width)`. When time passes its right
/// edge the origin advances by one width, samples from before the previous
/// origin are trimmed (one width of lookback survives), and the center is
/// recomputed as the midpoint of the retained range. Between rollovers the
/// center never moves.
#[derive(Debug, Clone)]
pub struct SampleWindow {
    samples: VecDeque<Sample>,
    origin: Duration,
    width: Duration,
    center: Option<i32>,
    rollovers: u64,
}

impl SampleWindow {
    pub fn new(width: Duration) -> Self {
        Self {
            samples: VecDeque::new(),
            origin: Duration::ZERO,
            width,
            center: None,
            rollovers: 0,
        }
    }

    /// Drop every sample and start a fresh window at `origin`.
    pub fn reset(&mut self, origin: Duration) {
        self.samples.clear();
        self.origin = origin;
        self.center = None;
        self.rollovers = 0;
    }

    /// Append at the tail.
    ///
    /// Returns false, leaving the window unchanged, if `sample` is older
    /// than the newest sample already held.
    pub fn append(&mut self, sample: Sample) -> bool {
        if let Some(last) = self.samples.back() {
            if sample.timestamp < last.timestamp {
                return false;
            }
        }
        if self.center.is_none() {
            self.center = Some(sample.value);
        }
        self.samples.push_back(sample);
        true
    }

    /// Advance the window until it contains `now`.
    ///
    /// Returns the number of rollovers performed, one per width crossed.
    pub fn rollover(&mut self, now: Duration) -> u32 {
        let mut count = 0;
        while now > self.origin + self.width {
            let previous = self.origin;
            self.origin += self.width;
            while self
                .samples
                .front()
                .is_some_and(|sample| sample.timestamp < previous)
            {
                self.samples.pop_front();
            }
            if let Some(center) = midpoint(&self.samples) {
                self.center = Some(center);
            }
            self.rollovers += 1;
            count += 1;
        }
        count
    }

    /// Vertical center for plotting. `None` until the first sample.
    pub fn center(&self) -> Option<i32> {
        self.center
    }

    pub fn origin(&self) -> Duration {
        self.origin
    }

    pub fn width(&self) -> Duration {
        self.width
    }

    /// Rollovers since the last reset.
    pub fn rollovers(&self) -> u64 {
        self.rollovers
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn latest(&self) -> Option<&Sample> {
        self.samples.back()
    }

    /// Every retained sample, oldest first.
    pub fn samples(&self) -> impl Iterator<Item = &Sample> + '_ {
        self.samples.iter()
    }

    /// Samples inside the current window.
    pub fn visible(&self) -> impl Iterator<Item = &Sample> + '_ {
        let origin = self.origin;
        self.samples.iter().filter(move |s| s.timestamp >= origin)
    }

    /// Lowest and highest retained values.
    pub fn range(&self) -> Option<(i32, i32)> {
        let mut values = self.samples.iter().map(|s| s.value);
        let first = values.next()?;
        Some(values.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
    }
}

fn midpoint(samples: &VecDeque<Sample>) -> Option<i32> {
    let min = samples.iter().map(|s| s.value).min()?;
    let max = samples.iter().map(|s| s.value).max()?;
    Some(((i64::from(min) + i64::from(max)) / 2) as i32)
}
