use std::time::{Duration, Instant};

/// Flips counted over one measurement window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlipRate {
    pub flips: u32,
    pub elapsed: Duration,
}

impl FlipRate {
    /// Flips per second over the window
    pub fn hz(&self) -> f64 {
        self.flips as f64 / self.elapsed.as_secs_f64().max(f64::EPSILON)
    }
}

/// Rate window - fires every N completions with the measured rate
#[derive(Debug, Clone, Copy)]
pub struct RateWindow {
    interval: u32,
    count: u32,
    started: Instant,
}

impl RateWindow {
    /// Window reporting once every `interval` ticks (at least one)
    pub fn new(interval: u32) -> Self {
        Self::starting_at(interval, Instant::now())
    }

    pub fn starting_at(interval: u32, started: Instant) -> Self {
        Self {
            interval: interval.max(1),
            count: 0,
            started,
        }
    }

    /// Completions counted since the last report
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Restart the window at `now` without reporting
    pub fn reset(&mut self, now: Instant) {
        self.count = 0;
        self.started = now;
    }

    /// Count one completion; returns the rate when the window is full
    pub fn tick(&mut self) -> Option<FlipRate> {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&mut self, now: Instant) -> Option<FlipRate> {
        self.count += 1;
        if self.count < self.interval {
            return None;
        }

        let rate = FlipRate {
            flips: self.count,
            elapsed: now.saturating_duration_since(self.started),
        };
        self.reset(now);
        Some(rate)
    }
}
