use std::time::{Duration, Instant};

/// What a painter knows about the picture it is producing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameInfo {
    /// Paints since the swap chain was built, the initial picture is 0
    pub number: u64,
    /// Time since the first paint
    pub elapsed: Duration,
    /// Time since the previous paint
    pub delta: Duration,
}

impl FrameInfo {
    pub fn new(number: u64, elapsed: Duration, delta: Duration) -> Self {
        Self { number, elapsed, delta }
    }

    /// Seconds since the first paint, for animation
    pub fn seconds(&self) -> f32 {
        self.elapsed.as_secs_f32()
    }
}

/// Numbers paints and timestamps them against the first one
#[derive(Debug, Clone, Copy)]
pub struct FrameClock {
    painted: u64,
    start: Option<Instant>,
    last: Option<Instant>,
}

impl FrameClock {
    pub fn new() -> Self {
        Self { painted: 0, start: None, last: None }
    }

    /// Paints handed out so far
    pub fn painted(&self) -> u64 {
        self.painted
    }

    /// Info for a paint happening at `now`
    pub fn tick(&mut self, now: Instant) -> FrameInfo {
        let start = *self.start.get_or_insert(now);
        let last = self.last.replace(now).unwrap_or(now);
        let info = FrameInfo::new(
            self.painted,
            now.saturating_duration_since(start),
            now.saturating_duration_since(last),
        );
        self.painted += 1;
        info
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}
