use std::time::{Duration, Instant};

// Fixed window - tracks requests per principal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaWindow {
    pub count: u32,
    pub window_start: Instant,
}

impl QuotaWindow {
    pub fn new(now: Instant) -> Self {
        Self {
            count: 0,
            window_start: now,
        }
    }

    pub fn window_end(&self, duration: Duration) -> Instant {
        self.window_start + duration
    }

    // window covers [start, start + duration)
    pub fn is_expired(&self, duration: Duration, now: Instant) -> bool {
        now >= self.window_end(duration)
    }

    // Time left until the window resets, zero once expired
    pub fn remaining_time(&self, duration: Duration, now: Instant) -> Duration {
        self.window_end(duration).saturating_duration_since(now)
    }

    pub fn reset(&mut self, now: Instant) {
        self.count = 0;
        self.window_start = now;
    }
}
