use std::time::{Duration, Instant};

use crate::metrics::{ACTIVE_SESSIONS, ACTIVE_WINDOWS};
use crate::rate_limit::RateLimiter;
use crate::session::SessionStore;
use crate::upstream::ChatClient;

// app's shared state
pub struct AppState {
    pub limiter: RateLimiter,
    pub sessions: SessionStore,
    pub upstream: ChatClient,
    pub identity_header: String,
    pub session_idle: Duration,
}

impl AppState {
    // Drop expired quota windows and idle sessions, refresh gauges
    pub fn sweep(&self, now: Instant) -> (usize, usize) {
        let windows = self.limiter.purge_expired(now);
        let max_idle = chrono::Duration::from_std(self.session_idle).unwrap_or(chrono::Duration::MAX);
        let sessions = self.sessions.purge_idle(max_idle, chrono::Utc::now());

        ACTIVE_WINDOWS.set(self.limiter.active_windows() as i64);
        ACTIVE_SESSIONS.set(self.sessions.len() as i64);
        (windows, sessions)
    }
}
