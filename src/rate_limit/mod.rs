//! Fixed-window request quotas per principal.
//!
//! Each principal owns one window: the first request opens it, requests
//! inside it are counted until the kind's limit is hit, and the first
//! request at or after `start + window` opens a fresh one. Denied requests
//! are not counted, so a stored count never exceeds its limit.

mod policy;
mod store;
mod window;

pub use policy::{Limit, QuotaPolicy};
pub use store::{MemoryWindowStore, WindowStore};

use std::time::{Duration, Instant};

use crate::principal::{Principal, PrincipalKind};

/// Outcome of a quota check. `Deny` is a normal result, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow { remaining: u32, reset_after: Duration },
    Deny { retry_after: Duration },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow { .. })
    }
}

/// Read-only snapshot of a principal's quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaStatus {
    pub kind: PrincipalKind,
    pub limit: u32,
    pub used: u32,
    pub remaining: u32,
    /// None when no window is open.
    pub reset_after: Option<Duration>,
}

impl QuotaStatus {
    pub fn message(&self) -> String {
        match self.reset_after {
            Some(reset) => format!(
                "{} questions remaining. Resets in {}",
                self.remaining,
                format_duration(reset)
            ),
            None => format!("{} questions remaining", self.remaining),
        }
    }
}

/// "1h 5m", or seconds when under a minute.
pub fn format_duration(d: Duration) -> String {
    // whole seconds, rounded up, before picking the unit
    let secs = d.as_secs() + u64::from(d.subsec_nanos() > 0);
    if secs < 60 {
        return format!("{}s", secs);
    }
    format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
}

/// Admits or denies requests against an injected window store.
pub struct RateLimiter<S = MemoryWindowStore> {
    policy: QuotaPolicy,
    store: S,
}

impl RateLimiter<MemoryWindowStore> {
    pub fn new(policy: QuotaPolicy) -> Self {
        Self::with_store(policy, MemoryWindowStore::new())
    }
}

impl<S: WindowStore> RateLimiter<S> {
    pub fn with_store(policy: QuotaPolicy, store: S) -> Self {
        Self { policy, store }
    }

    pub fn limit_for(&self, principal: &Principal) -> Limit {
        self.policy.limit_for(principal.kind())
    }

    /// Count one request for `principal` at `now` if its quota allows it.
    pub fn check_and_record(&self, principal: &Principal, now: Instant) -> Decision {
        let limit = self.limit_for(principal);

        self.store.update(principal, now, |window| {
            if window.is_expired(limit.window, now) {
                window.reset(now);
            }
            // a caller holding an older `now` than the window start must
            // not be told to wait longer than a full window
            let reset_after = window.remaining_time(limit.window, now).min(limit.window);

            if window.count < limit.max_requests {
                window.count += 1;
                Decision::Allow {
                    remaining: limit.max_requests - window.count,
                    reset_after,
                }
            } else {
                Decision::Deny {
                    retry_after: reset_after,
                }
            }
        })
    }

    /// Current quota for `principal` without recording a request.
    pub fn status(&self, principal: &Principal, now: Instant) -> QuotaStatus {
        let limit = self.limit_for(principal);
        let open = self
            .store
            .peek(principal)
            .filter(|w| !w.is_expired(limit.window, now));

        let (used, reset_after) = match open {
            Some(w) => (
                w.count.min(limit.max_requests),
                Some(w.remaining_time(limit.window, now).min(limit.window)),
            ),
            None => (0, None),
        };

        QuotaStatus {
            kind: principal.kind(),
            limit: limit.max_requests,
            used,
            remaining: limit.max_requests - used,
            reset_after,
        }
    }

    /// Drop windows that have expired. Returns how many were removed.
    pub fn purge_expired(&self, now: Instant) -> usize {
        let policy = self.policy;
        self.store
            .retain(|principal, window| !window.is_expired(policy.limit_for(principal.kind()).window, now))
    }

    pub fn active_windows(&self) -> usize {
        self.store.len()
    }
}
