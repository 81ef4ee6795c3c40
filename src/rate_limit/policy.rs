use std::time::Duration;

use crate::error::ConfigError;
use crate::principal::PrincipalKind;

/// Max requests admitted per fixed window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit {
    pub max_requests: u32,
    pub window: Duration,
}

impl Limit {
    pub fn new(max_requests: u32, window: Duration) -> Result<Self, ConfigError> {
        if max_requests == 0 {
            return Err(ConfigError::NonPositive {
                name: "rate limit",
                value: 0,
            });
        }
        if window.is_zero() {
            return Err(ConfigError::NonPositive {
                name: "rate limit window",
                value: 0,
            });
        }
        Ok(Self {
            max_requests,
            window,
        })
    }
}

/// Principal kind -> limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaPolicy {
    pub anonymous: Limit,
    pub authenticated: Limit,
}

impl QuotaPolicy {
    pub const DEFAULT_ANONYMOUS_LIMIT: u32 = 10;
    pub const DEFAULT_AUTHENTICATED_LIMIT: u32 = 50;
    pub const DEFAULT_WINDOW: Duration = Duration::from_secs(3600);

    pub fn new(anonymous: Limit, authenticated: Limit) -> Self {
        Self {
            anonymous,
            authenticated,
        }
    }

    /// Same window for both kinds, as configured from the environment.
    pub fn uniform(
        anonymous_limit: u32,
        authenticated_limit: u32,
        window: Duration,
    ) -> Result<Self, ConfigError> {
        Ok(Self::new(
            Limit::new(anonymous_limit, window)?,
            Limit::new(authenticated_limit, window)?,
        ))
    }

    pub fn limit_for(&self, kind: PrincipalKind) -> Limit {
        match kind {
            PrincipalKind::Anonymous => self.anonymous,
            PrincipalKind::Authenticated => self.authenticated,
        }
    }

    // longest window across kinds, used when sweeping
    pub fn longest_window(&self) -> Duration {
        self.anonymous.window.max(self.authenticated.window)
    }
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        Self {
            anonymous: Limit {
                max_requests: Self::DEFAULT_ANONYMOUS_LIMIT,
                window: Self::DEFAULT_WINDOW,
            },
            authenticated: Limit {
                max_requests: Self::DEFAULT_AUTHENTICATED_LIMIT,
                window: Self::DEFAULT_WINDOW,
            },
        }
    }
}
