use clap::Parser;
use std::time::Duration;

use crate::error::ConfigError;
use crate::rate_limit::QuotaPolicy;

// CLI argument structure, every flag can also come from the environment
#[derive(Parser, Debug, Clone)]
#[command(name = "chat-quota-gateway")]
#[command(about = "Quota-enforcing gateway in front of an AI chat API")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    // Upstream chat API base url
    #[arg(long, env = "API_URL", default_value = "http://localhost:8000")]
    pub api_url: String,

    // Upstream timeout in seconds
    #[arg(long, env = "API_TIMEOUT", default_value_t = 30)]
    pub api_timeout: i64,

    // Sent upstream as X-Client-Version
    #[arg(long, env = "CLIENT_VERSION", default_value = "1.0.0")]
    pub client_version: String,

    // Requests per window for anonymous principals
    #[arg(long, env = "ANONYMOUS_RATE_LIMIT", default_value_t = 10, allow_negative_numbers = true)]
    pub anonymous_rate_limit: i64,

    // Requests per window for authenticated principals
    #[arg(long, env = "AUTHENTICATED_RATE_LIMIT", default_value_t = 50, allow_negative_numbers = true)]
    pub authenticated_rate_limit: i64,

    // Rate limit window in hours
    #[arg(long, env = "RATE_LIMIT_WINDOW_HOURS", default_value_t = 1, allow_negative_numbers = true)]
    pub rate_limit_window_hours: i64,

    // Header the identity proxy sets to the verified user id
    #[arg(long, env = "IDENTITY_HEADER", default_value = "x-authenticated-user")]
    pub identity_header: String,

    // How often expired windows and idle sessions are swept
    #[arg(long, env = "SWEEP_INTERVAL_SECS", default_value_t = 60)]
    pub sweep_interval_secs: i64,

    // Sessions idle longer than this are dropped
    #[arg(long, env = "SESSION_IDLE_HOURS", default_value_t = 24)]
    pub session_idle_hours: i64,

    // Debug logging
    #[arg(long, env = "DEBUG", default_value_t = false)]
    pub debug: bool,
}

/// Validated runtime configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub port: u16,
    pub api_url: String,
    pub api_timeout: Duration,
    pub client_version: String,
    pub policy: QuotaPolicy,
    pub identity_header: String,
    pub sweep_interval: Duration,
    pub session_idle: Duration,
}

const SECS_PER_HOUR: u64 = 3600;

fn positive(name: &'static str, value: i64) -> Result<u64, ConfigError> {
    if value <= 0 {
        return Err(ConfigError::NonPositive { name, value });
    }
    Ok(value as u64)
}

fn positive_u32(name: &'static str, value: i64) -> Result<u32, ConfigError> {
    let v = positive(name, value)?;
    u32::try_from(v).map_err(|_| ConfigError::OutOfRange { name, value })
}

fn positive_hours(name: &'static str, value: i64) -> Result<Duration, ConfigError> {
    let hours = positive(name, value)?;
    hours
        .checked_mul(SECS_PER_HOUR)
        .map(Duration::from_secs)
        .ok_or(ConfigError::OutOfRange { name, value })
}

impl Args {
    /// Non-positive limits or durations are fatal.
    pub fn validate(&self) -> Result<GatewayConfig, ConfigError> {
        let anonymous = positive_u32("ANONYMOUS_RATE_LIMIT", self.anonymous_rate_limit)?;
        let authenticated = positive_u32("AUTHENTICATED_RATE_LIMIT", self.authenticated_rate_limit)?;
        let window = positive_hours("RATE_LIMIT_WINDOW_HOURS", self.rate_limit_window_hours)?;
        let policy = QuotaPolicy::uniform(anonymous, authenticated, window)?;

        let api_url = self.api_url.trim_end_matches('/').to_string();
        if !(api_url.starts_with("http://") || api_url.starts_with("https://")) {
            return Err(ConfigError::InvalidApiUrl(self.api_url.clone()));
        }

        Ok(GatewayConfig {
            port: self.port,
            api_url,
            api_timeout: Duration::from_secs(positive("API_TIMEOUT", self.api_timeout)?),
            client_version: self.client_version.clone(),
            policy,
            identity_header: self.identity_header.to_ascii_lowercase(),
            sweep_interval: Duration::from_secs(positive("SWEEP_INTERVAL_SECS", self.sweep_interval_secs)?),
            session_idle: positive_hours("SESSION_IDLE_HOURS", self.session_idle_hours)?,
        })
    }
}
