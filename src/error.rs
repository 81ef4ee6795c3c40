use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::time::Duration;

use crate::rate_limit::format_duration;

/// Startup configuration errors. Any of these aborts the process.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be positive, got {value}")]
    NonPositive { name: &'static str, value: i64 },

    #[error("{name} is out of range: {value}")]
    OutOfRange { name: &'static str, value: i64 },

    #[error("invalid API_URL {0:?}: must start with http:// or https://")]
    InvalidApiUrl(String),
}

/// Errors surfaced to HTTP callers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    /// Quota denial. Not a failure of the gateway, but it shares the
    /// error body shape so clients handle one format.
    #[error("Rate limit exceeded. Please try again in {}.", format_duration(*.retry_after))]
    RateLimited { retry_after: Duration },

    /// The upstream's own limiter refused the call. `retry_after` is only
    /// set when the upstream sent a usable hint.
    #[error("Rate limit exceeded. Please try again later.")]
    UpstreamRateLimited { retry_after: Option<Duration> },

    #[error("Authentication failed. Please log in again.")]
    UpstreamUnauthorized,

    #[error("Session not found")]
    SessionNotFound,

    #[error("Request timed out. Please try again.")]
    UpstreamTimeout,

    #[error("{0}")]
    Upstream(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::UpstreamRateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::UpstreamUnauthorized => StatusCode::UNAUTHORIZED,
            ApiError::SessionNotFound => StatusCode::NOT_FOUND,
            ApiError::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::RateLimited { .. } => "RATE_LIMIT_EXCEEDED",
            ApiError::UpstreamRateLimited { .. } => "UPSTREAM_RATE_LIMITED",
            ApiError::UpstreamUnauthorized => "AUTH_FAILED",
            ApiError::SessionNotFound => "SESSION_NOT_FOUND",
            ApiError::UpstreamTimeout => "UPSTREAM_TIMEOUT",
            ApiError::Upstream(_) => "UPSTREAM_ERROR",
        }
    }
}

// Retry-After wants whole seconds, round up so clients never retry early
pub fn retry_after_secs(retry_after: Duration) -> u64 {
    let secs = retry_after.as_secs();
    if retry_after.subsec_nanos() > 0 { secs + 1 } else { secs }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let retry_after = match &self {
            ApiError::RateLimited { retry_after } => Some(retry_after_secs(*retry_after)),
            ApiError::UpstreamRateLimited { retry_after } => retry_after.map(retry_after_secs),
            _ => None,
        };
        let details = match retry_after {
            Some(secs) => json!({ "retry_after_secs": secs }),
            None => json!({}),
        };
        let body = json!({
            "error": true,
            "message": self.to_string(),
            "error_code": self.error_code(),
            "details": details,
        });

        let mut response = (self.status(), Json(body)).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}
