use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::error::ApiError;
use crate::metrics::UPSTREAM_LATENCY;

// Chat API request format
#[derive(Serialize, Debug)]
pub struct UpstreamChatRequest<'a> {
    pub message: &'a str,
    pub session_id: Uuid,
    pub guest_mode: bool,
}

// Chat API response format
#[derive(Deserialize, Debug)]
pub struct UpstreamChatResponse {
    pub response: String,
}

// Client for the upstream chat API
#[derive(Clone)]
pub struct ChatClient {
    client: reqwest::Client,
    base_url: String,
    client_version: String,
}

impl ChatClient {
    pub fn new(base_url: impl Into<String>, client_version: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            client_version: client_version.into(),
        })
    }

    /// Send one message upstream. `bearer` is the caller's token, forwarded
    /// as-is so the upstream can apply its own authorization.
    pub async fn send_message(
        &self,
        message: &str,
        session_id: Uuid,
        guest_mode: bool,
        bearer: Option<&str>,
    ) -> Result<String, ApiError> {
        let mut request = self
            .client
            .post(format!("{}/chat", self.base_url))
            .header("X-Client-Version", &self.client_version)
            .header("X-Session-ID", session_id.to_string())
            .json(&UpstreamChatRequest {
                message,
                session_id,
                guest_mode,
            });
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        let start = Instant::now();
        let result = request.send().await;
        UPSTREAM_LATENCY.observe(start.elapsed().as_secs_f64());

        let res = result.map_err(|e| {
            if e.is_timeout() {
                ApiError::UpstreamTimeout
            } else {
                ApiError::Upstream(format!("Failed to send message: {}", e))
            }
        })?;

        let status = res.status();
        if !status.is_success() {
            return Err(response_error(res).await);
        }

        let body = res.json::<UpstreamChatResponse>().await.map_err(|e| {
            if e.is_timeout() {
                ApiError::UpstreamTimeout
            } else {
                ApiError::Upstream(format!("Parse Error: {}", e))
            }
        })?;
        Ok(body.response)
    }
}

// Upstream error body format
#[derive(Deserialize, Debug)]
struct UpstreamErrorBody {
    message: Option<String>,
}

// Map a non-success upstream response to an error for our caller
async fn response_error(res: reqwest::Response) -> ApiError {
    match res.status() {
        StatusCode::UNAUTHORIZED => ApiError::UpstreamUnauthorized,
        // upstream has its own limiter; pass its hint through when usable
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = res
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs);
            ApiError::UpstreamRateLimited { retry_after }
        }
        status => {
            let text = res.text().await.unwrap_or_default();
            let message = serde_json::from_str::<UpstreamErrorBody>(&text)
                .ok()
                .and_then(|b| b.message)
                .or_else(|| Some(text.trim().to_string()).filter(|t| !t.is_empty()))
                .unwrap_or_else(|| "Unknown error occurred".to_string());
            tracing::debug!(%status, "upstream error response");
            ApiError::Upstream(message)
        }
    }
}

/// Bearer token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &axum::http::HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
