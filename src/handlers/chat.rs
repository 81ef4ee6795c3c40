use axum::{Json, extract::State, http::HeaderMap};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{ApiError, retry_after_secs};
use crate::metrics::{ACTIVE_SESSIONS, ACTIVE_WINDOWS, QUOTA_DECISIONS, REQUEST_TOTAL};
use crate::models::{ChatRequest, ChatResponse};
use crate::principal::Principal;
use crate::rate_limit::Decision;
use crate::session::{ChatMessage, Role};
use crate::state::AppState;
use crate::upstream::bearer_token;
use crate::validation::validate_message;

pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    REQUEST_TOTAL.inc();
    let principal = Principal::from_headers(&headers, &state.identity_header);

    // requests that can never reach upstream must not spend quota
    let message = validate_message(&payload.message)?;
    state.sessions.ensure_owned(payload.session_id, &principal)?;

    let decision = state.limiter.check_and_record(&principal, Instant::now());
    ACTIVE_WINDOWS.set(state.limiter.active_windows() as i64);

    let kind = principal.kind().as_str();
    let (remaining, reset_after) = match decision {
        Decision::Allow {
            remaining,
            reset_after,
        } => {
            QUOTA_DECISIONS.with_label_values(&[kind, "allow"]).inc();
            (remaining, reset_after)
        }
        Decision::Deny { retry_after } => {
            QUOTA_DECISIONS.with_label_values(&[kind, "deny"]).inc();
            info!(principal = %principal, retry_after_secs = retry_after.as_secs(), "rate limit exceeded");
            return Err(ApiError::RateLimited { retry_after });
        }
    };

    let session_id = state
        .sessions
        .get_or_create(payload.session_id, &principal, Utc::now())?;
    ACTIVE_SESSIONS.set(state.sessions.len() as i64);
    state
        .sessions
        .append(session_id, ChatMessage::new(Role::User, message.as_str(), Utc::now()))?;

    debug!(principal = %principal, session_id = %session_id, remaining, "forwarding to upstream");

    let reply = state
        .upstream
        .send_message(&message, session_id, principal.is_guest(), bearer_token(&headers))
        .await
        .inspect_err(|e| warn!(session_id = %session_id, "upstream call failed: {}", e))?;

    state
        .sessions
        .append(session_id, ChatMessage::new(Role::Assistant, reply.as_str(), Utc::now()))?;

    Ok(Json(ChatResponse {
        session_id,
        response: reply,
        remaining,
        reset_in_secs: retry_after_secs(reset_after),
    }))
}
