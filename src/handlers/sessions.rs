use axum::{
    Json,
    extract::{Path, State},
    http::HeaderMap,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiError;
use crate::metrics::ACTIVE_SESSIONS;
use crate::models::{HistoryResponse, ResetResponse};
use crate::principal::Principal;
use crate::state::AppState;

pub async fn history_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<HistoryResponse>, ApiError> {
    let principal = Principal::from_headers(&headers, &state.identity_header);
    let session = state.sessions.history(session_id, &principal)?;
    Ok(Json(HistoryResponse {
        session_id,
        created_at: session.created_at,
        messages: session.messages,
    }))
}

// Start over: history is dropped and a new session id issued.
// Quota is per principal, so resetting does not refund anything.
pub async fn reset_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<ResetResponse>, ApiError> {
    let principal = Principal::from_headers(&headers, &state.identity_header);
    let new_id = state
        .sessions
        .reset(session_id, &principal, chrono::Utc::now())?;
    ACTIVE_SESSIONS.set(state.sessions.len() as i64);
    tracing::debug!(old = %session_id, new = %new_id, principal = %principal, "session reset");
    Ok(Json(ResetResponse { session_id: new_id }))
}
