use axum::{Json, extract::State, http::HeaderMap};
use std::sync::Arc;
use std::time::Instant;

use crate::models::QuotaResponse;
use crate::principal::Principal;
use crate::state::AppState;

// Caller's remaining quota, nothing is recorded
pub async fn quota_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Json<QuotaResponse> {
    let principal = Principal::from_headers(&headers, &state.identity_header);
    Json(state.limiter.status(&principal, Instant::now()).into())
}
