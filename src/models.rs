use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::retry_after_secs;
use crate::principal::PrincipalKind;
use crate::rate_limit::QuotaStatus;
use crate::session::ChatMessage;

// Gateway chat request format
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<Uuid>,
}

// Gateway chat response format
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct ChatResponse {
    pub session_id: Uuid,
    pub response: String,
    pub remaining: u32,
    pub reset_in_secs: u64,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct QuotaResponse {
    pub kind: PrincipalKind,
    pub limit: u32,
    pub used: u32,
    pub remaining: u32,
    pub reset_in_secs: Option<u64>,
    pub message: String,
}

impl From<QuotaStatus> for QuotaResponse {
    fn from(status: QuotaStatus) -> Self {
        Self {
            kind: status.kind,
            limit: status.limit,
            used: status.used,
            remaining: status.remaining,
            reset_in_secs: status.reset_after.map(retry_after_secs),
            message: status.message(),
        }
    }
}

#[derive(Serialize, Clone, Debug)]
pub struct HistoryResponse {
    pub session_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub messages: Vec<ChatMessage>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ResetResponse {
    pub session_id: Uuid,
}
