//! Per-conversation message history.
//!
//! A session is owned by the principal that opened it. Lookups from any
//! other principal behave as if the session did not exist.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use uuid::Uuid;

use crate::error::ApiError;
use crate::principal::Principal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub owner: Principal,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub messages: Vec<ChatMessage>,
}

impl Session {
    fn new(owner: Principal, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner,
            created_at: now,
            last_active: now,
            messages: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: DashMap<Uuid, Session>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails when `id` names a session owned by someone else. Unknown or
    /// absent ids pass, `get_or_create` opens a new session for them.
    pub fn ensure_owned(&self, id: Option<Uuid>, owner: &Principal) -> Result<(), ApiError> {
        match id.and_then(|id| self.sessions.get(&id)) {
            Some(session) if &session.owner != owner => Err(ApiError::SessionNotFound),
            _ => Ok(()),
        }
    }

    /// Resolve the session for a request, opening a new one when `id` is
    /// absent or unknown (e.g. swept after going idle).
    pub fn get_or_create(
        &self,
        id: Option<Uuid>,
        owner: &Principal,
        now: DateTime<Utc>,
    ) -> Result<Uuid, ApiError> {
        if let Some(id) = id {
            if let Some(mut session) = self.sessions.get_mut(&id) {
                if &session.owner != owner {
                    return Err(ApiError::SessionNotFound);
                }
                session.last_active = now;
                return Ok(id);
            }
        }

        let session = Session::new(owner.clone(), now);
        let id = session.id;
        self.sessions.insert(id, session);
        tracing::debug!(session_id = %id, principal = %owner, "session opened");
        Ok(id)
    }

    pub fn append(&self, id: Uuid, message: ChatMessage) -> Result<(), ApiError> {
        let mut session = self.sessions.get_mut(&id).ok_or(ApiError::SessionNotFound)?;
        session.last_active = message.timestamp;
        session.messages.push(message);
        Ok(())
    }

    /// Snapshot of a session, visible to its owner only.
    pub fn history(&self, id: Uuid, owner: &Principal) -> Result<Session, ApiError> {
        self.sessions
            .get(&id)
            .filter(|s| &s.owner == owner)
            .map(|s| s.value().clone())
            .ok_or(ApiError::SessionNotFound)
    }

    /// Drop the session's history and hand back a fresh id.
    pub fn reset(&self, id: Uuid, owner: &Principal, now: DateTime<Utc>) -> Result<Uuid, ApiError> {
        // remove_if keeps the ownership check and removal under one lock
        self.sessions
            .remove_if(&id, |_, s| &s.owner == owner)
            .ok_or(ApiError::SessionNotFound)?;

        let fresh = Session::new(owner.clone(), now);
        let new_id = fresh.id;
        self.sessions.insert(new_id, fresh);
        Ok(new_id)
    }

    pub fn purge_idle(&self, max_idle: chrono::Duration, now: DateTime<Utc>) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| now - s.last_active < max_idle);
        before.saturating_sub(self.sessions.len())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }
}
