//! Server-side session record backing a refresh token.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use crate::types::UserId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
/// Database representation of a user's single active session.
pub struct Session {
    /// User the session belongs to. At most one session exists per user.
    pub user_id: UserId,
    /// PHC-formatted hash of the current refresh secret.
    #[serde(skip_serializing)]
    pub refresh_token_hash: String,
    /// User agent captured when the session was issued.
    pub user_agent: String,
    /// Client IP captured when the session was issued.
    pub ip: String,
    /// Timestamp after which the refresh secret can no longer be rotated.
    pub expires_at: DateTime<Utc>,
    /// Timestamp when the session was created.
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}
