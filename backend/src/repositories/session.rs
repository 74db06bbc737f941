//! Session persistence.
//!
//! The rotation protocol only talks to [`SessionStore`]; implementations must
//! keep at most one row per user.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::StoreError;
use crate::models::session::Session;
use crate::types::UserId;

/// Storage contract for user sessions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Inserts the session, replacing any existing row for the same user.
    async fn save(&self, session: &Session) -> Result<(), StoreError>;

    /// Fails with [`StoreError::NotFound`] when the user has no session.
    async fn get(&self, user_id: UserId) -> Result<Session, StoreError>;

    /// Removes the user's session. Succeeds when there is nothing to remove.
    async fn delete(&self, user_id: UserId) -> Result<(), StoreError>;
}

/// Postgres-backed [`SessionStore`]. `sessions.user_id` is the primary key.
#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn save(&self, session: &Session) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO sessions
                (user_id, refresh_token_hash, user_agent, ip, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id) DO UPDATE
            SET refresh_token_hash = EXCLUDED.refresh_token_hash,
                user_agent = EXCLUDED.user_agent,
                ip = EXCLUDED.ip,
                expires_at = EXCLUDED.expires_at,
                created_at = EXCLUDED.created_at
            "#,
        )
        .bind(session.user_id)
        .bind(&session.refresh_token_hash)
        .bind(&session.user_agent)
        .bind(&session.ip)
        .bind(session.expires_at)
        .bind(session.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, user_id: UserId) -> Result<Session, StoreError> {
        sqlx::query_as::<_, Session>(
            r#"
            SELECT user_id, refresh_token_hash, user_agent, ip, expires_at, created_at
            FROM sessions
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)
    }

    async fn delete(&self, user_id: UserId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(StoreError::from)
    }
}
