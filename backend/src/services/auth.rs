//! Access/refresh token issuance and single-use rotation.
//!
//! Each user has at most one session. A refresh is accepted only when every
//! gate in [`AuthService::refresh_tokens`] passes; device changes, expiry and
//! hash mismatches destroy the session so the client must sign in again.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};

use crate::{
    config::Config,
    error::{AuthError, StoreError},
    models::session::Session,
    repositories::SessionStore,
    services::anomaly::{AnomalyNotifier, OriginChange},
    types::UserId,
    utils::{
        hashing::SecretHasher,
        jwt::{decode_refresh_token, encode_refresh_token, issue_refresh_secret, TokenIssuer},
    },
};

/// An access token and its transport-encoded refresh token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone, Copy)]
pub struct RotationSettings {
    pub refresh_ttl: Duration,
    /// Deadline applied to every session store call.
    pub store_timeout: StdDuration,
    /// Deadline for the detached origin-change notification.
    pub notify_timeout: StdDuration,
}

impl RotationSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            refresh_ttl: config.refresh_token_ttl,
            store_timeout: config.store_timeout(),
            notify_timeout: config.webhook_timeout(),
        }
    }
}

pub struct AuthService {
    store: Arc<dyn SessionStore>,
    notifier: Arc<dyn AnomalyNotifier>,
    hasher: Arc<dyn SecretHasher>,
    issuer: TokenIssuer,
    settings: RotationSettings,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn SessionStore>,
        notifier: Arc<dyn AnomalyNotifier>,
        hasher: Arc<dyn SecretHasher>,
        issuer: TokenIssuer,
        settings: RotationSettings,
    ) -> Self {
        Self {
            store,
            notifier,
            hasher,
            issuer,
            settings,
        }
    }

    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    /// Issues a fresh pair and stores a new session, replacing any prior one.
    pub async fn create_tokens(
        &self,
        user_id: UserId,
        user_agent: &str,
        ip: &str,
    ) -> Result<TokenPair, AuthError> {
        const OP: &str = "auth.create_tokens";

        let access_token = self
            .issuer
            .issue_access_token(user_id)
            .map_err(|e| AuthError::internal(OP, e))?;
        let refresh_secret = issue_refresh_secret();
        let refresh_token_hash = self
            .hasher
            .hash(&refresh_secret)
            .map_err(|e| AuthError::internal(OP, e))?;

        let now = Utc::now();
        let session = Session {
            user_id,
            refresh_token_hash,
            user_agent: user_agent.to_string(),
            ip: ip.to_string(),
            expires_at: now + self.settings.refresh_ttl,
            created_at: now,
        };

        self.bounded(OP, self.store.save(&session)).await?;
        tracing::debug!(%user_id, expires_at = %session.expires_at, "Issued token pair");

        Ok(TokenPair {
            access_token,
            refresh_token: encode_refresh_token(&refresh_secret),
        })
    }

    /// Validates a refresh request against the stored session and rotates it.
    pub async fn refresh_tokens(
        &self,
        access_token: &str,
        refresh_token: &str,
        user_agent: &str,
        ip: &str,
    ) -> Result<TokenPair, AuthError> {
        const OP: &str = "auth.refresh_tokens";

        let refresh_secret =
            decode_refresh_token(refresh_token).map_err(|_| AuthError::InvalidRefreshToken)?;

        let claims = self.issuer.parse_access_token(access_token)?;
        let user_id = claims.user_id()?;

        let session = self.bounded(OP, self.store.get(user_id)).await?;

        if session.user_agent != user_agent {
            tracing::warn!(%user_id, "User-agent mismatch on token refresh, terminating session");
            self.terminate(OP, user_id).await;
            return Err(AuthError::UserAgentMismatch);
        }

        if session.ip != ip {
            tracing::warn!(
                %user_id,
                old_ip = %session.ip,
                new_ip = %ip,
                "IP address mismatch on token refresh"
            );
            self.spawn_origin_alert(OriginChange::new(user_id, session.ip.as_str(), ip));
        }

        if session.is_expired_at(Utc::now()) {
            tracing::warn!(%user_id, expires_at = %session.expires_at, "Refresh on expired session");
            self.terminate(OP, user_id).await;
            return Err(AuthError::SessionExpired);
        }

        let matches = match self
            .hasher
            .verify(&refresh_secret, &session.refresh_token_hash)
        {
            Ok(matches) => matches,
            Err(err) => {
                tracing::warn!(error = %err, %user_id, "Stored refresh token hash is unusable");
                false
            }
        };
        if !matches {
            tracing::warn!(%user_id, "Refresh token does not match session, terminating session");
            self.terminate(OP, user_id).await;
            return Err(AuthError::InvalidRefreshToken);
        }

        // The presented secret must never rotate twice.
        self.bounded(OP, self.store.delete(user_id)).await?;

        let pair = self.create_tokens(user_id, user_agent, ip).await?;
        tracing::debug!(%user_id, "Rotated token pair");
        Ok(pair)
    }

    /// Ends the user's session. Succeeds when there is none.
    pub async fn logout(&self, user_id: UserId) -> Result<(), AuthError> {
        const OP: &str = "auth.logout";

        self.bounded(OP, self.store.delete(user_id)).await?;
        tracing::debug!(%user_id, "Session closed");
        Ok(())
    }

    /// Deletes a session after a failed gate. The gate's error wins over a
    /// failed delete.
    async fn terminate(&self, op: &'static str, user_id: UserId) {
        if let Err(err) = self.bounded(op, self.store.delete(user_id)).await {
            tracing::warn!(error = %err, %user_id, "Failed to delete session after rejected refresh");
        }
    }

    fn spawn_origin_alert(&self, alert: OriginChange) {
        let notifier = Arc::clone(&self.notifier);
        let timeout = self.settings.notify_timeout;

        tokio::spawn(async move {
            match tokio::time::timeout(timeout, notifier.notify_origin_change(&alert)).await {
                Ok(Ok(())) => {
                    tracing::debug!(user_id = %alert.user_id, "Delivered origin change alert");
                }
                Ok(Err(err)) => {
                    tracing::warn!(
                        error = %err,
                        user_id = %alert.user_id,
                        "Failed to deliver origin change alert"
                    );
                }
                Err(_) => {
                    tracing::warn!(
                        user_id = %alert.user_id,
                        timeout_ms = timeout.as_millis() as u64,
                        "Origin change alert timed out"
                    );
                }
            }
        });
    }

    async fn bounded<T>(
        &self,
        op: &'static str,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, AuthError> {
        match tokio::time::timeout(self.settings.store_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(StoreError::NotFound)) => Err(AuthError::SessionNotFound),
            Ok(Err(err)) => Err(AuthError::internal(op, err)),
            Err(_) => Err(AuthError::StoreTimeout { op }),
        }
    }
}
