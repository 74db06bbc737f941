use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Failures surfaced by the token rotation protocol.
///
/// The first four variants are the domain kinds callers map to an
/// authentication failure. `UserAgentMismatch` also forces re-authentication,
/// since the session has already been destroyed when it is returned.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("session not found")]
    SessionNotFound,
    #[error("invalid refresh token")]
    InvalidRefreshToken,
    #[error("session has expired")]
    SessionExpired,
    #[error("invalid access token")]
    InvalidAccessToken,
    #[error("user-agent mismatch")]
    UserAgentMismatch,
    #[error("{op}: session store deadline exceeded")]
    StoreTimeout { op: &'static str },
    #[error("{op}: {source}")]
    Internal {
        op: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl AuthError {
    pub fn internal(op: &'static str, source: impl Into<anyhow::Error>) -> Self {
        AuthError::Internal {
            op,
            source: source.into(),
        }
    }

    /// True for failures that mean the caller must sign in again.
    pub fn is_auth_failure(&self) -> bool {
        !matches!(
            self,
            AuthError::StoreTimeout { .. } | AuthError::Internal { .. }
        )
    }
}

/// Failures reported by a [`SessionStore`](crate::repositories::SessionStore).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("session not found")]
    NotFound,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Debug)]
pub enum AppError {
    Unauthorized(String),
    BadRequest(String),
    InternalServerError(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, code) = match self {
            AppError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, msg, "UNAUTHORIZED".to_string())
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, "BAD_REQUEST".to_string()),
            AppError::InternalServerError(err) => {
                tracing::error!("Internal server error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    "INTERNAL_SERVER_ERROR".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_message,
            code,
        });

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalServerError(err)
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::UserAgentMismatch => {
                AppError::Unauthorized("Session terminated, please sign in again".to_string())
            }
            err if err.is_auth_failure() => AppError::Unauthorized(err.to_string()),
            err => AppError::InternalServerError(err.into()),
        }
    }
}
