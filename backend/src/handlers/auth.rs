use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::AppError, handlers::client::ClientInfo, services::auth::TokenPair, state::AppState,
    types::UserId,
};

#[derive(Debug, Deserialize)]
pub struct CreateTokensQuery {
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokensResponse {
    pub access_token: String,
    pub refresh_token: String,
}

impl From<TokenPair> for TokensResponse {
    fn from(pair: TokenPair) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MeResponse {
    pub user_id: UserId,
}

pub async fn create_tokens(
    State(state): State<AppState>,
    client: ClientInfo,
    query: Result<Query<CreateTokensQuery>, QueryRejection>,
) -> Result<Json<TokensResponse>, AppError> {
    let Query(query) = query.map_err(|_| AppError::BadRequest("Invalid query".to_string()))?;
    let raw_user_id = query
        .user_id
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::BadRequest("user_id is required".to_string()))?;
    let user_id: UserId = raw_user_id
        .parse()
        .map_err(|_| AppError::BadRequest("invalid user_id".to_string()))?;

    let pair = state
        .auth
        .create_tokens(user_id, &client.user_agent, &client.ip)
        .await?;

    Ok(Json(pair.into()))
}

pub async fn refresh(
    State(state): State<AppState>,
    client: ClientInfo,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<TokensResponse>, AppError> {
    let Json(payload) =
        payload.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
    let pair = state
        .auth
        .refresh_tokens(
            &payload.access_token,
            &payload.refresh_token,
            &client.user_agent,
            &client.ip,
        )
        .await?;

    Ok(Json(pair.into()))
}

pub async fn me(Extension(user_id): Extension<UserId>) -> Json<MeResponse> {
    Json(MeResponse { user_id })
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
) -> Result<StatusCode, AppError> {
    state.auth.logout(user_id).await?;
    Ok(StatusCode::OK)
}
