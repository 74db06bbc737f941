use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::{state::AppState, utils::jwt::AccessTokenStatus};

/// Requires a current (unexpired) access token and exposes its `UserId`.
pub async fn auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_bearer_token)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let claims = match state.auth.issuer().verify_access_token(token) {
        AccessTokenStatus::Valid(claims) => claims,
        AccessTokenStatus::ExpiredButAuthentic(_) | AccessTokenStatus::Invalid => {
            return Err(StatusCode::UNAUTHORIZED)
        }
    };
    let user_id = claims.user_id().map_err(|_| StatusCode::UNAUTHORIZED)?;

    request.extensions_mut().insert(user_id);
    Ok(next.run(request).await)
}

fn parse_bearer_token(header: &str) -> Option<&str> {
    if let Some(rest) = header.strip_prefix("Bearer ") {
        return Some(rest);
    }
    if let Some(rest) = header.strip_prefix("bearer ") {
        return Some(rest);
    }
    if let Some(space_idx) = header.find(' ') {
        let (scheme, rest) = header.split_at(space_idx);
        if scheme.eq_ignore_ascii_case("bearer") {
            return Some(rest.trim_start());
        }
    }
    None
}
