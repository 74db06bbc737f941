mod support;

use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use keyturn_backend::{
    handlers::{
        auth::{MeResponse, TokensResponse},
        ClientIpPolicy,
    },
    router::build_router,
    state::AppState,
    types::UserId,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use support::{assert_no_alert, harness, next_alert};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

fn app() -> Router {
    app_with(ClientIpPolicy {
        trust_proxy_headers: true,
    })
}

fn app_with(client_ip: ClientIpPolicy) -> Router {
    build_router(AppState::new(harness().service, client_ip), REQUEST_TIMEOUT)
}

fn create_request(query: &str, agent: &str, ip: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(format!("/auth/tokens{query}"))
        .header(header::USER_AGENT, agent)
        .header("x-forwarded-for", ip)
        .body(Body::empty())
        .expect("request")
}

fn refresh_request(tokens: &TokensResponse, agent: &str, ip: &str) -> Request<Body> {
    let body = json!({
        "access_token": tokens.access_token,
        "refresh_token": tokens.refresh_token,
    });
    Request::builder()
        .method(Method::POST)
        .uri("/auth/tokens/refresh")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::USER_AGENT, agent)
        .header("x-forwarded-for", ip)
        .body(Body::from(body.to_string()))
        .expect("request")
}

fn bearer_request(method: Method, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .expect("request")
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

async fn sign_in(app: &Router, user_id: UserId) -> TokensResponse {
    let response = app
        .clone()
        .oneshot(create_request(&format!("?user_id={user_id}"), "agentA", "10.0.0.1"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    serde_json::from_value(json_body(response).await).expect("tokens")
}

#[tokio::test]
async fn create_tokens_requires_user_id() {
    let app = app();
    let response = app
        .clone()
        .oneshot(create_request("", "agentA", "10.0.0.1"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["code"], "BAD_REQUEST");

    let response = app
        .oneshot(create_request("?user_id=", "agentA", "10.0.0.1"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_tokens_rejects_non_uuid_user_id() {
    let response = app()
        .oneshot(create_request("?user_id=not-a-uuid", "agentA", "10.0.0.1"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_and_refresh_over_http() {
    let app = app();
    let tokens = sign_in(&app, UserId::new()).await;
    assert!(!tokens.access_token.is_empty());
    assert!(!tokens.refresh_token.is_empty());

    let response = app
        .clone()
        .oneshot(refresh_request(&tokens, "agentA", "10.0.0.1"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let rotated: TokensResponse =
        serde_json::from_value(json_body(response).await).expect("tokens");
    assert_ne!(rotated.refresh_token, tokens.refresh_token);

    let replay = app
        .oneshot(refresh_request(&tokens, "agentA", "10.0.0.1"))
        .await
        .expect("response");
    assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(replay).await;
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn refresh_rejects_malformed_body() {
    let app = app();
    for (content_type, body) in [
        ("application/json", "{not json"),
        ("application/json", r#"{"access_token":"a"}"#),
        ("text/plain", r#"{"access_token":"a","refresh_token":"b"}"#),
    ] {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/auth/tokens/refresh")
                    .header(header::CONTENT_TYPE, content_type)
                    .body(Body::from(body))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {body:?}");
    }
}

#[tokio::test]
async fn refresh_from_new_device_is_unauthorized() {
    let app = app();
    let tokens = sign_in(&app, UserId::new()).await;

    let response = app
        .clone()
        .oneshot(refresh_request(&tokens, "agentB", "10.0.0.1"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(refresh_request(&tokens, "agentA", "10.0.0.1"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn me_requires_bearer_token() {
    let app = app();
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/me")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(bearer_request(Method::GET, "/me", "garbage"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn me_returns_token_subject() {
    let app = app();
    let user_id = UserId::new();
    let tokens = sign_in(&app, user_id).await;

    let response = app
        .oneshot(bearer_request(Method::GET, "/me", &tokens.access_token))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let me: MeResponse = serde_json::from_value(json_body(response).await).expect("me");
    assert_eq!(me.user_id, user_id);
}

#[tokio::test]
async fn logout_ends_refresh() {
    let app = app();
    let tokens = sign_in(&app, UserId::new()).await;

    let response = app
        .clone()
        .oneshot(bearer_request(Method::POST, "/logout", &tokens.access_token))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(bearer_request(Method::POST, "/logout", &tokens.access_token))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(refresh_request(&tokens, "agentA", "10.0.0.1"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn responses_carry_request_id() {
    let app = app();
    let response = app
        .clone()
        .oneshot(create_request("", "agentA", "10.0.0.1"))
        .await
        .expect("response");
    let generated = response
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .expect("generated request id");
    assert!(uuid::Uuid::parse_str(generated).is_ok());

    let mut request = create_request("", "agentA", "10.0.0.1");
    request
        .headers_mut()
        .insert("x-request-id", "client-req-42".parse().expect("header"));
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(
        response.headers().get("x-request-id").and_then(|v| v.to_str().ok()),
        Some("client-req-42")
    );
}

#[tokio::test]
async fn forwarded_ip_only_counts_when_trusted() {
    for (trust_proxy_headers, expect_alert) in [(false, false), (true, true)] {
        let mut h = harness();
        let app = build_router(
            AppState::new(h.service, ClientIpPolicy { trust_proxy_headers }),
            REQUEST_TIMEOUT,
        );
        let tokens = sign_in(&app, UserId::new()).await;

        let response = app
            .oneshot(refresh_request(&tokens, "agentA", "203.0.113.99"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        if expect_alert {
            let alert = next_alert(&mut h.alerts).await.expect("origin alert");
            assert_eq!(alert.old_ip, "10.0.0.1");
            assert_eq!(alert.new_ip, "203.0.113.99");
        } else {
            assert_no_alert(&mut h.alerts).await;
        }
    }
}
