use std::time::Duration;

use axum::{
    extract::Request,
    http::StatusCode,
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{catch_panic::CatchPanicLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::{
    error::AppError,
    handlers,
    middleware::{self as app_middleware, RequestId},
    state::AppState,
};

pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
    // Build public routes (no auth)
    let public_routes = Router::new()
        .route("/auth/tokens", post(handlers::auth::create_tokens))
        .route("/auth/tokens/refresh", post(handlers::auth::refresh));

    // Build user-protected routes (auth required)
    let user_routes = Router::new()
        .route("/me", get(handlers::auth::me))
        .route("/logout", post(handlers::auth::logout))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            app_middleware::auth,
        ));

    let app = Router::new()
        .merge(public_routes)
        .merge(user_routes)
        .with_state(state);

    with_middleware(app, request_timeout)
}

/// Wraps `router` in the shared stack, outermost first: request id, tracing,
/// request timeout, panic recovery.
pub fn with_middleware(router: Router, request_timeout: Duration) -> Router {
    router.layer(
        ServiceBuilder::new()
            .layer(axum_middleware::from_fn(app_middleware::request_id))
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
                let request_id = request
                    .extensions()
                    .get::<RequestId>()
                    .map(RequestId::as_str)
                    .unwrap_or_default();
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            }))
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                request_timeout,
            ))
            .layer(CatchPanicLayer::custom(panic_response)),
    )
}

fn panic_response(_panic: Box<dyn std::any::Any + Send + 'static>) -> Response {
    AppError::InternalServerError(anyhow::anyhow!("request handler panicked")).into_response()
}
