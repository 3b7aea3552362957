//! Route tree and middleware stack.

pub mod auth;
pub mod health;
pub mod oauth;

use std::time::Duration;

use axum::http::StatusCode;
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::handlers;
use crate::middleware::errors::negotiate_errors;
use crate::state::AppState;

/// Build the full application: routes plus the middleware stack. Used by
/// the binary and by integration tests so both exercise the same stack.
///
/// Route hierarchy:
///
/// ```text
/// /healthz                      health check
/// /auth/{service}[/callback]    OAuth dance
/// /logout                       browser logout
/// /api/...                      account operations (JSON)
/// /*                            server-side page render
/// ```
pub fn app(state: AppState) -> Router {
    let request_id_header = axum::http::HeaderName::from_static("x-request-id");

    let router = Router::new()
        .merge(health::router())
        .merge(oauth::router())
        .nest("/api", auth::router())
        // Everything else renders a page.
        .fallback(handlers::pages::ssr)
        // -- Middleware stack (applied bottom-up) --
        // Error content negotiation (closest to the handlers).
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            negotiate_errors,
        ))
        // Panic recovery: catch panics and return 500.
        .layer(CatchPanicLayer::new())
        // Request timeout.
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(state.config.request_timeout_secs),
        ))
        // Propagate request ID to response.
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        // Structured request/response tracing.
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Set request ID on incoming requests.
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid));

    // The app is same-origin by design; a permissive CORS layer only exists
    // for local development against a separate dev server.
    let router = if state.config.environment.expose_internals() {
        router.layer(CorsLayer::permissive())
    } else {
        router
    };

    router.with_state(state)
}
