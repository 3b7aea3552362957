//! Shared helpers for HTTP-level integration tests.
//!
//! Mirrors the router construction in `main.rs` via [`harbor_api::routes::app`]
//! so tests exercise the same middleware stack production uses.

use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;

use harbor_api::config::{AppConfig, Environment};
use harbor_api::routes;
use harbor_api::state::AppState;

/// Build a test `AppConfig` with safe defaults.
///
/// Uses the production environment so tests assert the client-facing error
/// shapes, not the widened development ones.
pub fn test_config() -> AppConfig {
    AppConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        root_url: "http://localhost:3000".to_string(),
        secret: "test-secret-which-is-not-secret".to_string(),
        session_cookie_name: "harbor.sid".to_string(),
        session_duration: Duration::from_secs(3 * 24 * 60 * 60),
        database_url: String::new(),
        auth_database_url: String::new(),
        github: None,
        worker_concurrency: 1,
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        environment: Environment::Production,
    }
}

/// Build the full application router against the given pool (used for both
/// the root and authenticator roles in tests).
pub fn build_test_app(pool: PgPool) -> Router {
    let pools = harbor_db::DbPools {
        root: pool.clone(),
        auth: pool,
    };
    routes::app(AppState::new(pools, test_config()))
}

/// POST a JSON body, optionally with a `Cookie` header.
pub async fn post_json(
    app: Router,
    path: &str,
    body: serde_json::Value,
    cookie: Option<&str>,
) -> Response {
    let mut request = Request::builder()
        .method("POST")
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        request = request.header(header::COOKIE, cookie);
    }
    let request = request.body(Body::from(body.to_string())).unwrap();
    app.oneshot(request).await.unwrap()
}

/// GET a path, optionally with `Cookie` and `Origin` headers.
pub async fn get(app: Router, path: &str, cookie: Option<&str>, origin: Option<&str>) -> Response {
    let mut request = Request::builder().method("GET").uri(path);
    if let Some(cookie) = cookie {
        request = request.header(header::COOKIE, cookie);
    }
    if let Some(origin) = origin {
        request = request.header(header::ORIGIN, origin);
    }
    let request = request.body(Body::empty()).unwrap();
    app.oneshot(request).await.unwrap()
}

/// Read the response body as JSON.
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).expect("body should be JSON")
}

/// Read the response body as text.
pub async fn body_text(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Extract the `name=value` part of the session cookie set by a response.
pub fn session_cookie(response: &Response) -> Option<String> {
    let set_cookie = response.headers().get(header::SET_COOKIE)?.to_str().ok()?;
    Some(set_cookie.split(';').next()?.to_string())
}

/// Register a user through the API and return `(cookie, user json)`.
pub async fn register_user(app: Router, username: &str) -> (String, serde_json::Value) {
    let body = serde_json::json!({
        "username": username,
        "email": format!("{username}@test.com"),
        "password": "a-long-enough-password",
    });
    let response = post_json(app, "/api/register", body, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = session_cookie(&response).expect("registration must set the session cookie");
    let json = body_json(response).await;
    (cookie, json)
}
