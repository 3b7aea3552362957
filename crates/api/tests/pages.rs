//! HTTP-level integration tests for server-side rendering and error
//! content negotiation.

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use common::{body_json, body_text, build_test_app, get, register_user};
use sqlx::PgPool;
use tower::ServiceExt;

/// Anonymous home render embeds the hydration payload with a null user.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_home_renders_with_embedded_data(pool: PgPool) {
    let app = build_test_app(pool);

    let response = get(app, "/", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let html = body_text(response).await;
    assert!(html.contains("<div id=\"root\">"));
    assert!(html.contains("window.__INIT_DATA__ = {\"currentUser\":null}"));
}

/// A logged-in render resolves the user into the payload and the markup.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_home_renders_the_current_user(pool: PgPool) {
    let app = build_test_app(pool);
    let (cookie, _) = register_user(app.clone(), "alice").await;

    let html = body_text(get(app, "/", Some(&cookie), None).await).await;
    assert!(html.contains("Welcome back, alice"));
    assert!(html.contains("\"username\":\"alice\""));
}

/// Pages can signal a redirect instead of a body; the settings page does
/// so for anonymous visitors, preserving the return target.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_settings_redirects_anonymous_visitors(pool: PgPool) {
    let app = build_test_app(pool);

    let response = get(app, "/settings", None, None).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "/login?next=%2Fsettings"
    );
}

/// Login and register pages bounce logged-in users home.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_login_page_redirects_when_logged_in(pool: PgPool) {
    let app = build_test_app(pool);
    let (cookie, _) = register_user(app.clone(), "alice").await;

    for path in ["/login", "/register"] {
        let response = get(app.clone(), path, Some(&cookie), None).await;
        assert_eq!(response.status(), StatusCode::FOUND, "path={path}");
        assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/");
    }
}

/// Unknown paths render the not-found page with status 404.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_unknown_paths_render_404(pool: PgPool) {
    let app = build_test_app(pool);

    let response = get(app, "/no/such/page", None, None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let html = body_text(response).await;
    assert!(html.contains("Page not found"));
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_health_endpoint(pool: PgPool) {
    let app = build_test_app(pool);

    let response = get(app, "/healthz", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["db_healthy"], true);
}

// ---------------------------------------------------------------------------
// Error content negotiation
// ---------------------------------------------------------------------------

async fn failed_login_with_accept(app: axum::Router, accept: &str) -> axum::response::Response {
    let request = Request::builder()
        .method("POST")
        .uri("/api/login")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::ACCEPT, accept)
        .body(Body::from(
            serde_json::json!({ "username": "ghost", "password": "whatever-at-all" }).to_string(),
        ))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// JSON clients get the structured `{errors: [...]}` envelope.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_errors_negotiate_to_json(pool: PgPool) {
    let app = build_test_app(pool);

    let response = failed_login_with_accept(app, "application/json").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["errors"][0]["code"], "bad-credentials");
}

/// HTML clients get an error page instead of JSON.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_errors_negotiate_to_html(pool: PgPool) {
    let app = build_test_app(pool);

    let response = failed_login_with_accept(app, "text/html").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let html = body_text(response).await;
    assert!(html.contains("<h1>Something went wrong</h1>"));
    assert!(html.contains("Incorrect username/password"));
}

/// A client that accepts none of our formats gets 406.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_unacceptable_accept_header_is_406(pool: PgPool) {
    let app = build_test_app(pool);

    let response = failed_login_with_accept(app, "application/xml").await;
    assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);
}
