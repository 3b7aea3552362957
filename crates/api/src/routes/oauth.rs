//! Browser-facing session routes.

use axum::routing::get;
use axum::Router;

use crate::handlers::oauth;
use crate::state::AppState;

/// Root-level routes for the OAuth dance and browser logout.
///
/// ```text
/// GET /auth/{service}           -> start (redirect to provider)
/// GET /auth/{service}/callback  -> callback (complete, set cookie)
/// GET /logout                   -> logout_page (clear cookie, go home)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/{service}", get(oauth::start))
        .route("/auth/{service}/callback", get(oauth::callback))
        .route("/logout", get(oauth::logout_page))
}
