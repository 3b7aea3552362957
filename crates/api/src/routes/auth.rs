//! Route definitions for the account API.

use axum::routing::post;
use axum::Router;

use crate::handlers::auth;
use crate::state::AppState;

/// Routes mounted at `/api`.
///
/// ```text
/// POST /register                 -> register (public)
/// POST /login                    -> login (public)
/// POST /logout                   -> logout
/// POST /forgot-password          -> forgot_password (public)
/// POST /reset-password           -> reset_password (public)
/// POST /verify-email             -> verify_email (public)
/// POST /settings/delete-email    -> delete_email (requires session)
/// POST /settings/delete-account  -> delete_account (requires session)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/reset-password", post(auth::reset_password))
        .route("/verify-email", post(auth::verify_email))
        .route("/settings/delete-email", post(auth::delete_email))
        .route("/settings/delete-account", post(auth::delete_account))
}
