//! Request handlers.

pub mod auth;
pub mod oauth;
pub mod pages;

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

/// An HTTP redirect with an explicit status (302 unless a page signalled
/// otherwise).
pub(crate) fn redirect(status: StatusCode, location: &str) -> Response {
    (status, [(header::LOCATION, location.to_string())]).into_response()
}
