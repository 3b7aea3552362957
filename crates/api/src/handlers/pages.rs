//! Catch-all server-side page rendering.

use axum::extract::State;
use axum::http::Uri;
use axum::response::{Html, IntoResponse, Response};

use crate::error::AppResult;
use crate::middleware::session::MaybeSession;
use crate::render::{self, RenderOutcome};
use crate::state::AppState;

/// GET fallback: render the page for the request path, or issue the
/// redirect the render signalled.
pub async fn ssr(
    State(state): State<AppState>,
    session: MaybeSession,
    uri: Uri,
) -> AppResult<Response> {
    let outcome = render::render_request(&state, uri.path(), session.0.as_ref()).await?;
    Ok(match outcome {
        RenderOutcome::Redirect { status, location } => super::redirect(status, &location),
        RenderOutcome::Page { status, html } => (status, Html(html)).into_response(),
    })
}
