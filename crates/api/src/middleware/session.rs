//! Session extractors for Axum handlers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use harbor_core::error::ErrorCode;
use harbor_db::models::session::Session;

use crate::error::AppError;
use crate::session;
use crate::state::AppState;

/// The request's session, when it carries a valid same-origin cookie.
///
/// Resolving never fails the request: a missing, cross-origin, or
/// unresolvable token is simply `None`.
#[derive(Debug, Clone)]
pub struct MaybeSession(pub Option<Session>);

impl FromRequestParts<AppState> for MaybeSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = session::resolve(state, &parts.headers).await?;
        Ok(MaybeSession(session))
    }
}

/// A required session. Use this as an extractor parameter in any handler
/// that only makes sense for a logged-in user:
///
/// ```ignore
/// async fn my_handler(session: CurrentSession) -> AppResult<Json<()>> {
///     tracing::info!(user_id = session.0.user_id, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentSession(pub Session);

impl FromRequestParts<AppState> for CurrentSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match session::resolve(state, &parts.headers).await? {
            Some(session) => Ok(CurrentSession(session)),
            None => Err(AppError::coded(
                ErrorCode::NotAuthorized,
                "You must be logged in to do that",
            )),
        }
    }
}
