//! Session cookie plumbing.
//!
//! The cookie carries the session row's UUID, signed by the jar so a forged
//! token never reaches the database. Expiry is enforced through the cookie's
//! max-age rather than server-side revocation scanning; a token that does
//! not resolve to a row simply means logged-out.
//!
//! Sessions only attach to same-origin requests. External callers that need
//! to issue requests must use a different authentication method entirely.

use axum::http::{header, HeaderMap};
use axum_extra::extract::cookie::{Cookie, SameSite, SignedCookieJar};
use harbor_core::types::DbId;
use harbor_db::models::session::Session;
use harbor_db::repositories::SessionRepo;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

/// Minimum interval between `last_active` touch writes per session.
pub const TOUCH_INTERVAL_SECS: f64 = 15.0;

/// Whether the request comes from our own origin. Requests without an
/// `Origin` header get the benefit of the doubt (top-level navigations and
/// same-origin GETs do not send one); anything else must match exactly.
pub fn is_same_origin(headers: &HeaderMap, root_url: &str) -> bool {
    match headers.get(header::ORIGIN) {
        None => true,
        Some(value) => value.to_str().map(|origin| origin == root_url).unwrap_or(false),
    }
}

/// Build the session cookie for a freshly created session.
pub fn session_cookie(state: &AppState, session_uuid: Uuid) -> Cookie<'static> {
    let config = &state.config;
    let mut cookie = Cookie::new(config.session_cookie_name.clone(), session_uuid.to_string());
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_secure(config.is_https());
    cookie.set_max_age(time::Duration::try_from(config.session_duration).ok());
    cookie
}

/// A removal cookie matching [`session_cookie`]'s attributes.
fn removal_cookie(state: &AppState) -> Cookie<'static> {
    let mut cookie = Cookie::new(state.config.session_cookie_name.clone(), "");
    cookie.set_path("/");
    cookie
}

/// Resolve the session referenced by the request's cookie, if any.
///
/// Also refreshes the row's `last_active`, throttled to one write per
/// [`TOUCH_INTERVAL_SECS`]; a failed touch is logged and ignored.
pub async fn resolve(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Option<Session>, sqlx::Error> {
    if !is_same_origin(headers, &state.config.root_url) {
        return Ok(None);
    }

    let jar = SignedCookieJar::from_headers(headers, state.cookie_key.clone());
    let Some(token) = jar
        .get(&state.config.session_cookie_name)
        .and_then(|cookie| Uuid::parse_str(cookie.value()).ok())
    else {
        return Ok(None);
    };

    let Some(session) = SessionRepo::find(&state.pools.root, token).await? else {
        return Ok(None);
    };

    if let Err(e) = SessionRepo::touch(&state.pools.root, session.uuid, TOUCH_INTERVAL_SECS).await {
        tracing::debug!(error = %e, "Session touch failed");
    }

    Ok(Some(session))
}

/// Create a session row for the user and add its cookie to the jar.
pub async fn establish(
    state: &AppState,
    jar: SignedCookieJar,
    user_id: DbId,
) -> Result<(SignedCookieJar, Session), AppError> {
    let session = SessionRepo::create(&state.pools.root, user_id).await?;
    let jar = jar.add(session_cookie(state, session.uuid));
    Ok((jar, session))
}

/// Delete the session row (when one exists) and clear the cookie.
pub async fn clear(
    state: &AppState,
    jar: SignedCookieJar,
    session: Option<&Session>,
) -> Result<SignedCookieJar, AppError> {
    if let Some(session) = session {
        SessionRepo::delete(&state.pools.root, session.uuid).await?;
    }
    Ok(jar.remove(removal_cookie(state)))
}
