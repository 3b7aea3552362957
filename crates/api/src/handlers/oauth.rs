//! Browser-facing OAuth flow: start, callback, and logout.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum_extra::extract::cookie::SignedCookieJar;
use harbor_db::models::identity::LinkOrRegister;
use harbor_db::repositories::{IdentityRepo, LinkOrRegisterError};
use harbor_core::error::ErrorCode;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::middleware::session::MaybeSession;
use crate::oauth::{state as oauth_state, Provider};
use crate::session;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StartParams {
    /// Where to send the user after login; sanitized before use.
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    /// Set when the user denied the authorization screen.
    pub error: Option<String>,
}

/// GET /auth/{service}
///
/// Redirect the browser to the provider's authorization screen. The
/// sanitized `next` target rides along in the signed `state` parameter.
pub async fn start(
    State(state): State<AppState>,
    Path(service): Path<String>,
    Query(params): Query<StartParams>,
) -> AppResult<Response> {
    let provider = resolve_provider(&state, &service)?;
    let state_token = oauth_state::encode(&state.config.secret, params.next.as_deref());
    let url = provider.authorize_redirect(&callback_uri(&state, &provider), &state_token);
    Ok(super::redirect(StatusCode::FOUND, &url))
}

/// GET /auth/{service}/callback
///
/// Complete the dance: exchange the code, fetch the profile, link or
/// register, establish a session, and redirect to the `next` target.
/// Provider-side failures send the user back to the login page.
pub async fn callback(
    State(state): State<AppState>,
    Path(service): Path<String>,
    Query(params): Query<CallbackParams>,
    session: MaybeSession,
    jar: SignedCookieJar,
) -> AppResult<(SignedCookieJar, Response)> {
    let provider = resolve_provider(&state, &service)?;

    let next = params
        .state
        .as_deref()
        .and_then(|s| oauth_state::decode(&state.config.secret, s))
        .unwrap_or_else(|| "/".to_string());

    let code = match (&params.code, &params.error) {
        (Some(code), None) => code.clone(),
        _ => {
            tracing::warn!(
                service = provider.service,
                error = params.error.as_deref().unwrap_or("missing code"),
                "OAuth callback without a usable code",
            );
            return Ok((jar, super::redirect(StatusCode::FOUND, "/login")));
        }
    };

    let spec = async {
        let token = provider
            .exchange_code(&state.http, &code, &callback_uri(&state, &provider))
            .await?;
        provider.fetch_user(&state.http, &token).await
    }
    .await;
    let spec = match spec {
        Ok(spec) => spec,
        Err(e) => {
            tracing::warn!(service = provider.service, error = %e, "OAuth exchange failed");
            return Ok((jar, super::redirect(StatusCode::FOUND, "/login")));
        }
    };

    // A logged-in user is adding a login method, not creating an account.
    let input = LinkOrRegister {
        session_user_id: session.0.as_ref().map(|s| s.user_id),
        service: provider.service.to_string(),
        identifier: spec.id,
        username: spec.username,
        name: spec.display_name,
        avatar_url: spec.avatar_url,
        email: spec.email,
        details: spec.raw_profile,
    };
    let user = IdentityRepo::link_or_register(&state.pools.root, &input)
        .await
        .map_err(|e| match e {
            LinkOrRegisterError::Database(db) => AppError::Database(db),
            other => {
                tracing::error!(error = %other, "link_or_register failed");
                AppError::coded(ErrorCode::RegistrationFailed, "Registration failed")
            }
        })?;

    // Resume the existing session when there is one; otherwise start one.
    let jar = match session.0 {
        Some(_) => jar,
        None => session::establish(&state, jar, user.id).await?.0,
    };
    Ok((jar, super::redirect(StatusCode::FOUND, &next)))
}

/// GET /logout
///
/// Browser logout: drop the session, clear the cookie, go home.
pub async fn logout_page(
    State(state): State<AppState>,
    session: MaybeSession,
    jar: SignedCookieJar,
) -> AppResult<(SignedCookieJar, Response)> {
    let jar = session::clear(&state, jar, session.0.as_ref()).await?;
    Ok((jar, super::redirect(StatusCode::FOUND, "/")))
}

/// Look up a configured provider by its URL name.
fn resolve_provider(state: &AppState, service: &str) -> Result<Provider, AppError> {
    match service {
        crate::oauth::github::SERVICE => state
            .config
            .github
            .clone()
            .map(crate::oauth::github::provider)
            .ok_or_else(|| AppError::NotFound("OAuth provider not configured: github".into())),
        other => Err(AppError::NotFound(format!(
            "Unknown OAuth provider: {other}"
        ))),
    }
}

fn callback_uri(state: &AppState, provider: &Provider) -> String {
    format!("{}/auth/{}/callback", state.config.root_url, provider.service)
}
