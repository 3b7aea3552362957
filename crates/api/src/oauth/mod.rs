//! OAuth provider plumbing.
//!
//! A [`Provider`] bundles the three endpoints of the authorization-code
//! dance plus a profile-normalization function, so adding a provider means
//! writing one descriptor module (see [`github`]) and registering it.

pub mod github;
pub mod state;

use serde_json::Value;

use crate::config::OAuthCredentials;

/// Error type for OAuth exchanges.
#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    /// Network-level failure talking to the provider.
    #[error("OAuth transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The provider returned an explicit error payload (often with HTTP 200).
    #[error("OAuth provider error '{error}': {description}")]
    Provider { error: String, description: String },

    /// The token exchange response carried no access token.
    #[error("OAuth token exchange response missing access_token")]
    MissingAccessToken,

    /// The profile response was missing required fields.
    #[error("OAuth profile missing required field: {0}")]
    Profile(&'static str),
}

/// Normalized identity information returned by a provider.
#[derive(Debug, Clone)]
pub struct UserSpec {
    /// The provider's stable id for this account.
    pub id: String,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub email: Option<String>,
    /// The raw profile document, stored alongside the link.
    pub raw_profile: Value,
}

/// A configured OAuth provider.
pub struct Provider {
    /// Short name used in URLs, e.g. `"github"`.
    pub service: &'static str,
    pub authorize_url: &'static str,
    pub token_url: &'static str,
    pub profile_url: &'static str,
    pub scope: &'static str,
    pub credentials: OAuthCredentials,
    /// Normalize the provider's profile document; must yield a stable id.
    pub map_profile: fn(Value) -> Result<UserSpec, OAuthError>,
}

impl Provider {
    /// The URL to send the user's browser to.
    pub fn authorize_redirect(&self, redirect_uri: &str, state_token: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&scope={}&state={}",
            self.authorize_url,
            urlencoding::encode(&self.credentials.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(self.scope),
            urlencoding::encode(state_token),
        )
    }

    /// Exchange an authorization code for an access token.
    ///
    /// Providers sometimes report failures in a 200 body, so the payload is
    /// inspected for an `error` field before anything else.
    pub async fn exchange_code(
        &self,
        http: &reqwest::Client,
        code: &str,
        redirect_uri: &str,
    ) -> Result<String, OAuthError> {
        let response: Value = http
            .post(self.token_url)
            .header(axum::http::header::ACCEPT, "application/json")
            .form(&[
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", redirect_uri),
            ])
            .send()
            .await?
            .json()
            .await?;

        if let Some(token) = response.get("access_token").and_then(Value::as_str) {
            return Ok(token.to_string());
        }
        if let Some(error) = response.get("error").and_then(Value::as_str) {
            return Err(OAuthError::Provider {
                error: error.to_string(),
                description: response
                    .get("error_description")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            });
        }
        Err(OAuthError::MissingAccessToken)
    }

    /// Fetch and normalize the account profile for an access token.
    pub async fn fetch_user(
        &self,
        http: &reqwest::Client,
        access_token: &str,
    ) -> Result<UserSpec, OAuthError> {
        let profile: Value = http
            .get(self.profile_url)
            .bearer_auth(access_token)
            .header(axum::http::header::USER_AGENT, "harbor")
            .header(axum::http::header::ACCEPT, "application/json")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        (self.map_profile)(profile)
    }
}
