//! GitHub OAuth provider descriptor.

use serde_json::Value;

use crate::config::OAuthCredentials;
use crate::oauth::{OAuthError, Provider, UserSpec};

pub const SERVICE: &str = "github";

pub fn provider(credentials: OAuthCredentials) -> Provider {
    Provider {
        service: SERVICE,
        authorize_url: "https://github.com/login/oauth/authorize",
        token_url: "https://github.com/login/oauth/access_token",
        profile_url: "https://api.github.com/user",
        scope: "user:email",
        credentials,
        map_profile,
    }
}

/// Normalize a GitHub `/user` document.
///
/// GitHub ids are numbers; they are stringified for the
/// `(service, identifier)` pair. `name` and `email` may be null.
fn map_profile(profile: Value) -> Result<UserSpec, OAuthError> {
    let id = match profile.get("id") {
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        _ => return Err(OAuthError::Profile("id")),
    };
    let username = profile
        .get("login")
        .and_then(Value::as_str)
        .ok_or(OAuthError::Profile("login"))?
        .to_string();

    Ok(UserSpec {
        id,
        display_name: profile
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| Some(username.clone())),
        avatar_url: profile
            .get("avatar_url")
            .and_then(Value::as_str)
            .map(str::to_string),
        email: profile
            .get("email")
            .and_then(Value::as_str)
            .map(str::to_string),
        username,
        raw_profile: profile,
    })
}
