use std::sync::Arc;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use sha2::{Digest, Sha512};

use crate::config::AppConfig;

/// Shared application state available to all Axum handlers via
/// `State<AppState>`. Cheaply cloneable.
#[derive(Clone)]
pub struct AppState {
    /// Root + authenticator database pools.
    pub pools: harbor_db::DbPools,
    pub config: Arc<AppConfig>,
    /// Key for the signed session cookie jar, derived from the secret.
    pub cookie_key: Key,
    /// Shared HTTP client for OAuth token exchanges and profile fetches.
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(pools: harbor_db::DbPools, config: AppConfig) -> Self {
        let cookie_key = derive_cookie_key(&config.secret);
        Self {
            pools,
            config: Arc::new(config),
            cookie_key,
            http: reqwest::Client::new(),
        }
    }
}

/// Lets `SignedCookieJar` pull its key straight out of the app state.
impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Key {
        state.cookie_key.clone()
    }
}

/// Stretch the configured secret to the 64 bytes the cookie key wants.
/// SHA-512 keeps this deterministic regardless of the secret's length.
fn derive_cookie_key(secret: &str) -> Key {
    let digest = Sha512::digest(secret.as_bytes());
    Key::from(digest.as_slice())
}
