use std::time::Duration;

/// Deployment environment, controlling how much error detail leaves the
/// server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl Environment {
    fn from_env() -> Self {
        match std::env::var("APP_ENV").as_deref() {
            Ok("development") => Environment::Development,
            Ok("test") => Environment::Test,
            _ => Environment::Production,
        }
    }

    /// Whether raw database diagnostics may be included in error responses.
    pub fn expose_internals(self) -> bool {
        matches!(self, Environment::Development | Environment::Test)
    }
}

/// OAuth client credentials for one provider.
#[derive(Debug, Clone)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Default session lifetime: 3 days.
const DEFAULT_SESSION_DURATION_MS: i64 = 3 * 24 * 60 * 60 * 1000;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Canonical origin of the deployment, e.g. `https://app.example.com`.
    /// Requests carrying a different `Origin` header never get a session.
    pub root_url: String,
    /// Cookie-signing secret.
    pub secret: String,
    /// Session cookie name (default: `harbor.sid`).
    pub session_cookie_name: String,
    /// Maximum session lifetime, enforced via cookie max-age.
    pub session_duration: Duration,
    /// Privileged connection string.
    pub database_url: String,
    /// Authenticator connection string; falls back to `database_url`.
    pub auth_database_url: String,
    /// GitHub OAuth client, when configured.
    pub github: Option<OAuthCredentials>,
    /// Concurrent job budget for the embedded runner (default: `4`).
    pub worker_concurrency: usize,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Per-hook budget during graceful shutdown (default: `30`).
    pub shutdown_timeout_secs: u64,
    pub environment: Environment,
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var                                   | Default        |
    /// |-------------------------------------------|----------------|
    /// | `HOST`                                    | `0.0.0.0`      |
    /// | `PORT`                                    | `3000`         |
    /// | `ROOT_URL`                                | required       |
    /// | `SECRET`                                  | required       |
    /// | `SESSION_COOKIE_NAME`                     | `harbor.sid`   |
    /// | `MAXIMUM_SESSION_DURATION_IN_MILLISECONDS`| 3 days         |
    /// | `DATABASE_URL`                            | required       |
    /// | `AUTH_DATABASE_URL`                       | `DATABASE_URL` |
    /// | `GITHUB_KEY` / `GITHUB_SECRET`            | unset          |
    /// | `WORKER_CONCURRENCY`                      | `4`            |
    /// | `REQUEST_TIMEOUT_SECS`                    | `30`           |
    /// | `SHUTDOWN_TIMEOUT_SECS`                   | `30`           |
    /// | `APP_ENV`                                 | `production`   |
    pub fn from_env() -> Self {
        let root_url = trim_trailing_slash(
            std::env::var("ROOT_URL").expect("ROOT_URL must be set"),
        );
        let secret = std::env::var("SECRET").expect("SECRET must be set");
        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let auth_database_url =
            std::env::var("AUTH_DATABASE_URL").unwrap_or_else(|_| database_url.clone());

        let session_duration_ms: i64 =
            std::env::var("MAXIMUM_SESSION_DURATION_IN_MILLISECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|ms| *ms > 0)
                .unwrap_or(DEFAULT_SESSION_DURATION_MS);

        let github = match (std::env::var("GITHUB_KEY"), std::env::var("GITHUB_SECRET")) {
            (Ok(client_id), Ok(client_secret)) => Some(OAuthCredentials {
                client_id,
                client_secret,
            }),
            _ => None,
        };

        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".into())
                .parse()
                .expect("PORT must be a valid u16"),
            root_url,
            secret,
            session_cookie_name: std::env::var("SESSION_COOKIE_NAME")
                .unwrap_or_else(|_| "harbor.sid".into()),
            session_duration: Duration::from_millis(session_duration_ms as u64),
            database_url,
            auth_database_url,
            github,
            worker_concurrency: std::env::var("WORKER_CONCURRENCY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(4),
            request_timeout_secs: std::env::var("REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            shutdown_timeout_secs: std::env::var("SHUTDOWN_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            environment: Environment::from_env(),
        }
    }

    /// Whether the deployment is served over HTTPS (controls the cookie's
    /// `Secure` attribute).
    pub fn is_https(&self) -> bool {
        self.root_url.starts_with("https://")
    }
}

fn trim_trailing_slash(mut url: String) -> String {
    while url.ends_with('/') {
        url.pop();
    }
    url
}
