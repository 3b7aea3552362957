//! Account emails sent via SMTP.
//!
//! [`Mailer`] wraps the `lettre` async SMTP transport. Configuration comes
//! from environment variables; when `SMTP_HOST` is unset the tasks log the
//! message instead of sending, which is the intended development behavior.

use harbor_core::types::DbId;
use serde::{Deserialize, Serialize};

use crate::registry::{TaskContext, TaskResult};

/// Error type for email delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    /// SMTP transport-level failure (authentication, connection, etc.).
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    /// The recipient or sender address could not be parsed.
    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// The MIME message could not be assembled.
    #[error("Email build error: {0}")]
    Build(String),
}

/// Default SMTP port (STARTTLS).
const DEFAULT_SMTP_PORT: u16 = 587;

/// Default sender address when `SMTP_FROM` is not set.
const DEFAULT_FROM_ADDRESS: &str = "noreply@harbor.local";

/// SMTP configuration.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub from_address: String,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,
}

impl EmailConfig {
    /// Load configuration from environment variables.
    ///
    /// Returns `None` if `SMTP_HOST` is not set, signalling that email
    /// delivery is not configured.
    ///
    /// | Variable        | Required | Default                |
    /// |-----------------|----------|------------------------|
    /// | `SMTP_HOST`     | yes      | --                     |
    /// | `SMTP_PORT`     | no       | `587`                  |
    /// | `SMTP_FROM`     | no       | `noreply@harbor.local` |
    /// | `SMTP_USER`     | no       | --                     |
    /// | `SMTP_PASSWORD` | no       | --                     |
    pub fn from_env() -> Option<Self> {
        let smtp_host = std::env::var("SMTP_HOST").ok()?;
        Some(Self {
            smtp_host,
            smtp_port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_SMTP_PORT),
            from_address: std::env::var("SMTP_FROM")
                .unwrap_or_else(|_| DEFAULT_FROM_ADDRESS.to_string()),
            smtp_user: std::env::var("SMTP_USER").ok(),
            smtp_password: std::env::var("SMTP_PASSWORD").ok(),
        })
    }
}

/// Sends plain-text account emails over SMTP.
pub struct Mailer {
    config: EmailConfig,
}

impl Mailer {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    pub async fn deliver(&self, to: &str, subject: &str, body: &str) -> Result<(), EmailError> {
        use lettre::{
            message::header::ContentType, transport::smtp::authentication::Credentials,
            AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
        };

        let email = Message::builder()
            .from(self.config.from_address.parse()?)
            .to(to.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| EmailError::Build(e.to_string()))?;

        let mut transport_builder =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.smtp_host)?
                .port(self.config.smtp_port);

        if let (Some(user), Some(pass)) = (&self.config.smtp_user, &self.config.smtp_password) {
            transport_builder =
                transport_builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        let mailer = transport_builder.build();
        mailer.send(email).await?;

        tracing::info!(to, subject, "Email sent");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Task payloads and handlers
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct SendPasswordResetEmail {
    pub user_id: DbId,
    pub email: String,
    /// Plaintext reset token; only its digest is stored server-side.
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendVerificationEmail {
    pub email_id: DbId,
    pub email: String,
    pub token: String,
}

pub async fn send_password_reset_email(ctx: TaskContext, payload: serde_json::Value) -> TaskResult {
    let payload: SendPasswordResetEmail = serde_json::from_value(payload)?;
    let link = format!(
        "{}/reset?user_id={}&token={}",
        ctx.root_url, payload.user_id, payload.token
    );
    let body = format!(
        "Someone requested a password reset for your account.\n\n\
         Reset it here: {link}\n\n\
         If this wasn't you, you can safely ignore this email."
    );
    deliver_or_log(&ctx, &payload.email, "Reset your password", &body).await
}

pub async fn send_verification_email(ctx: TaskContext, payload: serde_json::Value) -> TaskResult {
    let payload: SendVerificationEmail = serde_json::from_value(payload)?;
    let link = format!(
        "{}/verify?id={}&token={}",
        ctx.root_url, payload.email_id, payload.token
    );
    let body = format!(
        "Welcome! Please confirm this email address belongs to you.\n\n\
         Verify it here: {link}"
    );
    deliver_or_log(&ctx, &payload.email, "Verify your email", &body).await
}

async fn deliver_or_log(ctx: &TaskContext, to: &str, subject: &str, body: &str) -> TaskResult {
    match &ctx.mailer {
        Some(mailer) => {
            mailer.deliver(to, subject, body).await?;
            Ok(())
        }
        None => {
            tracing::info!(to, subject, "SMTP not configured; logging email instead");
            tracing::debug!(body, "Email body");
            Ok(())
        }
    }
}
