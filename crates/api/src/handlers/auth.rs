//! Handlers for the account API: register, login, logout, password reset,
//! and email management.

use axum::extract::State;
use axum::Json;
use axum_extra::extract::cookie::SignedCookieJar;
use chrono::Utc;
use harbor_core::error::{CoreError, ErrorCode};
use harbor_core::types::DbId;
use harbor_db::models::job::EnqueueJob;
use harbor_db::models::user::{CreateUser, UserResponse};
use harbor_db::repositories::{
    EmailDeletion, EmailRepo, JobRepo, SecretsRepo, SessionRepo, UserRepo,
};
use harbor_worker::tasks;
use harbor_worker::tasks::emails::{SendPasswordResetEmail, SendVerificationEmail};
use serde::{Deserialize, Serialize};

use crate::auth::password::{assert_password_strength, hash_password, verify_password};
use crate::auth::tokens;
use crate::error::{AppError, AppResult};
use crate::middleware::session::{CurrentSession, MaybeSession};
use crate::session;
use crate::state::AppState;

/// Failed logins allowed per window before the account locks.
const MAX_LOGIN_ATTEMPTS: i32 = 5;

/// Window (and lock duration) for failed login counting.
const LOGIN_LOCK_WINDOW_SECS: f64 = 15.0 * 60.0;

/// How long a password-reset token stays valid.
const RESET_TOKEN_VALIDITY_SECS: f64 = 60.0 * 60.0;

/// Reset attempts allowed per window before the account locks.
const MAX_RESET_ATTEMPTS: i32 = 10;

/// Window for reset-attempt counting.
const RESET_ATTEMPT_WINDOW_SECS: f64 = 60.0 * 60.0;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub user_id: DbId,
    pub reset_token: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyEmailRequest {
    pub email_id: DbId,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteEmailRequest {
    pub email_id: DbId,
}

/// Flag-only response for operations with nothing else to say.
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/register
///
/// Create a local account, schedule the verification email, and log the
/// new user in.
pub async fn register(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    Json(input): Json<RegisterRequest>,
) -> AppResult<(SignedCookieJar, Json<UserResponse>)> {
    validate_username(&input.username)?;
    assert_password_strength(&input.password)?;

    let password_hash = hash_password(&input.password)
        .map_err(|e| AppError::InternalError(format!("Password hashing error: {e}")))?;
    let (token, token_hash) = tokens::generate();

    let create = CreateUser {
        username: input.username,
        name: input.name,
        avatar_url: input.avatar_url,
        password_hash: Some(password_hash),
    };
    let (user, email) = UserRepo::register(&state.pools.root, &create, &input.email, &token_hash)
        .await
        .map_err(registration_error)?;

    // Verification happens out-of-band; a lost job only means the user asks
    // for the email again.
    let payload = serde_json::to_value(SendVerificationEmail {
        email_id: email.id,
        email: email.email.clone(),
        token,
    })
    .map_err(|e| AppError::InternalError(format!("Job payload error: {e}")))?;
    if let Err(e) = JobRepo::enqueue(
        &state.pools.root,
        &EnqueueJob::now(tasks::SEND_VERIFICATION_EMAIL, payload),
    )
    .await
    {
        tracing::error!(user_id = user.id, error = %e, "Failed to enqueue verification email");
    }

    let (jar, _session) = session::establish(&state, jar, user.id).await?;
    Ok((jar, Json(user.to_response())))
}

/// POST /api/login
///
/// Authenticate with username + password and establish a session.
pub async fn login(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    Json(input): Json<LoginRequest>,
) -> AppResult<(SignedCookieJar, Json<UserResponse>)> {
    let Some(user) = UserRepo::find_by_username(&state.pools.root, &input.username).await? else {
        return Err(bad_credentials());
    };

    if user.failed_password_attempts >= MAX_LOGIN_ATTEMPTS {
        if let Some(first) = user.first_failed_password_attempt {
            let window = chrono::Duration::seconds(LOGIN_LOCK_WINDOW_SECS as i64);
            if Utc::now() - first < window {
                return Err(AppError::coded(
                    ErrorCode::AccountLocked,
                    "Too many failed attempts; try again later",
                ));
            }
        }
    }

    // OAuth-only accounts have no password; indistinguishable from a wrong
    // one so usernames cannot be probed.
    let password_valid = match &user.password_hash {
        Some(hash) => verify_password(&input.password, hash)
            .map_err(|e| AppError::InternalError(format!("Password verification error: {e}")))?,
        None => false,
    };

    if !password_valid {
        let attempts = UserRepo::record_failed_password_attempt(
            &state.pools.root,
            user.id,
            LOGIN_LOCK_WINDOW_SECS,
        )
        .await?;
        if attempts >= MAX_LOGIN_ATTEMPTS {
            tracing::warn!(user_id = user.id, attempts, "Account locked after failed logins");
        }
        return Err(bad_credentials());
    }

    UserRepo::clear_failed_password_attempts(&state.pools.root, user.id).await?;
    let (jar, _session) = session::establish(&state, jar, user.id).await?;
    Ok((jar, Json(user.to_response())))
}

/// POST /api/logout
///
/// End the session (when there is one) and clear the cookie.
pub async fn logout(
    State(state): State<AppState>,
    session: MaybeSession,
    jar: SignedCookieJar,
) -> AppResult<(SignedCookieJar, Json<SuccessResponse>)> {
    let jar = session::clear(&state, jar, session.0.as_ref()).await?;
    Ok((jar, Json(SuccessResponse { success: true })))
}

/// POST /api/forgot-password
///
/// Schedule a reset email when the address is known. Always reports
/// success so addresses cannot be probed.
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(input): Json<ForgotPasswordRequest>,
) -> AppResult<Json<SuccessResponse>> {
    let Some(user) = UserRepo::find_by_email(&state.pools.root, &input.email).await? else {
        tracing::debug!("Password reset requested for unknown email");
        return Ok(Json(SuccessResponse { success: true }));
    };

    let (token, token_hash) = tokens::generate();
    SecretsRepo::set_reset_token(
        &state.pools.root,
        user.id,
        &token_hash,
        RESET_TOKEN_VALIDITY_SECS,
    )
    .await?;

    let payload = serde_json::to_value(SendPasswordResetEmail {
        user_id: user.id,
        email: input.email,
        token,
    })
    .map_err(|e| AppError::InternalError(format!("Job payload error: {e}")))?;
    JobRepo::enqueue(
        &state.pools.root,
        &EnqueueJob::now(tasks::SEND_PASSWORD_RESET_EMAIL, payload),
    )
    .await?;

    Ok(Json(SuccessResponse { success: true }))
}

/// POST /api/reset-password
///
/// Redeem a reset token for a new password. A bad token is `success:
/// false`, not an error; attempts are rate-limited per user.
pub async fn reset_password(
    State(state): State<AppState>,
    Json(input): Json<ResetPasswordRequest>,
) -> AppResult<Json<SuccessResponse>> {
    let Some(secrets) = SecretsRepo::get(&state.pools.root, input.user_id).await? else {
        return Ok(Json(SuccessResponse { success: false }));
    };

    let attempts = SecretsRepo::record_reset_attempt(
        &state.pools.root,
        input.user_id,
        RESET_ATTEMPT_WINDOW_SECS,
    )
    .await?;
    if attempts > MAX_RESET_ATTEMPTS {
        return Err(AppError::coded(
            ErrorCode::AccountLocked,
            "Too many reset attempts; try again later",
        ));
    }

    let token_valid = secrets.reset_token_hash.as_deref()
        == Some(tokens::digest(&input.reset_token).as_str())
        && secrets.reset_token_expires.is_some_and(|t| t > Utc::now());
    if !token_valid {
        return Ok(Json(SuccessResponse { success: false }));
    }

    assert_password_strength(&input.new_password)?;
    let password_hash = hash_password(&input.new_password)
        .map_err(|e| AppError::InternalError(format!("Password hashing error: {e}")))?;

    UserRepo::update_password(&state.pools.root, input.user_id, &password_hash).await?;
    SecretsRepo::clear_reset_token(&state.pools.root, input.user_id).await?;
    // Changing the password logs out every device.
    SessionRepo::delete_all_for_user(&state.pools.root, input.user_id).await?;

    Ok(Json(SuccessResponse { success: true }))
}

/// POST /api/verify-email
///
/// Redeem a verification token. A bad token is `success: false`.
pub async fn verify_email(
    State(state): State<AppState>,
    Json(input): Json<VerifyEmailRequest>,
) -> AppResult<Json<SuccessResponse>> {
    let verified = EmailRepo::verify(
        &state.pools.root,
        input.email_id,
        &tokens::digest(&input.token),
    )
    .await?;
    Ok(Json(SuccessResponse { success: verified }))
}

/// POST /api/settings/delete-email
///
/// Remove a secondary email from the authenticated account.
pub async fn delete_email(
    State(state): State<AppState>,
    session: CurrentSession,
    Json(input): Json<DeleteEmailRequest>,
) -> AppResult<Json<SuccessResponse>> {
    match EmailRepo::delete(&state.pools.root, session.0.user_id, input.email_id).await? {
        EmailDeletion::Deleted => Ok(Json(SuccessResponse { success: true })),
        EmailDeletion::NotFound => Err(AppError::NotFound("No such email on this account".into())),
        EmailDeletion::LastEmail => Err(AppError::Core(CoreError::Validation(
            "You must keep at least one email address".into(),
        ))),
    }
}

/// POST /api/settings/delete-account
///
/// Delete the authenticated account and everything attached to it.
pub async fn delete_account(
    State(state): State<AppState>,
    session: CurrentSession,
    jar: SignedCookieJar,
) -> AppResult<(SignedCookieJar, Json<SuccessResponse>)> {
    UserRepo::delete(&state.pools.root, session.0.user_id).await?;
    // The session row cascaded away with the user; this clears the cookie.
    let jar = session::clear(&state, jar, None).await?;
    Ok((jar, Json(SuccessResponse { success: true })))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// The one message every credential failure shares, so responses never
/// reveal whether the username exists.
fn bad_credentials() -> AppError {
    AppError::coded(ErrorCode::BadCredentials, "Incorrect username/password")
}

/// Mirror of the `users_username_check` constraint, validated up front so
/// the client gets a field-level message instead of a constraint error.
fn validate_username(username: &str) -> Result<(), AppError> {
    let mut chars = username.chars();
    let first_ok = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
    let rest_ok = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !(2..=24).contains(&username.len()) || !first_ok || !rest_ok {
        return Err(AppError::Core(CoreError::Validation(
            "Username must be 2-24 characters: letters, digits, and underscores, \
             starting with a letter"
                .into(),
        )));
    }
    Ok(())
}

/// Pass conflicts through (they carry a stable code and the offending
/// field); replace anything else with the opaque registration failure.
fn registration_error(err: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db_err) = &err {
        if matches!(db_err.code().as_deref(), Some("23505") | Some("23503")) {
            return AppError::Database(err);
        }
    }
    tracing::error!(error = %err, "Unrecognised error during registration; sanitizing");
    AppError::coded(ErrorCode::RegistrationFailed, "Registration failed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_shape_is_validated() {
        assert!(validate_username("alice").is_ok());
        assert!(validate_username("a_2").is_ok());
        assert!(validate_username("ab").is_ok());

        assert!(validate_username("a").is_err());
        assert!(validate_username("8ball").is_err());
        assert!(validate_username("_tail").is_err());
        assert!(validate_username("has space").is_err());
        assert!(validate_username("waaaaaaaaaaaaaaaaaaaaytoolong").is_err());
    }
}
