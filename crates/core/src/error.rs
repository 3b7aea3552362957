use std::fmt;

use crate::types::DbId;

/// Stable error codes surfaced to API clients.
///
/// These strings are part of the public contract: clients switch on them to
/// drive form-level error display, so they must never change once shipped.
/// Errors that do not carry one of these codes are replaced with a generic
/// message before crossing the API boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCode {
    /// Username/password combination did not resolve to a user.
    BadCredentials,
    /// Password rejected by the strength policy.
    WeakPassword,
    /// Unique-constraint violation.
    Conflict,
    /// Foreign-key violation.
    InvalidReference,
    /// Opaque catch-all for failures during user creation.
    RegistrationFailed,
    /// Too many failed attempts; try again later.
    AccountLocked,
    /// CSRF token missing or invalid.
    MalformedCsrfToken,
    /// The caller is not allowed to perform this operation.
    NotAuthorized,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::BadCredentials => "bad-credentials",
            ErrorCode::WeakPassword => "weak-password",
            ErrorCode::Conflict => "conflict",
            ErrorCode::InvalidReference => "invalid-reference",
            ErrorCode::RegistrationFailed => "registration-failed",
            ErrorCode::AccountLocked => "account-locked",
            ErrorCode::MalformedCsrfToken => "malformed-csrf-token",
            ErrorCode::NotAuthorized => "not-authorized",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A failure that carries a stable code; passed through to clients verbatim.
    #[error("{message}")]
    Coded { code: ErrorCode, message: String },

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Build a [`CoreError::Coded`] from a stable code and message.
    pub fn coded(code: ErrorCode, message: impl Into<String>) -> Self {
        CoreError::Coded {
            code,
            message: message.into(),
        }
    }

    /// The stable code attached to this error, if any.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            CoreError::Coded { code, .. } => Some(*code),
            _ => None,
        }
    }
}
