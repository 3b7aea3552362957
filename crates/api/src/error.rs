//! Application error type and HTTP error responses.
//!
//! Propagation policy: errors constructed with a stable [`ErrorCode`] pass
//! to clients verbatim. Database errors go through the core translator,
//! which gives unique and foreign-key violations their stable codes. Every
//! other error is replaced with a generic message and logged server-side;
//! the real diagnostics only reach the client in development/test, where
//! the negotiation layer widens the payload.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use harbor_core::error::{CoreError, ErrorCode};
use harbor_core::pg_error::{self, PgDiagnostics};

/// Application-level error type for HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `harbor_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A missing resource, named in the message.
    #[error("Not found: {0}")]
    NotFound(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// An error carrying a stable client-facing code.
    pub fn coded(code: ErrorCode, message: impl Into<String>) -> Self {
        AppError::Core(CoreError::coded(code, message))
    }
}

/// One rendering of an error body.
#[derive(Debug, Clone)]
pub struct BodyFields {
    pub message: String,
    pub code: Option<String>,
    pub fields: Option<Vec<String>>,
    /// Diagnostic key/value pairs; empty outside development/test.
    pub exposed: Vec<(&'static str, String)>,
}

impl BodyFields {
    fn new(message: impl Into<String>, code: Option<String>) -> Self {
        Self {
            message: message.into(),
            code,
            fields: None,
            exposed: Vec::new(),
        }
    }
}

/// What an error response will say. Attached to the response as an
/// extension so the negotiation layer can re-render it per the request's
/// `Accept` header and the deployment environment.
#[derive(Debug, Clone)]
pub struct ErrorPayload {
    pub status: StatusCode,
    /// Safe for any environment.
    pub public: BodyFields,
    /// Widened variant rendered only in development/test.
    pub dev: BodyFields,
}

impl ErrorPayload {
    /// The `{"errors": [{...}]}` envelope.
    pub fn to_json(&self, expose_internals: bool) -> serde_json::Value {
        let body = if expose_internals { &self.dev } else { &self.public };
        let mut entry = serde_json::Map::new();
        entry.insert("message".into(), body.message.clone().into());
        if let Some(code) = &body.code {
            entry.insert("code".into(), code.clone().into());
        }
        if let Some(fields) = &body.fields {
            entry.insert("fields".into(), fields.clone().into());
        }
        if !body.exposed.is_empty() {
            let exception: serde_json::Map<String, serde_json::Value> = body
                .exposed
                .iter()
                .map(|(k, v)| ((*k).to_string(), v.clone().into()))
                .collect();
            entry.insert("exception".into(), exception.into());
        }
        serde_json::json!({ "errors": [entry] })
    }
}

impl AppError {
    /// Classify this error into a status and body. Total: every error
    /// produces exactly one payload.
    pub fn classify(&self) -> ErrorPayload {
        match self {
            AppError::Core(core) => classify_core(core),
            AppError::Database(err) => classify_sqlx_error(err),
            AppError::BadRequest(msg) => same_in_all_envs(StatusCode::BAD_REQUEST, msg, None),
            AppError::NotFound(msg) => same_in_all_envs(StatusCode::NOT_FOUND, msg, None),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                generic_internal(msg)
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let payload = self.classify();
        // Default rendering is the production-safe JSON body; the
        // negotiation layer swaps it out when it knows better.
        let mut response =
            (payload.status, Json(payload.to_json(false))).into_response();
        response.extensions_mut().insert(payload);
        response
    }
}

fn classify_core(core: &CoreError) -> ErrorPayload {
    match core {
        CoreError::Coded { code, message } => same_in_all_envs(
            status_for_code(*code),
            message,
            Some(code.as_str().to_string()),
        ),
        CoreError::NotFound { .. } => {
            same_in_all_envs(StatusCode::NOT_FOUND, core.to_string(), None)
        }
        CoreError::Validation(msg) => same_in_all_envs(StatusCode::BAD_REQUEST, msg, None),
        CoreError::Unauthorized(msg) => same_in_all_envs(StatusCode::UNAUTHORIZED, msg, None),
        CoreError::Internal(msg) => {
            tracing::error!(error = %msg, "Internal core error");
            generic_internal(msg)
        }
    }
}

/// Classify a sqlx error through the core translator.
fn classify_sqlx_error(err: &sqlx::Error) -> ErrorPayload {
    match err {
        sqlx::Error::RowNotFound => {
            same_in_all_envs(StatusCode::NOT_FOUND, "Resource not found", None)
        }
        sqlx::Error::Database(db_err) => {
            let diag = pluck_diagnostics(db_err.as_ref());
            let public = pg_error::translate(&diag, false);
            let dev = pg_error::translate(&diag, true);

            let status = match public.code.as_deref() {
                Some("conflict") => StatusCode::CONFLICT,
                Some("invalid-reference") => StatusCode::BAD_REQUEST,
                Some("42501") => StatusCode::FORBIDDEN,
                _ => {
                    tracing::error!(error = %db_err, "Database error");
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            };

            ErrorPayload {
                status,
                public: BodyFields {
                    message: public.message,
                    code: public.code,
                    fields: public.fields,
                    exposed: public.exposed,
                },
                dev: BodyFields {
                    message: dev.message,
                    code: dev.code,
                    fields: dev.fields,
                    exposed: dev.exposed,
                },
            }
        }
        other => {
            tracing::error!(error = %other, "Database error");
            generic_internal(&other.to_string())
        }
    }
}

/// Pull translator inputs out of a sqlx database error.
fn pluck_diagnostics(db_err: &dyn sqlx::error::DatabaseError) -> PgDiagnostics {
    let pg = db_err.try_downcast_ref::<sqlx::postgres::PgDatabaseError>();
    PgDiagnostics {
        code: db_err.code().map(|c| c.into_owned()),
        message: Some(db_err.message().to_string()),
        detail: pg.and_then(|e| e.detail().map(str::to_string)),
        hint: pg.and_then(|e| e.hint().map(str::to_string)),
        schema: pg.and_then(|e| e.schema().map(str::to_string)),
        table: db_err.table().map(str::to_string),
        column: pg.and_then(|e| e.column().map(str::to_string)),
        constraint: db_err.constraint().map(str::to_string),
    }
}

fn status_for_code(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::BadCredentials => StatusCode::UNAUTHORIZED,
        ErrorCode::WeakPassword => StatusCode::BAD_REQUEST,
        ErrorCode::Conflict => StatusCode::CONFLICT,
        ErrorCode::InvalidReference => StatusCode::BAD_REQUEST,
        ErrorCode::RegistrationFailed => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorCode::AccountLocked => StatusCode::FORBIDDEN,
        ErrorCode::MalformedCsrfToken => StatusCode::FORBIDDEN,
        ErrorCode::NotAuthorized => StatusCode::UNAUTHORIZED,
    }
}

/// A payload whose message is identical in every environment.
fn same_in_all_envs(
    status: StatusCode,
    message: impl Into<String>,
    code: Option<String>,
) -> ErrorPayload {
    let body = BodyFields::new(message, code);
    ErrorPayload {
        status,
        public: body.clone(),
        dev: body,
    }
}

/// Generic 500 whose real message only shows up in development/test.
fn generic_internal(real_message: &str) -> ErrorPayload {
    ErrorPayload {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        public: BodyFields::new("An unknown error occurred", None),
        dev: BodyFields::new(real_message, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coded_errors_pass_through_verbatim() {
        let payload = AppError::coded(ErrorCode::BadCredentials, "Incorrect username/password")
            .classify();
        assert_eq!(payload.status, StatusCode::UNAUTHORIZED);
        assert_eq!(payload.public.message, "Incorrect username/password");
        assert_eq!(payload.public.code.as_deref(), Some("bad-credentials"));
        // Nothing extra leaks in dev for coded errors.
        assert_eq!(payload.dev.message, payload.public.message);
    }

    #[test]
    fn internal_errors_are_replaced_with_a_generic_message() {
        let payload = AppError::InternalError("pool exhausted at 10.0.0.3".into()).classify();
        assert_eq!(payload.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(payload.public.message, "An unknown error occurred");
        assert_eq!(payload.dev.message, "pool exhausted at 10.0.0.3");
    }

    #[test]
    fn json_envelope_has_the_errors_array() {
        let payload = AppError::coded(ErrorCode::AccountLocked, "Account is locked").classify();
        let json = payload.to_json(false);
        assert_eq!(json["errors"][0]["message"], "Account is locked");
        assert_eq!(json["errors"][0]["code"], "account-locked");
        assert!(json["errors"][0].get("fields").is_none());
    }

    #[test]
    fn row_not_found_maps_to_404() {
        let payload = AppError::Database(sqlx::Error::RowNotFound).classify();
        assert_eq!(payload.status, StatusCode::NOT_FOUND);
    }
}
