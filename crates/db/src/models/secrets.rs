//! Sensitive per-user state (`user_secrets` table).

use harbor_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// Row from the `user_secrets` table. Never leaves the server.
#[derive(Debug, Clone, FromRow)]
pub struct UserSecrets {
    pub user_id: DbId,
    /// SHA-256 digest of the outstanding reset token, if any.
    pub reset_token_hash: Option<String>,
    pub reset_token_expires: Option<Timestamp>,
    pub reset_attempts: i32,
    pub first_reset_attempt: Option<Timestamp>,
}
