//! User email model.

use harbor_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// Row from the `user_emails` table.
///
/// `verification_token` holds a SHA-256 digest, not the token itself, but is
/// still excluded from API output; use [`EmailResponse`].
#[derive(Debug, Clone, FromRow)]
pub struct UserEmail {
    pub id: DbId,
    pub user_id: DbId,
    pub email: String,
    pub is_verified: bool,
    pub verification_token: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl UserEmail {
    pub fn to_response(&self) -> EmailResponse {
        EmailResponse {
            id: self.id,
            email: self.email.clone(),
            is_verified: self.is_verified,
            created_at: self.created_at,
        }
    }
}

/// Safe email representation for API responses and the hydration payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailResponse {
    pub id: DbId,
    pub email: String,
    pub is_verified: bool,
    pub created_at: Timestamp,
}
