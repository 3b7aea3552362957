//! User entity model and DTOs.

use harbor_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// Full user row from the `users` table.
///
/// Contains the password hash -- NEVER serialize this to API responses
/// directly. Use [`UserResponse`] for external-facing output.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: DbId,
    pub username: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    /// `None` for OAuth-only accounts.
    pub password_hash: Option<String>,
    pub is_admin: bool,
    pub is_verified: bool,
    pub failed_password_attempts: i32,
    pub first_failed_password_attempt: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl User {
    pub fn to_response(&self) -> UserResponse {
        UserResponse {
            id: self.id,
            username: self.username.clone(),
            name: self.name.clone(),
            avatar_url: self.avatar_url.clone(),
            is_verified: self.is_verified,
            created_at: self.created_at,
        }
    }
}

/// Safe user representation for API responses and the hydration payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: DbId,
    pub username: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub is_verified: bool,
    pub created_at: Timestamp,
}

/// DTO for creating a new user.
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub username: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    /// Already hashed; `None` for OAuth-only accounts.
    pub password_hash: Option<String>,
}
