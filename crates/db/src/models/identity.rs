//! Linked external identity model and DTOs.

use harbor_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// Row from the `user_authentications` table: one `(service, identifier)`
/// pair linked to a local user.
#[derive(Debug, Clone, FromRow)]
pub struct UserAuthentication {
    pub id: DbId,
    pub user_id: DbId,
    pub service: String,
    pub identifier: String,
    pub details: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Input to [`IdentityRepo::link_or_register`].
///
/// [`IdentityRepo::link_or_register`]: crate::repositories::IdentityRepo::link_or_register
#[derive(Debug, Clone)]
pub struct LinkOrRegister {
    /// User already authenticated on this request, if any. When set, a new
    /// external identity is linked to this user instead of creating one.
    pub session_user_id: Option<DbId>,
    /// Provider name, e.g. `"github"`.
    pub service: String,
    /// The provider's stable id for this account.
    pub identifier: String,
    /// Preferred username; deduplicated if taken.
    pub username: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub email: Option<String>,
    /// Provider profile and token material, stored as JSON.
    pub details: serde_json::Value,
}
