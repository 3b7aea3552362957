//! Session model.

use harbor_core::types::{DbId, Timestamp};
use sqlx::FromRow;
use uuid::Uuid;

/// A session row from the `sessions` table.
///
/// The `uuid` is the opaque token carried (signed) in the session cookie.
#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub uuid: Uuid,
    pub user_id: DbId,
    pub created_at: Timestamp,
    pub last_active: Timestamp,
}
