//! Repository for the `sessions` table.

use harbor_core::types::DbId;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::session::Session;

const COLUMNS: &str = "uuid, user_id, created_at, last_active";

/// Provides CRUD operations for sessions.
pub struct SessionRepo;

impl SessionRepo {
    /// Insert a new session for the user, returning the created row.
    pub async fn create(pool: &PgPool, user_id: DbId) -> Result<Session, sqlx::Error> {
        let query = format!(
            "INSERT INTO sessions (user_id) VALUES ($1)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Session>(&query)
            .bind(user_id)
            .fetch_one(pool)
            .await
    }

    /// Resolve a session token. A token with no matching row means
    /// logged-out; callers must not treat that as an error.
    pub async fn find(pool: &PgPool, uuid: Uuid) -> Result<Option<Session>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM sessions WHERE uuid = $1");
        sqlx::query_as::<_, Session>(&query)
            .bind(uuid)
            .fetch_optional(pool)
            .await
    }

    /// Refresh `last_active`, but only when the previous touch is older than
    /// `window_secs`. Bounds write amplification to one write per session
    /// per window; concurrent touches race benignly (last write wins).
    /// Returns `true` if a write happened.
    pub async fn touch(pool: &PgPool, uuid: Uuid, window_secs: f64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE sessions SET last_active = now()
             WHERE uuid = $1 AND last_active < now() - make_interval(secs => $2)",
        )
        .bind(uuid)
        .bind(window_secs)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a single session (logout). Returns `true` if a row was deleted.
    pub async fn delete(pool: &PgPool, uuid: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE uuid = $1")
            .bind(uuid)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete every session belonging to a user (e.g. after a password
    /// reset). Returns the count of deleted sessions.
    pub async fn delete_all_for_user(pool: &PgPool, user_id: DbId) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
