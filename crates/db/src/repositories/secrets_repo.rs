//! Repository for the `user_secrets` table.

use harbor_core::types::DbId;
use sqlx::PgPool;

use crate::models::secrets::UserSecrets;

const COLUMNS: &str =
    "user_id, reset_token_hash, reset_token_expires, reset_attempts, first_reset_attempt";

/// Provides access to per-user secret state. Root pool only.
pub struct SecretsRepo;

impl SecretsRepo {
    pub async fn get(pool: &PgPool, user_id: DbId) -> Result<Option<UserSecrets>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM user_secrets WHERE user_id = $1");
        sqlx::query_as::<_, UserSecrets>(&query)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Store a fresh reset-token digest, replacing any outstanding one.
    pub async fn set_reset_token(
        pool: &PgPool,
        user_id: DbId,
        token_hash: &str,
        validity_secs: f64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE user_secrets
             SET reset_token_hash = $2,
                 reset_token_expires = now() + make_interval(secs => $3)
             WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(validity_secs)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Count a reset attempt, starting a fresh window when the previous one
    /// (of `window_secs`) has lapsed. Returns the count within the window.
    pub async fn record_reset_attempt(
        pool: &PgPool,
        user_id: DbId,
        window_secs: f64,
    ) -> Result<i32, sqlx::Error> {
        sqlx::query_scalar(
            "UPDATE user_secrets SET
                reset_attempts = CASE
                    WHEN first_reset_attempt IS NULL
                      OR first_reset_attempt < now() - make_interval(secs => $2)
                    THEN 1
                    ELSE reset_attempts + 1
                END,
                first_reset_attempt = CASE
                    WHEN first_reset_attempt IS NULL
                      OR first_reset_attempt < now() - make_interval(secs => $2)
                    THEN now()
                    ELSE first_reset_attempt
                END
             WHERE user_id = $1
             RETURNING reset_attempts",
        )
        .bind(user_id)
        .bind(window_secs)
        .fetch_one(pool)
        .await
    }

    /// Invalidate the outstanding reset token after a successful reset.
    pub async fn clear_reset_token(pool: &PgPool, user_id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE user_secrets
             SET reset_token_hash = NULL, reset_token_expires = NULL,
                 reset_attempts = 0, first_reset_attempt = NULL
             WHERE user_id = $1",
        )
        .bind(user_id)
        .execute(pool)
        .await?;
        Ok(())
    }
}
