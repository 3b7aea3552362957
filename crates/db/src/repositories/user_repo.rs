//! Repository for the `users` table.

use harbor_core::types::DbId;
use sqlx::PgPool;

use crate::models::email::UserEmail;
use crate::models::user::{CreateUser, User};

/// Column list shared across queries to avoid repetition.
pub(crate) const COLUMNS: &str = "id, username, name, avatar_url, password_hash, is_admin, \
                                  is_verified, failed_password_attempts, \
                                  first_failed_password_attempt, created_at, updated_at";

/// Provides CRUD operations for users.
pub struct UserRepo;

impl UserRepo {
    /// Insert a new user plus its empty `user_secrets` companion row.
    pub async fn create(pool: &PgPool, input: &CreateUser) -> Result<User, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let user = Self::insert(&mut tx, input).await?;
        tx.commit().await?;
        Ok(user)
    }

    /// Register a local account: user, secrets, and primary email in one
    /// transaction. `verification_token_hash` is stored on the email row so
    /// the address can be verified later.
    pub async fn register(
        pool: &PgPool,
        input: &CreateUser,
        email: &str,
        verification_token_hash: &str,
    ) -> Result<(User, UserEmail), sqlx::Error> {
        let mut tx = pool.begin().await?;
        let user = Self::insert(&mut tx, input).await?;
        let email = sqlx::query_as::<_, UserEmail>(
            "INSERT INTO user_emails (user_id, email, verification_token)
             VALUES ($1, $2, $3)
             RETURNING id, user_id, email, is_verified, verification_token, created_at, updated_at",
        )
        .bind(user.id)
        .bind(email)
        .bind(verification_token_hash)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok((user, email))
    }

    pub(crate) async fn insert(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        input: &CreateUser,
    ) -> Result<User, sqlx::Error> {
        let query = format!(
            "INSERT INTO users (username, name, avatar_url, password_hash)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(&input.username)
            .bind(&input.name)
            .bind(&input.avatar_url)
            .bind(&input.password_hash)
            .fetch_one(&mut **tx)
            .await?;
        sqlx::query("INSERT INTO user_secrets (user_id) VALUES ($1)")
            .bind(user.id)
            .execute(&mut **tx)
            .await?;
        Ok(user)
    }

    /// Find a user by internal ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a user by username (case-insensitive).
    pub async fn find_by_username(
        pool: &PgPool,
        username: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE lower(username) = lower($1)");
        sqlx::query_as::<_, User>(&query)
            .bind(username)
            .fetch_optional(pool)
            .await
    }

    /// Find the owner of an email address.
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, sqlx::Error> {
        let query = format!(
            "SELECT u.{} FROM users u
             JOIN user_emails e ON e.user_id = u.id
             WHERE lower(e.email) = lower($1)",
            COLUMNS.replace(", ", ", u.")
        );
        sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(pool)
            .await
    }

    /// Record a failed password attempt, starting a fresh counting window
    /// when the previous one (of `window_secs`) has lapsed. Returns the
    /// attempt count within the current window.
    pub async fn record_failed_password_attempt(
        pool: &PgPool,
        id: DbId,
        window_secs: f64,
    ) -> Result<i32, sqlx::Error> {
        sqlx::query_scalar(
            "UPDATE users SET
                failed_password_attempts = CASE
                    WHEN first_failed_password_attempt IS NULL
                      OR first_failed_password_attempt < now() - make_interval(secs => $2)
                    THEN 1
                    ELSE failed_password_attempts + 1
                END,
                first_failed_password_attempt = CASE
                    WHEN first_failed_password_attempt IS NULL
                      OR first_failed_password_attempt < now() - make_interval(secs => $2)
                    THEN now()
                    ELSE first_failed_password_attempt
                END
             WHERE id = $1
             RETURNING failed_password_attempts",
        )
        .bind(id)
        .bind(window_secs)
        .fetch_one(pool)
        .await
    }

    /// Reset the failed-attempt counter after a successful login.
    pub async fn clear_failed_password_attempts(
        pool: &PgPool,
        id: DbId,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE users SET failed_password_attempts = 0,
                              first_failed_password_attempt = NULL
             WHERE id = $1",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Update a user's password hash. Returns `true` if the row was updated.
    pub async fn update_password(
        pool: &PgPool,
        id: DbId,
        password_hash: &str,
    ) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE users SET password_hash = $2, updated_at = now() WHERE id = $1")
                .bind(id)
                .bind(password_hash)
                .execute(pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a user. Sessions, emails, secrets, and linked identities go
    /// with it via `ON DELETE CASCADE`. Returns `true` if a row was deleted.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
