//! Repository for the `user_emails` table.

use harbor_core::types::DbId;
use sqlx::PgPool;

use crate::models::email::UserEmail;

const COLUMNS: &str = "id, user_id, email, is_verified, verification_token, created_at, updated_at";

/// Outcome of [`EmailRepo::delete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailDeletion {
    Deleted,
    /// No such email on this account.
    NotFound,
    /// Deleting it would leave the account without a usable email.
    LastEmail,
}

/// Provides CRUD operations for user emails.
pub struct EmailRepo;

impl EmailRepo {
    /// Attach an additional (unverified) email to a user.
    pub async fn add(
        pool: &PgPool,
        user_id: DbId,
        email: &str,
        verification_token_hash: &str,
    ) -> Result<UserEmail, sqlx::Error> {
        let query = format!(
            "INSERT INTO user_emails (user_id, email, verification_token)
             VALUES ($1, $2, $3)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, UserEmail>(&query)
            .bind(user_id)
            .bind(email)
            .bind(verification_token_hash)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<UserEmail>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM user_emails WHERE id = $1");
        sqlx::query_as::<_, UserEmail>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_email(
        pool: &PgPool,
        email: &str,
    ) -> Result<Option<UserEmail>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM user_emails WHERE lower(email) = lower($1)");
        sqlx::query_as::<_, UserEmail>(&query)
            .bind(email)
            .fetch_optional(pool)
            .await
    }

    /// All emails for a user, oldest first.
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Vec<UserEmail>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM user_emails WHERE user_id = $1 ORDER BY created_at");
        sqlx::query_as::<_, UserEmail>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    /// Mark an email verified if the token digest matches. Also flips the
    /// owning user to verified. Returns `false` on a bad id or token.
    pub async fn verify(
        pool: &PgPool,
        email_id: DbId,
        token_hash: &str,
    ) -> Result<bool, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let user_id: Option<DbId> = sqlx::query_scalar(
            "UPDATE user_emails SET is_verified = true, verification_token = NULL,
                                    updated_at = now()
             WHERE id = $1 AND is_verified = false AND verification_token = $2
             RETURNING user_id",
        )
        .bind(email_id)
        .bind(token_hash)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(user_id) = user_id else {
            return Ok(false);
        };
        sqlx::query("UPDATE users SET is_verified = true WHERE id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(true)
    }

    /// Remove an email from a user's account. Refuses to delete the last
    /// remaining email so the account always has a contact address.
    pub async fn delete(
        pool: &PgPool,
        user_id: DbId,
        email_id: DbId,
    ) -> Result<EmailDeletion, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let remaining: i64 = sqlx::query_scalar(
            "SELECT count(*) FROM user_emails WHERE user_id = $1 AND id <> $2",
        )
        .bind(user_id)
        .bind(email_id)
        .fetch_one(&mut *tx)
        .await?;
        if remaining == 0 {
            return Ok(EmailDeletion::LastEmail);
        }
        let result = sqlx::query("DELETE FROM user_emails WHERE id = $1 AND user_id = $2")
            .bind(email_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(if result.rows_affected() > 0 {
            EmailDeletion::Deleted
        } else {
            EmailDeletion::NotFound
        })
    }
}
