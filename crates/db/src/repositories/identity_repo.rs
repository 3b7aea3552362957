//! Repository for the `user_authentications` table.

use harbor_core::types::DbId;
use sqlx::PgPool;

use crate::models::identity::{LinkOrRegister, UserAuthentication};
use crate::models::user::User;
use crate::repositories::user_repo;

const COLUMNS: &str = "id, user_id, service, identifier, details, created_at, updated_at";

/// Upper bound on username-deduplication attempts for first-time OAuth users.
const MAX_USERNAME_ATTEMPTS: u32 = 25;

/// Error type for [`IdentityRepo::link_or_register`].
#[derive(Debug, thiserror::Error)]
pub enum LinkOrRegisterError {
    /// Could not find a free username variant for a first-time OAuth user.
    #[error("could not allocate a unique username near '{0}'")]
    UsernameExhausted(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Provides operations for linked external identities.
pub struct IdentityRepo;

impl IdentityRepo {
    pub async fn find(
        pool: &PgPool,
        service: &str,
        identifier: &str,
    ) -> Result<Option<UserAuthentication>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM user_authentications
             WHERE service = $1 AND identifier = $2"
        );
        sqlx::query_as::<_, UserAuthentication>(&query)
            .bind(service)
            .bind(identifier)
            .fetch_optional(pool)
            .await
    }

    /// All external identities linked to a user.
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Vec<UserAuthentication>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM user_authentications
             WHERE user_id = $1 ORDER BY created_at"
        );
        sqlx::query_as::<_, UserAuthentication>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    /// Resolve an external identity to a local user, creating or linking as
    /// needed. One atomic decision:
    ///
    /// - identity already known -> refresh its details, return its user;
    /// - unknown, request already authenticated -> link to that user;
    /// - unknown, anonymous -> create a user (plus secrets and email rows)
    ///   and link.
    ///
    /// The whole operation runs in a single transaction serialized by an
    /// advisory lock on the `(service, identifier)` pair, so two concurrent
    /// first-time logins for one external account produce exactly one user.
    pub async fn link_or_register(
        pool: &PgPool,
        input: &LinkOrRegister,
    ) -> Result<User, LinkOrRegisterError> {
        let mut tx = pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(format!("{}:{}", input.service, input.identifier))
            .execute(&mut *tx)
            .await?;

        let existing: Option<DbId> = sqlx::query_scalar(
            "SELECT user_id FROM user_authentications WHERE service = $1 AND identifier = $2",
        )
        .bind(&input.service)
        .bind(&input.identifier)
        .fetch_optional(&mut *tx)
        .await?;

        let user_id = match existing {
            Some(user_id) => {
                sqlx::query(
                    "UPDATE user_authentications SET details = $3, updated_at = now()
                     WHERE service = $1 AND identifier = $2",
                )
                .bind(&input.service)
                .bind(&input.identifier)
                .bind(&input.details)
                .execute(&mut *tx)
                .await?;
                user_id
            }
            None => {
                let user_id = match input.session_user_id {
                    Some(user_id) => user_id,
                    None => Self::create_user(&mut tx, input).await?,
                };
                sqlx::query(
                    "INSERT INTO user_authentications (user_id, service, identifier, details)
                     VALUES ($1, $2, $3, $4)",
                )
                .bind(user_id)
                .bind(&input.service)
                .bind(&input.identifier)
                .bind(&input.details)
                .execute(&mut *tx)
                .await?;
                user_id
            }
        };

        let query = format!("SELECT {} FROM users WHERE id = $1", user_repo::COLUMNS);
        let user = sqlx::query_as::<_, User>(&query)
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(user)
    }

    /// Create a user row for a first-time OAuth login, deduplicating the
    /// provider username with a numeric suffix when it is taken.
    async fn create_user(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        input: &LinkOrRegister,
    ) -> Result<DbId, LinkOrRegisterError> {
        let base = normalize_username(&input.username);

        for attempt in 0..MAX_USERNAME_ATTEMPTS {
            let candidate = if attempt == 0 {
                base.clone()
            } else {
                format!("{base}{}", attempt + 1)
            };
            let inserted: Option<DbId> = sqlx::query_scalar(
                "INSERT INTO users (username, name, avatar_url)
                 VALUES ($1, $2, $3)
                 ON CONFLICT ON CONSTRAINT users_username_key DO NOTHING
                 RETURNING id",
            )
            .bind(&candidate)
            .bind(&input.name)
            .bind(&input.avatar_url)
            .fetch_optional(&mut **tx)
            .await?;

            if let Some(user_id) = inserted {
                sqlx::query("INSERT INTO user_secrets (user_id) VALUES ($1)")
                    .bind(user_id)
                    .execute(&mut **tx)
                    .await?;
                if let Some(email) = &input.email {
                    // Provider-asserted addresses count as verified. If the
                    // address already belongs to another account, skip it
                    // rather than failing the login.
                    sqlx::query(
                        "INSERT INTO user_emails (user_id, email, is_verified)
                         VALUES ($1, $2, true)
                         ON CONFLICT ON CONSTRAINT user_emails_email_key DO NOTHING",
                    )
                    .bind(user_id)
                    .bind(email)
                    .execute(&mut **tx)
                    .await?;
                }
                return Ok(user_id);
            }
        }

        Err(LinkOrRegisterError::UsernameExhausted(base))
    }
}

/// Coerce a provider username into something the `users_username_check`
/// constraint accepts: ASCII alphanumerics and underscores, leading letter,
/// 2..=24 characters. Leaves headroom for the dedupe suffix.
fn normalize_username(raw: &str) -> String {
    let mut cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    if !cleaned.starts_with(|c: char| c.is_ascii_alphabetic()) {
        cleaned.insert_str(0, "user_");
    }
    if cleaned.len() < 2 {
        cleaned.push_str("user");
    }
    cleaned.truncate(20);
    cleaned
}
