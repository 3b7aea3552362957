//! Repository for the `jobs` table.
//!
//! The queue contract: a job is eligible when `run_at` has passed, it is not
//! locked, and it has attempts left. Claiming locks the row and bumps the
//! attempt counter; completion deletes the row; failure releases the lock
//! and reschedules with backoff.

use harbor_core::types::DbId;
use sqlx::PgPool;

use crate::models::job::{EnqueueJob, Job};

/// Column list for `jobs` queries.
const COLUMNS: &str = "id, task_identifier, payload, priority, run_at, attempts, max_attempts, \
                       last_error, locked_at, locked_by, created_at, updated_at";

/// Default retry budget per job.
const DEFAULT_MAX_ATTEMPTS: i32 = 25;

/// Provides queue operations for background jobs.
pub struct JobRepo;

impl JobRepo {
    /// Schedule a job. Returns immediately with the created row.
    pub async fn enqueue(pool: &PgPool, input: &EnqueueJob) -> Result<Job, sqlx::Error> {
        let query = format!(
            "INSERT INTO jobs (task_identifier, payload, priority, run_at, max_attempts)
             VALUES ($1, $2, $3, COALESCE($4, now()), $5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(&input.task_identifier)
            .bind(&input.payload)
            .bind(input.priority.unwrap_or(0))
            .bind(input.run_at)
            .bind(input.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS))
            .fetch_one(pool)
            .await
    }

    /// Atomically claim the next due job for a runner.
    ///
    /// Uses `SELECT FOR UPDATE SKIP LOCKED` so concurrent runners never
    /// double-claim. Claiming counts as an attempt.
    pub async fn claim_next(pool: &PgPool, runner_id: &str) -> Result<Option<Job>, sqlx::Error> {
        let query = format!(
            "UPDATE jobs
             SET locked_at = now(), locked_by = $1, attempts = attempts + 1,
                 updated_at = now()
             WHERE id = (
                 SELECT id FROM jobs
                 WHERE run_at <= now() AND locked_at IS NULL AND attempts < max_attempts
                 ORDER BY priority DESC, run_at ASC
                 LIMIT 1
                 FOR UPDATE SKIP LOCKED
             )
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(runner_id)
            .fetch_optional(pool)
            .await
    }

    /// Delete a completed job.
    pub async fn complete(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM jobs WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Record a failure and reschedule after `backoff_secs`, releasing the
    /// lock so any runner can pick the retry up.
    pub async fn fail(
        pool: &PgPool,
        id: DbId,
        error: &str,
        backoff_secs: f64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE jobs
             SET last_error = $2, locked_at = NULL, locked_by = NULL,
                 run_at = now() + make_interval(secs => $3), updated_at = now()
             WHERE id = $1",
        )
        .bind(id)
        .bind(error)
        .bind(backoff_secs)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Record a failure and exhaust the retry budget so the job never runs
    /// again (e.g. no handler is registered for its task identifier).
    pub async fn fail_permanently(pool: &PgPool, id: DbId, error: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE jobs
             SET last_error = $2, locked_at = NULL, locked_by = NULL,
                 attempts = max_attempts, updated_at = now()
             WHERE id = $1",
        )
        .bind(id)
        .bind(error)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Release locks held longer than `older_than_secs`, making jobs from
    /// crashed runners eligible again. Returns the number released.
    pub async fn unlock_stale(pool: &PgPool, older_than_secs: f64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs SET locked_at = NULL, locked_by = NULL, updated_at = now()
             WHERE locked_at < now() - make_interval(secs => $1)",
        )
        .bind(older_than_secs)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Job>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1");
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
