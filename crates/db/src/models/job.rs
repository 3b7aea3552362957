//! Background job model and DTOs.

use harbor_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A job row from the `jobs` table.
#[derive(Debug, Clone, FromRow)]
pub struct Job {
    pub id: DbId,
    /// Name of the registered task handler to invoke.
    pub task_identifier: String,
    pub payload: serde_json::Value,
    pub priority: i32,
    /// The job is not eligible to run before this time.
    pub run_at: Timestamp,
    pub attempts: i32,
    pub max_attempts: i32,
    pub last_error: Option<String>,
    pub locked_at: Option<Timestamp>,
    pub locked_by: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for scheduling a new job.
#[derive(Debug, Clone)]
pub struct EnqueueJob {
    pub task_identifier: String,
    pub payload: serde_json::Value,
    /// Defaults to now.
    pub run_at: Option<Timestamp>,
    /// Defaults to 0.
    pub priority: Option<i32>,
    /// Defaults to 25.
    pub max_attempts: Option<i32>,
}

impl EnqueueJob {
    /// A job for `task_identifier` with the given payload, due immediately.
    pub fn now(task_identifier: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            task_identifier: task_identifier.into(),
            payload,
            run_at: None,
            priority: None,
            max_attempts: None,
        }
    }
}
