//! Polling job runner.
//!
//! A single long-lived task that claims due jobs and executes them on the
//! runtime, bounded by a concurrency semaphore. Shutdown is cooperative:
//! cancelling the token stops claiming, and [`JobRunner::run`] returns only
//! after every in-flight job has finished, so the caller can safely close
//! the database pool afterwards.

use std::sync::Arc;
use std::time::Duration;

use harbor_db::models::job::Job;
use harbor_db::repositories::JobRepo;
use sqlx::PgPool;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::registry::{TaskContext, TaskRegistry};

/// Default polling interval.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default number of concurrently executing jobs.
const DEFAULT_CONCURRENCY: usize = 4;

/// Locks older than this belong to a crashed runner and are released.
const STALE_LOCK_SECS: f64 = 4.0 * 3600.0;

/// How many poll ticks between stale-lock sweeps.
const STALE_SWEEP_EVERY: u32 = 60;

/// Backoff ceiling for failed jobs.
const MAX_BACKOFF_SECS: f64 = 3600.0;

/// Database-backed job runner.
pub struct JobRunner {
    pool: PgPool,
    registry: TaskRegistry,
    context: TaskContext,
    runner_id: String,
    concurrency: usize,
    poll_interval: Duration,
}

impl JobRunner {
    pub fn new(registry: TaskRegistry, context: TaskContext) -> Self {
        Self {
            pool: context.pool.clone(),
            registry,
            context,
            runner_id: format!("runner-{}", Uuid::new_v4()),
            concurrency: DEFAULT_CONCURRENCY,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Run until the token is cancelled, then drain in-flight jobs.
    pub async fn run(self, cancel: CancellationToken) {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut inflight: JoinSet<()> = JoinSet::new();
        let mut ticker = tokio::time::interval(self.poll_interval);
        let mut ticks: u32 = 0;

        tracing::info!(
            runner_id = %self.runner_id,
            concurrency = self.concurrency,
            tasks = ?self.registry.task_identifiers(),
            "Job runner started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(runner_id = %self.runner_id, "Job runner stopping");
                    break;
                }
                _ = ticker.tick() => {
                    ticks = ticks.wrapping_add(1);
                    if ticks % STALE_SWEEP_EVERY == 0 {
                        match JobRepo::unlock_stale(&self.pool, STALE_LOCK_SECS).await {
                            Ok(released) if released > 0 => {
                                tracing::warn!(released, "Released stale job locks");
                            }
                            Ok(_) => {}
                            Err(e) => tracing::error!(error = %e, "Stale-lock sweep failed"),
                        }
                    }
                    self.claim_available(&semaphore, &mut inflight).await;
                    // Reap finished jobs without blocking the loop.
                    while inflight.try_join_next().is_some() {}
                }
            }
        }

        // Stop claiming, let in-flight jobs finish before the pool goes away.
        let remaining = inflight.len();
        if remaining > 0 {
            tracing::info!(remaining, "Waiting for in-flight jobs to finish");
        }
        while inflight.join_next().await.is_some() {}
        tracing::info!(runner_id = %self.runner_id, "Job runner stopped");
    }

    /// Claim jobs while both a due job and a free execution slot exist.
    async fn claim_available(&self, semaphore: &Arc<Semaphore>, inflight: &mut JoinSet<()>) {
        loop {
            let Ok(permit) = Arc::clone(semaphore).try_acquire_owned() else {
                return;
            };
            match JobRepo::claim_next(&self.pool, &self.runner_id).await {
                Ok(Some(job)) => {
                    let pool = self.pool.clone();
                    let registry = self.registry.clone();
                    let context = self.context.clone();
                    inflight.spawn(async move {
                        run_claimed_job(&pool, &registry, context, job).await;
                        drop(permit);
                    });
                }
                Ok(None) => return,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to claim next job");
                    return;
                }
            }
        }
    }
}

/// Execute one claimed job to completion: invoke the registered handler and
/// record the outcome. A job with no registered handler fails permanently.
pub async fn run_claimed_job(
    pool: &PgPool,
    registry: &TaskRegistry,
    context: TaskContext,
    job: Job,
) {
    let Some(handler) = registry.get(&job.task_identifier) else {
        tracing::error!(
            job_id = job.id,
            task = %job.task_identifier,
            "No handler registered for task; failing permanently",
        );
        if let Err(e) = JobRepo::fail_permanently(pool, job.id, "Unknown task identifier").await {
            tracing::error!(job_id = job.id, error = %e, "Failed to record permanent failure");
        }
        return;
    };

    let job_id = job.id;
    let task = job.task_identifier.clone();
    let attempts = job.attempts;
    let max_attempts = job.max_attempts;

    match handler(context, job.payload).await {
        Ok(()) => {
            tracing::info!(job_id, task = %task, "Job completed");
            if let Err(e) = JobRepo::complete(pool, job_id).await {
                tracing::error!(job_id, error = %e, "Failed to delete completed job");
            }
        }
        Err(e) => {
            let backoff = retry_backoff_secs(attempts);
            tracing::warn!(
                job_id,
                task = %task,
                attempts,
                max_attempts,
                backoff_secs = backoff,
                error = %e,
                "Job failed",
            );
            if let Err(e) = JobRepo::fail(pool, job_id, &format!("{e:#}"), backoff).await {
                tracing::error!(job_id, error = %e, "Failed to record job failure");
            }
        }
    }
}

/// Exponential backoff in seconds for the given attempt count, capped at
/// [`MAX_BACKOFF_SECS`].
fn retry_backoff_secs(attempts: i32) -> f64 {
    2f64.powi(attempts.clamp(1, 12)).min(MAX_BACKOFF_SECS)
}
