//! Task registry: maps task identifiers to their handlers.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use sqlx::PgPool;

use crate::tasks::emails::Mailer;

/// Result type returned by task handlers. Any error fails the job and
/// schedules a retry.
pub type TaskResult = anyhow::Result<()>;

type BoxFuture = Pin<Box<dyn Future<Output = TaskResult> + Send>>;
type Handler = Arc<dyn Fn(TaskContext, serde_json::Value) -> BoxFuture + Send + Sync>;

/// Collaborators handed to every task handler.
#[derive(Clone)]
pub struct TaskContext {
    pub pool: PgPool,
    /// Canonical origin, used to build links in outbound emails.
    pub root_url: String,
    /// `None` when SMTP is not configured; tasks then log instead of sending.
    pub mailer: Option<Arc<Mailer>>,
}

/// Maps task identifiers to handlers. Cheap to clone.
#[derive(Clone, Default)]
pub struct TaskRegistry {
    handlers: HashMap<&'static str, Handler>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under a task identifier. A later registration
    /// under the same identifier replaces the earlier one.
    pub fn register<F, Fut>(&mut self, task_identifier: &'static str, handler: F)
    where
        F: Fn(TaskContext, serde_json::Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TaskResult> + Send + 'static,
    {
        self.handlers.insert(
            task_identifier,
            Arc::new(move |ctx, payload| Box::pin(handler(ctx, payload))),
        );
    }

    pub fn get(&self, task_identifier: &str) -> Option<Handler> {
        self.handlers.get(task_identifier).cloned()
    }

    /// Registered identifiers, for startup logging.
    pub fn task_identifiers(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.handlers.keys().copied().collect();
        names.sort_unstable();
        names
    }
}
