//! Ordered cleanup callbacks for graceful shutdown.
//!
//! Long-lived resources (the job runner, database pools) register a cleanup
//! hook at startup. On a shutdown signal the hooks run one at a time in
//! reverse registration order, so resources are released in the opposite
//! order they were acquired. Each hook is bounded by a timeout; a stuck hook
//! is logged and skipped rather than wedging the process.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
type Hook = Box<dyn FnOnce() -> BoxFuture + Send>;

/// An ordered list of one-shot async cleanup callbacks.
#[derive(Default)]
pub struct ShutdownHooks {
    hooks: Vec<(&'static str, Hook)>,
}

impl ShutdownHooks {
    pub fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    /// Register a cleanup callback. Hooks run in reverse registration order.
    pub fn register<F, Fut>(&mut self, name: &'static str, hook: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.hooks.push((name, Box::new(move || Box::pin(hook()))));
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Run all hooks in reverse registration order, each bounded by `timeout`.
    pub async fn run(mut self, timeout: Duration) {
        while let Some((name, hook)) = self.hooks.pop() {
            tracing::info!(hook = name, "Running shutdown hook");
            if tokio::time::timeout(timeout, hook()).await.is_err() {
                tracing::warn!(hook = name, timeout_secs = timeout.as_secs(), "Shutdown hook timed out");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[tokio::test]
    async fn hooks_run_in_reverse_registration_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut hooks = ShutdownHooks::new();

        for name in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            hooks.register(name, move || async move {
                order.lock().unwrap().push(name);
            });
        }
        assert_eq!(hooks.len(), 3);

        hooks.run(Duration::from_secs(1)).await;
        assert_eq!(*order.lock().unwrap(), vec!["third", "second", "first"]);
    }

    #[tokio::test]
    async fn stuck_hook_does_not_block_the_rest() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut hooks = ShutdownHooks::new();

        {
            let order = Arc::clone(&order);
            hooks.register("fast", move || async move {
                order.lock().unwrap().push("fast");
            });
        }
        hooks.register("stuck", || async {
            tokio::time::sleep(Duration::from_secs(60)).await;
        });

        hooks.run(Duration::from_millis(10)).await;
        assert_eq!(*order.lock().unwrap(), vec!["fast"]);
    }
}
