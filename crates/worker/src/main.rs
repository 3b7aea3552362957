use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use harbor_worker::registry::TaskContext;
use harbor_worker::runner::JobRunner;
use harbor_worker::tasks;
use harbor_worker::tasks::emails::{EmailConfig, Mailer};

/// Default number of concurrently executing jobs.
const DEFAULT_CONCURRENCY: usize = 4;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "harbor_worker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let root_url =
        std::env::var("ROOT_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
    let concurrency: usize = std::env::var("WORKER_CONCURRENCY")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_CONCURRENCY);

    let pool = harbor_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    harbor_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database connection pool created");

    let mailer = EmailConfig::from_env().map(|config| Arc::new(Mailer::new(config)));
    if mailer.is_none() {
        tracing::warn!("SMTP not configured; emails will be logged, not sent");
    }

    let context = TaskContext {
        pool: pool.clone(),
        root_url,
        mailer,
    };
    let runner = JobRunner::new(tasks::default_registry(), context).with_concurrency(concurrency);

    let cancel = CancellationToken::new();
    let runner_handle = tokio::spawn(runner.run(cancel.clone()));

    shutdown_signal().await;
    tracing::info!("Shutdown signal received");

    // Stop claiming; the runner drains in-flight jobs before returning.
    cancel.cancel();
    let _ = runner_handle.await;

    pool.close().await;
    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT (Ctrl-C) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
