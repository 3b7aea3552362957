use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use harbor_api::config::AppConfig;
use harbor_api::routes;
use harbor_api::state::AppState;
use harbor_core::shutdown::ShutdownHooks;
use harbor_worker::registry::TaskContext;
use harbor_worker::runner::JobRunner;
use harbor_worker::tasks;
use harbor_worker::tasks::emails::{EmailConfig, Mailer};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "harbor_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = AppConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, root_url = %config.root_url, "Loaded server configuration");

    // --- Database ---
    let pools = harbor_db::DbPools::connect(&config.database_url, &config.auth_database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pools created");

    harbor_db::health_check(&pools.root)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    harbor_db::run_migrations(&pools.root)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Embedded job runner ---
    let mailer = EmailConfig::from_env().map(|c| Arc::new(Mailer::new(c)));
    if mailer.is_none() {
        tracing::warn!("SMTP not configured; emails will be logged, not sent");
    }
    let context = TaskContext {
        pool: pools.root.clone(),
        root_url: config.root_url.clone(),
        mailer,
    };
    let runner =
        JobRunner::new(tasks::default_registry(), context).with_concurrency(config.worker_concurrency);
    let runner_cancel = CancellationToken::new();
    let runner_handle = tokio::spawn(runner.run(runner_cancel.clone()));
    tracing::info!("Job runner started");

    // --- Shutdown hooks (run in reverse registration order) ---
    let mut hooks = ShutdownHooks::new();
    {
        let pools = pools.clone();
        hooks.register("close database pools", move || async move {
            pools.root.close().await;
            pools.auth.close().await;
        });
    }
    hooks.register("stop job runner", move || async move {
        runner_cancel.cancel();
        let _ = runner_handle.await;
    });

    // --- App state & router ---
    let state = AppState::new(pools, config.clone());
    let app = routes::app(state);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");
    hooks
        .run(Duration::from_secs(config.shutdown_timeout_secs))
        .await;
    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server shuts
/// down cleanly whether stopped interactively or by a process manager.
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
