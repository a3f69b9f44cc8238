//! Lending Server - library lending REST API

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tokio::{signal, sync::watch};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lending_server::{
    api,
    config::AppConfig,
    repository::{lending::LendingStore, Repository},
    services::{
        email::build_mailer,
        notifications::{spawn_workers, NotificationDispatcher, NotificationQueue},
        scheduler::run_overdue_scans,
        Services,
    },
    AppState,
};

/// How long queued notifications may take to drain on shutdown
const WORKER_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().context("Failed to load configuration")?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("lending_server={},tower_http=debug", config.logging.level).into());

    if config.logging.format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!("Starting Lending Server v{}", env!("CARGO_PKG_VERSION"));

    // Create database connection pool
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect(&config.database.url)
        .await
        .context("Failed to connect to database")?;

    tracing::info!("Connected to database");

    // Run migrations
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    tracing::info!("Database migrations completed");

    // Notification pipeline
    let repository = Repository::new(pool);
    let store: Arc<dyn LendingStore> = Arc::new(repository.lending.clone());
    let mailer = build_mailer(&config.email)?;

    let (queue, receiver) = NotificationQueue::bounded(config.notifications.queue_capacity);
    let dispatcher = Arc::new(NotificationDispatcher::new(store.clone(), mailer));
    let workers = spawn_workers(dispatcher, receiver, config.notifications.workers);

    tracing::info!(
        workers = workers.len(),
        capacity = config.notifications.queue_capacity,
        "Notification workers started"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = match config.notifications.overdue_scan_interval_secs {
        0 => {
            tracing::info!("Overdue scans disabled");
            None
        }
        secs => Some(tokio::spawn(run_overdue_scans(
            queue.clone(),
            Duration::from_secs(secs),
            shutdown_rx,
        ))),
    };

    let services = Services::new(repository, store, &config.lending, queue);

    let addr = SocketAddr::new(
        config.server.host.parse().context("Invalid host address")?,
        config.server.port,
    );

    // Create application state
    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(services),
    };

    // Build router
    let app = api::router(state);

    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router held the last request-side queue handle; once the scheduler
    // drops its own, workers drain what is left and stop.
    shutdown_tx.send(true).ok();
    if let Some(scheduler) = scheduler {
        scheduler.await.ok();
    }

    let drain = join_workers(workers);
    if tokio::time::timeout(WORKER_DRAIN_TIMEOUT, drain).await.is_err() {
        tracing::warn!("Notification workers did not finish in time, exiting");
    }

    tracing::info!("Server stopped");
    Ok(())
}

async fn join_workers(workers: Vec<tokio::task::JoinHandle<()>>) {
    for worker in workers {
        worker.await.ok();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections");
}
