//! Storyloom API server entry point.

use std::error::Error;
use std::sync::Arc;

use storyloom_core::clock::SystemClock;
use storyloom_core::task::TaskKind;
use storyloom_task_store::memory_registry::InMemoryTaskRegistry;
use storyloom_tasks::domain::catalog::WorkCatalog;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use storyloom_api::config::ApiConfig;
use storyloom_api::routes;
use storyloom_api::state::AppState;
use storyloom_api::sweeper::spawn_retention_sweeper;
use storyloom_api::telemetry::init_telemetry;
use storyloom_api::work::{BatchAnalysisWork, TextAnalysisWork};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();

    // Read configuration from environment.
    let config = ApiConfig::from_env()?;

    // Initialize tracing subscriber, with OTLP export when enabled.
    let telemetry = init_telemetry(&config.telemetry)?;
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().json())
        .with(telemetry.layer())
        .init();

    tracing::info!(
        telemetry = telemetry.is_enabled(),
        "Starting Storyloom API server"
    );

    // Task registry and its retention sweep.
    let registry = Arc::new(InMemoryTaskRegistry::new(Arc::new(SystemClock)));
    let sweeper = spawn_retention_sweeper(
        Arc::clone(&registry),
        config.retention,
        config.sweep_interval,
    );

    // Units of work available on this server.
    let catalog = WorkCatalog::new()
        .with(TaskKind::Analyze, Arc::new(TextAnalysisWork))
        .with(
            TaskKind::BatchAnalyze,
            Arc::new(BatchAnalysisWork::new(config.batch_max_stories)),
        );
    tracing::info!(kinds = ?catalog.kinds(), "work catalog ready");

    let app = routes::app(AppState::new(registry, catalog), &config.cors_origins);

    // Start server.
    tracing::info!("Listening on {}", config.addr);
    let listener = tokio::net::TcpListener::bind(config.addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    telemetry.shutdown()?;
    tracing::info!("Graceful shutdown complete");

    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl-C, starting graceful shutdown"),
        () = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
    }
}
