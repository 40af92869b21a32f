//! Process wiring for the two services.
//!
//! Startup failures (storage, broker, queue binding) abort the process
//! before any traffic is served.

use anyhow::{Context, Result};
use axum::Router;
use std::sync::Arc;
use tokio::{net::TcpListener, signal, sync::watch};
use tracing::info;
use weather_core::{
    Config, HistoryConsumer, HistoryService, IngestService,
    bus::{HISTORY_QUEUE, RedisStreamPublisher, RedisStreamSubscriber, WEATHER_EVENTS_TOPIC, redis_streams},
    provider::provider_from_config,
    store::{PgReadingStore, postgres},
};

use crate::http;

/// Ingestion API: fetch from the provider, publish, answer immediately.
pub async fn run_ingest(config: &Config, port: u16) -> Result<()> {
    info!(version = env!("CARGO_PKG_VERSION"), "Starting weather ingestion service");

    let provider = provider_from_config(config)?;

    let broker = redis_streams::connect(&config.broker_url)
        .await
        .context("Failed to connect to the broker")?;
    let publisher =
        RedisStreamPublisher::new(broker, WEATHER_EVENTS_TOPIC, config.request_timeout());

    let service = IngestService::new(provider, Arc::new(publisher));
    serve(http::ingest::router(service), port, shutdown_signal()).await
}

/// History API plus the background consumer feeding it.
pub async fn run_history(config: &Config, port: u16) -> Result<()> {
    info!(version = env!("CARGO_PKG_VERSION"), "Starting weather history service");

    let pool = postgres::connect(
        &config.database_url,
        config.db_max_connections,
        config.request_timeout(),
    )
    .await
    .context("Failed to connect to PostgreSQL")?;
    let store = PgReadingStore::new(pool, config.request_timeout());
    store
        .ensure_schema()
        .await
        .context("Failed to prepare the history table")?;

    let history = HistoryService::new(Arc::new(store));

    // Dedicated connection: blocking reads would stall anything sharing it.
    let broker = redis_streams::connect(&config.broker_url)
        .await
        .context("Failed to connect to the broker")?;
    let subscriber = RedisStreamSubscriber::new(broker, WEATHER_EVENTS_TOPIC, HISTORY_QUEUE);
    let consumer = HistoryConsumer::new(Arc::new(subscriber), history.clone());
    consumer
        .bind()
        .await
        .context("Failed to bind the history queue")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let consumer_task = tokio::spawn(async move { consumer.run(shutdown_rx).await });

    let served = serve(http::history::router(history), port, shutdown_signal()).await;

    let _ = shutdown_tx.send(true);
    consumer_task
        .await
        .context("History consumer task panicked")?;

    served
}

async fn serve(
    app: Router,
    port: u16,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server failed")?;

    info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
