//! Marketpulse - real-time trade analytics service
//!
//! Streams a CSV trade source through a fan-out/fan-in pipeline into the
//! aggregation engine and serves per-symbol one-minute OHLC candles and
//! running VWAP over HTTP.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use marketpulse::{
    aggregate::Aggregator,
    api,
    config::Config,
    ingest::{self, CancelToken},
};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("marketpulse=info,tower_http=warn")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let engine = Arc::new(Aggregator::new());
    let cancel = CancelToken::new();

    info!(path = %config.ticks_path.display(), "starting data ingestion");
    let ingest_task = {
        let engine = engine.clone();
        let cancel = cancel.clone();
        let path = config.ticks_path.clone();
        let ingest_config = config.ingest();
        tokio::spawn(async move {
            match ingest::run(&path, engine, ingest_config, cancel).await {
                Ok(stats) => info!(
                    processed = stats.processed,
                    skipped = stats.skipped,
                    "ingestion finished"
                ),
                Err(e) => error!(error = %e, "ingestion failed"),
            }
        })
    };

    let app = api::create_router(engine)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("failed to bind port {}", config.port))?;
    info!(port = config.port, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel))
        .await
        .context("server error")?;

    // Let the pipeline drain already-queued records before exiting.
    let _ = ingest_task.await;
    info!("server exited cleanly");
    Ok(())
}

/// Resolves on ctrl-c or SIGTERM, stopping the ingestion producer first so
/// the pipeline drains while the server finishes its active requests.
async fn shutdown_signal(cancel: CancelToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received, draining ingestion");
    cancel.cancel();
}
