//! HTTP Server
//!
//! This module implements the Prometheus exporter HTTP server.
//!
//! # Architecture
//!
//! - **HTTP Server**: Axum-based server exposing `/metrics`, `/health`, and `/` endpoints
//! - **Snapshot Cache**: shared [`SnapshotCache`] that collects and holds the current snapshot
//! - **Refresh Loop**: background task, only in `interval` refresh mode
//!
//! # Endpoints
//!
//! - `GET /` - HTML landing page with links to metrics and health
//! - `GET /metrics` - Prometheus metrics in text format
//! - `GET /health` - 200 if the last refresh succeeded, 503 otherwise
//!
//! # Error Handling
//!
//! A failed refresh never fails a scrape on its own: the previous snapshot is
//! served. Only when nothing has ever been collected does `/metrics` answer
//! 503, and a render failure answers 500. Neither carries a partial body.

use crate::cache::SnapshotCache;
use crate::config::{Config, RefreshMode};
use crate::error::ExporterError;
use crate::metrics;
use crate::zfs::CommandSource;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Content type of the Prometheus text exposition format
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

#[derive(Clone)]
pub struct AppState {
    pub refresh_mode: RefreshMode,
    pub cache: Arc<SnapshotCache>,
}

/// Build the exporter's routes around a snapshot cache
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

pub async fn start(config: Config) -> anyhow::Result<()> {
    let collector = &config.collector;
    let source = Arc::new(CommandSource::new(
        collector.command_timeout(),
        &collector.kstat_root,
    ));
    let cache = Arc::new(SnapshotCache::new(
        source,
        metrics::ExporterMetrics::new()?,
        collector.collection_timeout(),
    ));

    match collector.refresh_mode {
        RefreshMode::Interval => {
            let background = Arc::clone(&cache);
            let period = collector.refresh_interval();
            tokio::spawn(async move {
                background.run_interval(period).await;
            });
        }
        RefreshMode::OnScrape => {
            // Prime the cache so /health reflects reality before the first scrape
            if let Err(e) = cache.refresh().await {
                warn!("Initial collection failed: {}", e);
            }
        }
    }

    let app = router(AppState {
        refresh_mode: collector.refresh_mode,
        cache,
    });

    // Start the server
    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ExporterError::Server(format!("failed to bind {}: {}", addr, e)))?;

    info!("Metrics server listening on {}", addr);
    info!("Metrics available at http://{}/metrics", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

async fn root_handler() -> impl IntoResponse {
    Html(
        r#"<html>
<head><title>ZFS Exporter</title></head>
<body>
<h1>ZFS Prometheus Exporter</h1>
<p><a href="/metrics">Metrics</a></p>
<p><a href="/health">Health</a></p>
</body>
</html>"#,
    )
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    let Some(snapshot) = state.cache.snapshot_for_scrape(state.refresh_mode).await else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            "No ZFS snapshot collected yet",
        )
            .into_response();
    };

    match metrics::render(&snapshot, state.cache.metrics()) {
        Ok(body) => ([(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            error!("Failed to render metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error rendering metrics: {}", e),
            )
                .into_response()
        }
    }
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    if state.cache.is_healthy() {
        (StatusCode::OK, "OK")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "ZFS collection failing")
    }
}
