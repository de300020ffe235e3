//! HTTP surface for the publish pipeline.
//!
//! `POST /publish` answers 200 with a [`PublishOutcome`] body whether or not the
//! publish worked; callers read `success`. Each request runs its own flow with
//! its own scratch directory, so concurrent requests never share fetched files.

use anyhow::{Context, Result};
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use md_publish_core::config::Settings;
use md_publish_core::contract::{Downloader, PublishOutcome, PublishRequest, ToolRunner};
use md_publish_core::Publisher;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

pub fn router<D, R>(publisher: Arc<Publisher<D, R>>) -> Router
where
    D: Downloader + 'static,
    R: ToolRunner + 'static,
{
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/publish", post(publish::<D, R>))
        .with_state(publisher)
}

async fn root() -> Json<Value> {
    Json(json!({ "message": "Hello, World!" }))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy", "service": "md2conf-api" }))
}

async fn publish<D, R>(
    State(publisher): State<Arc<Publisher<D, R>>>,
    Json(request): Json<PublishRequest>,
) -> Json<PublishOutcome>
where
    D: Downloader + 'static,
    R: ToolRunner + 'static,
{
    Json(publisher.publish(request).await)
}

/// Binds the configured address and serves until Ctrl-C.
pub async fn serve(settings: Settings) -> Result<()> {
    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let publisher = Publisher::from_settings(Arc::new(settings))
        .context("Failed to build GitHub HTTP client")?;
    let app = router(Arc::new(publisher));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(addr = %addr, "md2conf API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;
    info!("md2conf API stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = ?e, "Could not listen for Ctrl-C; serving until killed");
        std::future::pending::<()>().await;
    }
}
