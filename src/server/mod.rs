mod routes;

pub use routes::{make_routes, AckResponse, IdQuery};

use crate::pipeline::Pipeline;
use anyhow::{Context, Result};
use axum::Router;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

pub fn make_app(pipeline: Arc<Pipeline>) -> Router {
    make_routes(pipeline).layer(TraceLayer::new_for_http())
}

/// Serve the HTTP surface until `shutdown` is cancelled.
pub async fn run_server(
    pipeline: Arc<Pipeline>,
    port: u16,
    shutdown: CancellationToken,
) -> Result<()> {
    let app = make_app(pipeline);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;
    info!("Listening on port {}", port);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("HTTP server failed")
}
