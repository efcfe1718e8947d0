//! HTTP surface for operator visibility (§4.8): `/healthz` reports liveness
//! and changenumber lag, `/metrics` exposes Prometheus text format. Neither
//! is one of the consumer-facing authentication endpoints named in §6 as
//! out of scope.

use std::sync::Arc;
use std::time::Instant;

use adr_common::ChangelogSource;
use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
    routing::get,
};
use serde_json::json;

use crate::cursor::CursorStore;
use crate::metrics;

/// Shared state for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    pub cursor: Arc<dyn CursorStore>,
    pub changelog: Arc<dyn ChangelogSource>,
    pub version: &'static str,
    pub started_at: Instant,
}

/// Creates the router exposing `/healthz` and `/metrics`.
pub fn create_router(state: HttpState) -> Router {
    Router::new()
        .route("/healthz", get(healthz_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(Arc::new(state))
}

async fn healthz_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let uptime_secs = state.started_at.elapsed().as_secs();
    let last_applied = state.cursor.load().unwrap_or(None);
    let newest = state.changelog.newest_changenumber().await.unwrap_or(None);
    let lag = match (last_applied, newest) {
        (Some(applied), Some(newest)) => Some((newest - applied).max(0)),
        _ => None,
    };

    Json(json!({
        "status": "healthy",
        "version": state.version,
        "uptime_seconds": uptime_secs,
        "last_applied_changenumber": last_applied,
        "newest_changenumber": newest,
        "lag": lag,
    }))
}

async fn metrics_handler() -> impl IntoResponse {
    match metrics::encode() {
        Ok(body) => (StatusCode::OK, [(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, format!("failed to encode metrics: {e}")).into_response(),
    }
}

/// Binds and serves the router in the background, returning a join handle.
pub async fn start_server(bind: &str, state: HttpState) -> std::io::Result<tokio::task::JoinHandle<Result<(), std::io::Error>>> {
    let router = create_router(state);
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(%bind, "starting health/metrics HTTP server");
    Ok(tokio::spawn(async move { axum::serve(listener, router).await }))
}
