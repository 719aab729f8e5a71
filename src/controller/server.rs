//! # HTTP Server
//!
//! Serves Prometheus metrics and Kubernetes probes.
//!
//! - `GET /metrics` - Prometheus text format
//! - `GET /healthz` - liveness, always OK once serving
//! - `GET /readyz` - readiness, OK after the listener is bound

use crate::observability::Metrics;
use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Shared state for the HTTP server
#[derive(Debug, Clone)]
pub struct ServerState {
    pub is_ready: Arc<AtomicBool>,
    pub metrics: Arc<Metrics>,
}

impl ServerState {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self {
            is_ready: Arc::new(AtomicBool::new(false)),
            metrics,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.is_ready.load(Ordering::Relaxed)
    }
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/metrics", get(metrics))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `port` and serve until the process exits
///
/// Marks the state ready as soon as the listener is bound.
pub async fn start_server(port: u16, state: ServerState) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind HTTP server to {addr}"))?;

    info!("HTTP server listening on {}", addr);
    state.is_ready.store(true, Ordering::Relaxed);

    axum::serve(listener, router(state))
        .await
        .context("HTTP server terminated")
}

async fn metrics(State(state): State<ServerState>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn healthz() -> &'static str {
    "ok"
}

async fn readyz(State(state): State<ServerState>) -> impl IntoResponse {
    if state.is_ready() {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready")
    }
}
