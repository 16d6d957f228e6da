// HTTP server for the access gate
//
// Routes:
// - POST /v1/acquire              gate check before a metered call
// - POST /v1/usage                record a successful call
// - GET  /v1/usage/{resource_id}  counters for a (caller, resource) pair
// - GET  /metrics                 Prometheus scrape endpoint
// - GET  /health

use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::metrics;
use crate::rate_limit::{AccessGate, DenyReason, UsageSnapshot};

/// Shared handler state
#[derive(Debug, Clone)]
pub struct AppState {
    gate: Arc<AccessGate>,
    metrics_enabled: bool,
}

impl AppState {
    /// Create handler state around `gate`
    pub fn new(gate: Arc<AccessGate>, metrics_enabled: bool) -> Self {
        Self {
            gate,
            metrics_enabled,
        }
    }
}

/// Body of `POST /v1/acquire`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquireRequest {
    pub caller_id: Option<String>,
    pub resource_id: String,
    #[serde(default)]
    pub daily_limit: i64,
}

/// Response of `POST /v1/acquire`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquireResponse {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<DenyReason>,
}

/// Body of `POST /v1/usage`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRequest {
    pub caller_id: Option<String>,
    pub resource_id: String,
}

/// Query of `GET /v1/usage/{resource_id}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusQuery {
    pub caller_id: Option<String>,
    #[serde(default)]
    pub daily_limit: i64,
}

/// Build the router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/acquire", post(acquire_handler))
        .route("/v1/usage", post(usage_handler))
        .route("/v1/usage/{resource_id}", get(status_handler))
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server
///
/// # Arguments
/// * `addr` - Address to listen on
/// * `state` - Handler state
pub async fn serve(addr: SocketAddr, state: AppState) -> Result<()> {
    metrics::init().context("Failed to initialize metrics")?;

    info!("Starting quotaguard server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind server")?;

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
}

async fn acquire_handler(
    State(state): State<AppState>,
    Json(req): Json<AcquireRequest>,
) -> Json<AcquireResponse> {
    let decision = state
        .gate
        .check(req.caller_id.as_deref(), &req.resource_id, req.daily_limit)
        .await;
    Json(AcquireResponse {
        allowed: decision.allowed,
        reason: decision.reason,
    })
}

async fn usage_handler(State(state): State<AppState>, Json(req): Json<UsageRequest>) -> StatusCode {
    state
        .gate
        .record_usage(req.caller_id.as_deref(), &req.resource_id)
        .await;
    StatusCode::NO_CONTENT
}

async fn status_handler(
    State(state): State<AppState>,
    Path(resource_id): Path<String>,
    Query(query): Query<StatusQuery>,
) -> Json<UsageSnapshot> {
    Json(
        state
            .gate
            .snapshot(query.caller_id.as_deref(), &resource_id, query.daily_limit)
            .await,
    )
}

/// Metrics endpoint handler
async fn metrics_handler(State(state): State<AppState>) -> Response {
    if !state.metrics_enabled {
        return StatusCode::NOT_FOUND.into_response();
    }
    match metrics::gather_metrics() {
        Ok(metrics_text) => (StatusCode::OK, metrics_text).into_response(),
        Err(e) => {
            error!("Failed to gather metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error gathering metrics: {}", e),
            )
                .into_response()
        }
    }
}

/// Health check endpoint
async fn health_handler() -> impl IntoResponse {
    StatusCode::OK
}
