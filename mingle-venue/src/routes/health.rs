use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use mingle_shared::{HealthCheck, HealthResponse, HealthStatus};
use std::sync::Arc;

use crate::AppState;

/// Probes the store and, when configured, the broker.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Response {
    let mut checks = Vec::with_capacity(2);

    checks.push(match state.store.health_check() {
        Ok(()) => HealthCheck::healthy("store"),
        Err(e) => HealthCheck::unhealthy("store", e.to_string()),
    });

    match state.events.is_connected() {
        Some(true) => checks.push(HealthCheck::healthy("rabbitmq")),
        Some(false) => checks.push(HealthCheck {
            name: "rabbitmq".into(),
            status: HealthStatus::Degraded,
            message: Some("channel closed, events are dropped".into()),
        }),
        None => {}
    }

    let response = HealthResponse::healthy("mingle-venue", env!("CARGO_PKG_VERSION"))
        .with_checks(checks);

    let status = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status, Json(response)).into_response()
}

/// Prometheus exposition.
pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    match &state.metrics_handle {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
