use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    middleware::request_id::RequestId,
    resilience::CircuitBreakerSnapshot,
    routes::AppState,
    services::{events::CacheMetrics, HealthState, HealthStatus},
};

#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    pub cache: CacheMetrics,
    pub circuit_breaker: CircuitBreakerSnapshot,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResetResponse {
    pub message: String,
    pub circuit_breaker: CircuitBreakerSnapshot,
}

/// Health check endpoint
///
/// Responds 503 while the store breaker is open so load balancers can route around us.
pub async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthStatus>) {
    let health = state.guarded.health_status();
    let status = match health.status {
        HealthState::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        HealthState::Healthy | HealthState::Recovering => StatusCode::OK,
    };
    (status, Json(health))
}

/// GET /api/v1/admin/circuit-breaker
pub async fn circuit_breaker_state(
    State(state): State<Arc<AppState>>,
) -> Json<CircuitBreakerSnapshot> {
    Json(state.guarded.breaker().snapshot())
}

/// POST /api/v1/admin/circuit-breaker/reset
pub async fn reset_circuit_breaker(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
) -> Json<ResetResponse> {
    tracing::warn!(request_id = %request_id, "Manual circuit breaker reset requested");

    let snapshot = state.guarded.reset_circuit_breaker();
    Json(ResetResponse {
        message: "Circuit breaker reset".to_string(),
        circuit_breaker: snapshot,
    })
}

/// GET /api/v1/admin/metrics
pub async fn metrics(State(state): State<Arc<AppState>>) -> Json<MetricsResponse> {
    Json(MetricsResponse {
        cache: state.metrics.cache_metrics(),
        circuit_breaker: state.guarded.breaker().snapshot(),
    })
}

/// POST /api/v1/admin/metrics/reset
pub async fn reset_metrics(State(state): State<Arc<AppState>>) -> Json<MetricsResponse> {
    state.metrics.reset_cache_metrics();
    Json(MetricsResponse {
        cache: state.metrics.cache_metrics(),
        circuit_breaker: state.guarded.breaker().snapshot(),
    })
}
