use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    config::Config,
    db::{Cache, CacheBackend, ContentStore},
    error::{AppError, AppResult},
    middleware::request_id::{make_span_with_request_id, request_id_middleware},
    services::{
        EngagementUpdater, EventSink, GuardedDataAccess, RecommendationService, TracingEventSink,
    },
};

pub mod admin;
pub mod contents;
pub mod recommendations;

/// Largest page size accepted from clients
pub const MAX_LIMIT: u32 = 100;

/// Shared handles the handlers work with
pub struct AppState {
    pub recommendations: Arc<RecommendationService>,
    pub engagement: Arc<EngagementUpdater>,
    pub guarded: Arc<GuardedDataAccess>,
    pub metrics: Arc<TracingEventSink>,
}

impl AppState {
    /// Wires the services around one store, one cache backend and one breaker
    pub fn new(
        store: Arc<dyn ContentStore>,
        cache_backend: Arc<dyn CacheBackend>,
        config: &Config,
    ) -> Self {
        let metrics = Arc::new(TracingEventSink::new());
        let events: Arc<dyn EventSink> = metrics.clone();
        let cache = Cache::new(cache_backend);

        let guarded = Arc::new(GuardedDataAccess::new(
            store,
            config.circuit_breaker(),
            config.queue_alert_threshold,
        ));

        let recommendations = Arc::new(RecommendationService::new(
            cache.clone(),
            guarded.clone(),
            events.clone(),
        ));

        let engagement = Arc::new(EngagementUpdater::new(
            cache,
            guarded.clone(),
            events,
            config.engagement_formula(),
        ));

        Self {
            recommendations,
            engagement,
            guarded,
            metrics,
        }
    }
}

/// Applies the default and checks the inbound limit range
pub(crate) fn validate_limit(limit: Option<u32>, default: u32) -> AppResult<u32> {
    let limit = limit.unwrap_or(default);
    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(AppError::InvalidInput(format!(
            "limit must be between 1 and {}",
            MAX_LIMIT
        )));
    }
    Ok(limit)
}

pub(crate) fn validate_id(field: &str, value: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::InvalidInput(format!("{} is required", field)));
    }
    Ok(())
}

/// Creates the application router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(admin::health_check))
        .nest("/api/v1", api_routes())
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
                .layer(create_cors_layer()),
        )
}

fn create_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// API routes under /api/v1
fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/recommendations/:user_id",
            get(recommendations::get_recommendations),
        )
        .route(
            "/recommendations/:user_id/history",
            get(recommendations::get_interaction_history),
        )
        .route(
            "/recommendations/refresh/:user_id",
            post(recommendations::refresh_recommendations),
        )
        .route(
            "/recommendations/update-scores",
            post(recommendations::update_engagement_scores),
        )
        .route(
            "/recommendations/warm-up",
            post(recommendations::warm_up_cache),
        )
        .route(
            "/recommendations/clear-cache",
            post(recommendations::clear_cache),
        )
        .route("/contents/top", get(contents::top_contents))
        .route("/contents/:content_id", get(contents::get_content))
        .route("/admin/circuit-breaker", get(admin::circuit_breaker_state))
        .route(
            "/admin/circuit-breaker/reset",
            post(admin::reset_circuit_breaker),
        )
        .route("/admin/metrics", get(admin::metrics))
        .route("/admin/metrics/reset", post(admin::reset_metrics))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_limit_default_and_bounds() {
        assert_eq!(validate_limit(None, 20).unwrap(), 20);
        assert_eq!(validate_limit(Some(1), 20).unwrap(), 1);
        assert_eq!(validate_limit(Some(100), 20).unwrap(), 100);
        assert!(validate_limit(Some(0), 20).is_err());
        assert!(validate_limit(Some(101), 20).is_err());
    }

    #[test]
    fn test_validate_id_rejects_blank() {
        assert!(validate_id("user_id", "u1").is_ok());
        assert!(validate_id("user_id", "   ").is_err());
    }
}
