use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    middleware::request_id::RequestId,
    models::{RecommendationsResponse, UserInteraction},
    routes::{validate_id, validate_limit, AppState},
    services::{EngagementUpdateReport, WarmUpReport},
};

const DEFAULT_RECOMMENDATION_LIMIT: u32 = 20;
const DEFAULT_HISTORY_LIMIT: u32 = 50;
const MAX_WARM_UP_USERS: usize = 1000;

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct WarmUpRequest {
    pub user_ids: Vec<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CacheClearedResponse {
    pub message: String,
    pub keys_cleared: usize,
    pub timestamp: DateTime<Utc>,
}

/// GET /api/v1/recommendations/:user_id
pub async fn get_recommendations(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Path(user_id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> AppResult<Json<RecommendationsResponse>> {
    validate_id("user_id", &user_id)?;
    let limit = validate_limit(query.limit, DEFAULT_RECOMMENDATION_LIMIT)?;

    let recommendations = state
        .recommendations
        .get_recommendations(&user_id, limit)
        .await?;

    tracing::info!(
        request_id = %request_id,
        user_id = %user_id,
        count = recommendations.len(),
        "Recommendations served"
    );

    Ok(Json(RecommendationsResponse::new(user_id, recommendations)))
}

/// POST /api/v1/recommendations/refresh/:user_id
pub async fn refresh_recommendations(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Path(user_id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> AppResult<Json<RecommendationsResponse>> {
    validate_id("user_id", &user_id)?;
    let limit = validate_limit(query.limit, DEFAULT_RECOMMENDATION_LIMIT)?;

    tracing::info!(request_id = %request_id, user_id = %user_id, "Refreshing recommendations");

    let recommendations = state
        .recommendations
        .refresh_recommendations(&user_id, limit)
        .await?;

    Ok(Json(RecommendationsResponse::new(user_id, recommendations)))
}

/// GET /api/v1/recommendations/:user_id/history
pub async fn get_interaction_history(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> AppResult<Json<Vec<UserInteraction>>> {
    validate_id("user_id", &user_id)?;
    let limit = validate_limit(query.limit, DEFAULT_HISTORY_LIMIT)?;

    let history = state
        .recommendations
        .get_user_interaction_history(&user_id, limit)
        .await?;

    Ok(Json(history))
}

/// POST /api/v1/recommendations/update-scores
pub async fn update_engagement_scores(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
) -> AppResult<Json<EngagementUpdateReport>> {
    tracing::info!(request_id = %request_id, "Engagement recompute requested");

    let report = state.engagement.update_content_engagement_scores().await?;
    Ok(Json(report))
}

/// POST /api/v1/recommendations/clear-cache
pub async fn clear_cache(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
) -> Json<CacheClearedResponse> {
    let keys_cleared = state.recommendations.clear_all_cache().await;

    tracing::info!(request_id = %request_id, keys_cleared, "Recommendation caches cleared");

    Json(CacheClearedResponse {
        message: "All recommendation caches cleared".to_string(),
        keys_cleared,
        timestamp: Utc::now(),
    })
}

/// POST /api/v1/recommendations/warm-up
pub async fn warm_up_cache(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<WarmUpRequest>,
) -> AppResult<Json<WarmUpReport>> {
    let limit = validate_limit(request.limit, DEFAULT_RECOMMENDATION_LIMIT)?;
    if request.user_ids.len() > MAX_WARM_UP_USERS {
        return Err(AppError::InvalidInput(format!(
            "at most {} users per warm-up",
            MAX_WARM_UP_USERS
        )));
    }

    tracing::info!(request_id = %request_id, users = request.user_ids.len(), "Cache warm-up requested");

    let report = state
        .recommendations
        .warm_up_cache(&request.user_ids, limit)
        .await;
    Ok(Json(report))
}
