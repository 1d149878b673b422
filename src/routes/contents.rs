use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::sync::Arc;

use crate::{
    error::AppResult,
    models::ContentItem,
    routes::{recommendations::LimitQuery, validate_id, validate_limit, AppState},
};

const DEFAULT_TOP_LIMIT: u32 = 100;

/// GET /api/v1/contents/top
pub async fn top_contents(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LimitQuery>,
) -> AppResult<Json<Vec<ContentItem>>> {
    let limit = validate_limit(query.limit, DEFAULT_TOP_LIMIT)?;
    let contents = state.recommendations.get_top_contents(limit).await?;
    Ok(Json(contents))
}

/// GET /api/v1/contents/:content_id
pub async fn get_content(
    State(state): State<Arc<AppState>>,
    Path(content_id): Path<String>,
) -> AppResult<Json<ContentItem>> {
    validate_id("content_id", &content_id)?;
    let content = state.recommendations.get_content(&content_id).await?;
    Ok(Json(content))
}
