use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reason attached to every scored recommendation
pub const DEFAULT_REASON: &str = "Based on interests and engagement";

/// A scored recommendation, computed per request and only ever cached
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecommendationResult {
    pub content_id: String,
    pub title: String,
    pub tags: Vec<String>,
    /// Blend of engagement and tag-interest match, in [0,1]
    pub score: f64,
    pub reason: String,
}

/// Response body for recommendation endpoints
#[derive(Debug, Serialize, Deserialize)]
pub struct RecommendationsResponse {
    pub user_id: String,
    pub count: usize,
    pub recommendations: Vec<RecommendationResult>,
    pub generated_at: DateTime<Utc>,
}

impl RecommendationsResponse {
    pub fn new(user_id: String, recommendations: Vec<RecommendationResult>) -> Self {
        Self {
            user_id,
            count: recommendations.len(),
            recommendations,
            generated_at: Utc::now(),
        }
    }
}
