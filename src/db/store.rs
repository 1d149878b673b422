use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    error::AppResult,
    models::{ContentItem, UserInteraction, UserInterest},
    services::scoring::EngagementFormula,
};

/// Connection pool figures reported by the store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Open connections, idle or in use
    pub size: u32,
    pub idle: u32,
}

/// Query interface over the relational store
///
/// Every method is exactly one round trip. Callers route them through
/// [`GuardedDataAccess`](crate::services::guarded::GuardedDataAccess) so each
/// call counts as one guarded operation for the circuit breaker.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Top `limit` content items by engagement score then recency, tags joined
    async fn fetch_ranked_contents(&self, limit: u32) -> AppResult<Vec<ContentItem>>;

    /// A single content item with its tags, if it exists
    async fn fetch_content(&self, content_id: &str) -> AppResult<Option<ContentItem>>;

    async fn fetch_user_interests(&self, user_id: &str) -> AppResult<Vec<UserInterest>>;

    /// Most recent interactions first
    async fn fetch_interaction_history(
        &self,
        user_id: &str,
        limit: u32,
    ) -> AppResult<Vec<UserInteraction>>;

    /// Recomputes every content row's engagement score in one set-based statement.
    /// Returns the number of rows updated.
    async fn recompute_engagement_scores(&self, formula: &EngagementFormula) -> AppResult<u64>;

    /// Trivial liveness probe
    async fn ping(&self) -> AppResult<()>;

    fn pool_stats(&self) -> PoolStats;
}
