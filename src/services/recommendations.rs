use std::sync::Arc;
use std::time::Instant;

use crate::{
    cached,
    db::{Cache, CacheKey, CachePrefix},
    error::{AppError, AppResult},
    models::{ContentItem, RecommendationResult, UserInteraction, UserInterest, DEFAULT_REASON},
    services::{
        events::{EventSink, ServiceEvent},
        guarded::GuardedDataAccess,
        scoring::{self, InterestProfile},
    },
};

const RECOMMENDATIONS_TTL: u64 = 3600; // 1 hour
const CONTENT_TTL: u64 = 86400; // 24 hours
const TOP_CONTENTS_TTL: u64 = 3600; // 1 hour
const INTERACTIONS_TTL: u64 = 43200; // 12 hours

/// Namespaces dropped by `clear_all_cache` and after every engagement recompute
pub const RECOMMENDATION_PREFIXES: [CachePrefix; 3] = [
    CachePrefix::AllRecommendations,
    CachePrefix::AllContent,
    CachePrefix::AllTopContents,
];

/// Outcome of a cache warm-up batch
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct WarmUpReport {
    pub requested: usize,
    pub succeeded: usize,
    pub failed: Vec<String>,
}

/// Deletes every key under `prefixes`, reporting each namespace to `events`
pub(crate) async fn clear_prefixes(
    cache: &Cache,
    events: &dyn EventSink,
    prefixes: &[CachePrefix],
) -> usize {
    let mut total = 0;
    for prefix in prefixes {
        let keys = cache.delete_by_prefix(prefix).await;
        if keys > 0 {
            events.emit(ServiceEvent::CacheCleared {
                prefix: prefix.to_string(),
                keys,
            });
        }
        total += keys;
    }
    total
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

fn require_user_id(user_id: &str) -> AppResult<()> {
    if user_id.trim().is_empty() {
        return Err(AppError::InvalidInput("user_id must not be empty".to_string()));
    }
    Ok(())
}

fn require_limit(limit: u32) -> AppResult<()> {
    if limit == 0 {
        return Err(AppError::InvalidInput("limit must be positive".to_string()));
    }
    Ok(())
}

/// Answers "top-N content for user U" from the tiered cache, falling back to
/// guarded store queries and scoring on a miss.
pub struct RecommendationService {
    cache: Cache,
    guarded: Arc<GuardedDataAccess>,
    events: Arc<dyn EventSink>,
}

impl RecommendationService {
    pub fn new(cache: Cache, guarded: Arc<GuardedDataAccess>, events: Arc<dyn EventSink>) -> Self {
        Self {
            cache,
            guarded,
            events,
        }
    }

    async fn probe<T: serde::de::DeserializeOwned>(
        &self,
        namespace: &'static str,
        key: &CacheKey,
    ) -> Option<T> {
        let cached = self.cache.get_from_cache(key).await;
        let key = key.to_string();
        self.events.emit(match cached {
            Some(_) => ServiceEvent::CacheHit { namespace, key },
            None => ServiceEvent::CacheMiss { namespace, key },
        });
        cached
    }

    /// Scored recommendations for `user_id`, best engagement first
    ///
    /// A cached list is returned verbatim. When the store is unavailable the result
    /// degrades to an empty list, and degraded lists are never cached.
    pub async fn get_recommendations(
        &self,
        user_id: &str,
        limit: u32,
    ) -> AppResult<Vec<RecommendationResult>> {
        require_user_id(user_id)?;
        require_limit(limit)?;

        let cache_key = CacheKey::Recommendations {
            user_id: user_id.to_string(),
            limit,
        };

        if let Some(cached) = self.probe("recommendations", &cache_key).await {
            return Ok(cached);
        }

        // Content and tags in one guarded round trip
        let start = Instant::now();
        let contents = self
            .guarded
            .execute("ranked-contents", Some(Vec::new()), |store| async move {
                store.fetch_ranked_contents(limit).await
            })
            .await?;
        self.events.emit(ServiceEvent::StoreQuery {
            operation: "ranked-contents",
            rows: contents.len(),
            elapsed_ms: elapsed_ms(start),
        });

        if contents.is_empty() {
            return Ok(Vec::new());
        }

        for content in &contents {
            self.cache
                .set_in_cache(&CacheKey::Content(content.id.clone()), content, CONTENT_TTL)
                .await;
        }

        let owner = user_id.to_string();
        let (interests, degraded) = match self
            .guarded
            .execute("user-interests", None, |store| async move {
                store.fetch_user_interests(&owner).await
            })
            .await
        {
            Ok(interests) => (interests, false),
            Err(e) => {
                self.events.emit(ServiceEvent::DegradedResult {
                    operation: "user-interests",
                    user_id: user_id.to_string(),
                    reason: e.to_string(),
                });
                (Vec::<UserInterest>::new(), true)
            }
        };

        let profile = InterestProfile::from_interests(&interests);
        let recommendations: Vec<RecommendationResult> = contents
            .iter()
            .map(|content| RecommendationResult {
                content_id: content.id.clone(),
                title: content.title.clone(),
                tags: content.tag_names(),
                score: scoring::score(&profile, content),
                reason: DEFAULT_REASON.to_string(),
            })
            .filter(|result| {
                let valid = scoring::is_valid_result(result);
                if !valid {
                    tracing::warn!(content_id = %result.content_id, "Dropping invalid recommendation");
                }
                valid
            })
            .collect();

        if !degraded {
            self.cache
                .set_in_cache(&cache_key, &recommendations, RECOMMENDATIONS_TTL)
                .await;
        }

        Ok(recommendations)
    }

    /// Drops the user's cached lists and recomputes them
    pub async fn refresh_recommendations(
        &self,
        user_id: &str,
        limit: u32,
    ) -> AppResult<Vec<RecommendationResult>> {
        require_user_id(user_id)?;
        require_limit(limit)?;

        clear_prefixes(
            &self.cache,
            self.events.as_ref(),
            &[
                CachePrefix::UserRecommendations(user_id.to_string()),
                CachePrefix::UserInteractions(user_id.to_string()),
            ],
        )
        .await;

        self.get_recommendations(user_id, limit).await
    }

    /// Most recent interactions for `user_id`, newest first
    pub async fn get_user_interaction_history(
        &self,
        user_id: &str,
        limit: u32,
    ) -> AppResult<Vec<UserInteraction>> {
        require_user_id(user_id)?;
        require_limit(limit)?;

        let key = CacheKey::InteractionHistory {
            user_id: user_id.to_string(),
            limit,
        };
        let owner = user_id.to_string();

        cached!(self, key, INTERACTIONS_TTL, async {
            self.guarded
                .execute("interaction-history", None, |store| async move {
                    store.fetch_interaction_history(&owner, limit).await
                })
                .await
        })
    }

    /// Highest-engagement content with tags
    pub async fn get_top_contents(&self, limit: u32) -> AppResult<Vec<ContentItem>> {
        require_limit(limit)?;

        let key = CacheKey::TopContents(limit);

        cached!(self, key, TOP_CONTENTS_TTL, async {
            self.guarded
                .execute("top-contents", None, |store| async move {
                    store.fetch_ranked_contents(limit).await
                })
                .await
        })
    }

    /// A single content object, served from the per-content tier when possible
    pub async fn get_content(&self, content_id: &str) -> AppResult<ContentItem> {
        if content_id.trim().is_empty() {
            return Err(AppError::InvalidInput("content_id must not be empty".to_string()));
        }

        let key = CacheKey::Content(content_id.to_string());
        let id = content_id.to_string();

        cached!(self, key, CONTENT_TTL, async {
            self.guarded
                .execute("content-by-id", None, |store| async move {
                    store.fetch_content(&id).await
                })
                .await?
                .ok_or_else(|| AppError::NotFound(format!("content {}", content_id)))
        })
    }

    /// Computes recommendations for each user in turn
    ///
    /// A failure for one user is logged and counted; the batch always runs to the end.
    pub async fn warm_up_cache(&self, user_ids: &[String], limit: u32) -> WarmUpReport {
        let start = Instant::now();
        let mut succeeded = 0;
        let mut failed = Vec::new();

        for user_id in user_ids {
            match self.get_recommendations(user_id, limit).await {
                Ok(_) => succeeded += 1,
                Err(e) => {
                    self.events.emit(ServiceEvent::WarmUpFailed {
                        user_id: user_id.clone(),
                        error: e.to_string(),
                    });
                    failed.push(user_id.clone());
                }
            }
        }

        self.events.emit(ServiceEvent::WarmUpCompleted {
            requested: user_ids.len(),
            succeeded,
            elapsed_ms: elapsed_ms(start),
        });

        WarmUpReport {
            requested: user_ids.len(),
            succeeded,
            failed,
        }
    }

    /// Deletes every recommendation, content and top-content cache entry
    pub async fn clear_all_cache(&self) -> usize {
        clear_prefixes(&self.cache, self.events.as_ref(), &RECOMMENDATION_PREFIXES).await
    }

    // Lets the `cached!` macro treat the service as its cache.
    async fn get_from_cache<T: serde::de::DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let namespace = match key {
            CacheKey::Recommendations { .. } => "recommendations",
            CacheKey::Content(_) => "content",
            CacheKey::TopContents(_) => "top_contents",
            CacheKey::InteractionHistory { .. } => "interactions",
        };
        self.probe(namespace, key).await
    }

    async fn set_in_cache<T: serde::Serialize>(&self, key: &CacheKey, value: &T, ttl: u64) {
        self.cache.set_in_cache(key, value, ttl).await
    }
}
