use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Display;
use std::sync::Arc;

use crate::error::AppResult;

/// Raw key-value cache with per-key expiry
///
/// Values are opaque serialized payloads; typing happens one layer up in [`Cache`].
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> AppResult<Option<String>>;

    async fn set(&self, key: &str, value: String, ttl_secs: u64) -> AppResult<()>;

    async fn delete(&self, keys: &[String]) -> AppResult<()>;

    /// Keys starting with `prefix`. Used for bulk invalidation only.
    async fn scan_prefix(&self, prefix: &str) -> AppResult<Vec<String>>;

    /// Backend name for logging
    fn name(&self) -> &'static str;
}

/// Escapes the key separator so ids can never collide with another namespace
fn segment(id: &str) -> String {
    id.replace('%', "%25").replace(':', "%3A")
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Scored list for one user at one page size
    Recommendations { user_id: String, limit: u32 },
    /// Full content object with tags
    Content(String),
    TopContents(u32),
    InteractionHistory { user_id: String, limit: u32 },
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::Recommendations { user_id, limit } => {
                write!(f, "recommendations:{}:{}", segment(user_id), limit)
            }
            CacheKey::Content(id) => write!(f, "rec:content:{}:full", segment(id)),
            CacheKey::TopContents(limit) => write!(f, "rec:top_contents:{}", limit),
            CacheKey::InteractionHistory { user_id, limit } => {
                write!(f, "rec:user:{}:interactions:{}", segment(user_id), limit)
            }
        }
    }
}

/// Key namespaces for bulk invalidation by prefix scan
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CachePrefix {
    AllRecommendations,
    AllContent,
    AllTopContents,
    UserRecommendations(String),
    UserInteractions(String),
}

impl Display for CachePrefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CachePrefix::AllRecommendations => write!(f, "recommendations:"),
            CachePrefix::AllContent => write!(f, "rec:content:"),
            CachePrefix::AllTopContents => write!(f, "rec:top_contents:"),
            CachePrefix::UserRecommendations(user_id) => {
                write!(f, "recommendations:{}:", segment(user_id))
            }
            CachePrefix::UserInteractions(user_id) => {
                write!(f, "rec:user:{}:interactions:", segment(user_id))
            }
        }
    }
}

/// Typed cache client shared by every service
///
/// Nothing here ever fails the caller: backend errors and undecodable payloads
/// are logged and reported as a miss, so requests continue on the non-cached path.
#[derive(Clone)]
pub struct Cache {
    backend: Arc<dyn CacheBackend>,
}

impl Cache {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        tracing::info!(backend = backend.name(), "Cache client initialized");
        Self { backend }
    }

    /// Retrieves a value from the cache by key
    ///
    /// Returns `None` when the key is absent, when the backend is unreachable, or
    /// when the stored payload no longer decodes as `T`.
    pub async fn get_from_cache<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let key = key.to_string();
        let cached = match self.backend.get(&key).await {
            Ok(cached) => cached?,
            Err(e) => {
                tracing::warn!(error = %e, key = %key, "Cache read failed, treating as miss");
                return None;
            }
        };

        match serde_json::from_str(&cached) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(error = %e, key = %key, "Malformed cache payload, treating as miss");
                None
            }
        }
    }

    /// Serializes and stores a value with the given TTL in seconds
    ///
    /// The write is awaited, so a `get_from_cache` issued afterwards observes it.
    /// Concurrent writers to the same key race and the last write wins.
    pub async fn set_in_cache<T: Serialize>(&self, key: &CacheKey, value: &T, ttl: u64) {
        let json = match serde_json::to_string(value) {
            Ok(j) => j,
            Err(e) => {
                tracing::error!(error = %e, key = %key, "Cache serialization error");
                return;
            }
        };

        if let Err(e) = self.backend.set(&key.to_string(), json, ttl).await {
            tracing::warn!(error = %e, key = %key, "Cache write failed");
        }
    }

    pub async fn delete(&self, key: &CacheKey) {
        if let Err(e) = self.backend.delete(&[key.to_string()]).await {
            tracing::warn!(error = %e, key = %key, "Cache delete failed");
        }
    }

    pub async fn scan_keys_by_prefix(&self, prefix: &CachePrefix) -> AppResult<Vec<String>> {
        self.backend.scan_prefix(&prefix.to_string()).await
    }

    /// Deletes every key under `prefix`, returning how many were removed
    pub async fn delete_by_prefix(&self, prefix: &CachePrefix) -> usize {
        let keys = match self.scan_keys_by_prefix(prefix).await {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!(error = %e, prefix = %prefix, "Cache scan failed, nothing invalidated");
                return 0;
            }
        };

        if keys.is_empty() {
            return 0;
        }

        match self.backend.delete(&keys).await {
            Ok(()) => keys.len(),
            Err(e) => {
                tracing::warn!(error = %e, prefix = %prefix, "Cache bulk delete failed");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryCache;
    use crate::error::AppError;

    fn memory_cache() -> Cache {
        Cache::new(Arc::new(MemoryCache::new()))
    }

    struct BrokenBackend;

    #[async_trait]
    impl CacheBackend for BrokenBackend {
        async fn get(&self, _key: &str) -> AppResult<Option<String>> {
            Err(AppError::Internal("connection refused".to_string()))
        }

        async fn set(&self, _key: &str, _value: String, _ttl_secs: u64) -> AppResult<()> {
            Err(AppError::Internal("connection refused".to_string()))
        }

        async fn delete(&self, _keys: &[String]) -> AppResult<()> {
            Err(AppError::Internal("connection refused".to_string()))
        }

        async fn scan_prefix(&self, _prefix: &str) -> AppResult<Vec<String>> {
            Err(AppError::Internal("connection refused".to_string()))
        }

        fn name(&self) -> &'static str {
            "broken"
        }
    }

    #[test]
    fn test_cache_key_display_recommendations() {
        let key = CacheKey::Recommendations {
            user_id: "user-1".to_string(),
            limit: 10,
        };
        assert_eq!(format!("{}", key), "recommendations:user-1:10");
    }

    #[test]
    fn test_cache_key_display_content() {
        let key = CacheKey::Content("c42".to_string());
        assert_eq!(format!("{}", key), "rec:content:c42:full");
    }

    #[test]
    fn test_cache_key_display_top_contents() {
        assert_eq!(format!("{}", CacheKey::TopContents(100)), "rec:top_contents:100");
    }

    #[test]
    fn test_cache_key_display_interaction_history() {
        let key = CacheKey::InteractionHistory {
            user_id: "user-1".to_string(),
            limit: 50,
        };
        assert_eq!(format!("{}", key), "rec:user:user-1:interactions:50");
    }

    #[test]
    fn test_user_ids_cannot_escape_their_segment() {
        let key = CacheKey::Recommendations {
            user_id: "a:1".to_string(),
            limit: 10,
        };
        let prefix = CachePrefix::UserRecommendations("a".to_string());

        assert_eq!(format!("{}", key), "recommendations:a%3A1:10");
        assert!(!key.to_string().starts_with(&prefix.to_string()));
    }

    #[test]
    fn test_keys_fall_under_their_namespace_prefix() {
        let rec = CacheKey::Recommendations {
            user_id: "u".to_string(),
            limit: 5,
        };
        assert!(rec
            .to_string()
            .starts_with(&CachePrefix::AllRecommendations.to_string()));
        assert!(rec
            .to_string()
            .starts_with(&CachePrefix::UserRecommendations("u".to_string()).to_string()));
        assert!(CacheKey::Content("c".to_string())
            .to_string()
            .starts_with(&CachePrefix::AllContent.to_string()));
        assert!(CacheKey::TopContents(3)
            .to_string()
            .starts_with(&CachePrefix::AllTopContents.to_string()));
    }

    #[tokio::test]
    async fn test_set_then_get_round_trip() {
        let cache = memory_cache();
        let key = CacheKey::TopContents(2);
        let value = vec!["item1".to_string(), "item2".to_string()];

        cache.set_in_cache(&key, &value, 60).await;

        let retrieved: Option<Vec<String>> = cache.get_from_cache(&key).await;
        assert_eq!(retrieved, Some(value));

        cache.delete(&key).await;
        let retrieved: Option<Vec<String>> = cache.get_from_cache(&key).await;
        assert_eq!(retrieved, None);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_a_miss() {
        let backend = Arc::new(MemoryCache::new());
        let cache = Cache::new(backend.clone());
        let key = CacheKey::TopContents(1);

        backend
            .set(&key.to_string(), "{not json".to_string(), 60)
            .await
            .unwrap();

        let retrieved: Option<Vec<String>> = cache.get_from_cache(&key).await;
        assert_eq!(retrieved, None);
    }

    #[tokio::test]
    async fn test_backend_failure_is_a_miss() {
        let cache = Cache::new(Arc::new(BrokenBackend));
        let key = CacheKey::TopContents(1);

        cache.set_in_cache(&key, &vec![1, 2, 3], 60).await;
        let retrieved: Option<Vec<i32>> = cache.get_from_cache(&key).await;

        assert_eq!(retrieved, None);
        assert_eq!(cache.delete_by_prefix(&CachePrefix::AllTopContents).await, 0);
    }

    #[tokio::test]
    async fn test_delete_by_prefix_leaves_other_namespaces() {
        let cache = memory_cache();
        let rec = CacheKey::Recommendations {
            user_id: "u1".to_string(),
            limit: 10,
        };
        let history = CacheKey::InteractionHistory {
            user_id: "u1".to_string(),
            limit: 50,
        };

        cache.set_in_cache(&rec, &"r", 60).await;
        cache.set_in_cache(&history, &"h", 60).await;

        let removed = cache.delete_by_prefix(&CachePrefix::AllRecommendations).await;
        assert_eq!(removed, 1);

        assert_eq!(cache.get_from_cache::<String>(&rec).await, None);
        assert_eq!(
            cache.get_from_cache::<String>(&history).await,
            Some("h".to_string())
        );
    }
}
