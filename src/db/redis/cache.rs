use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

use crate::db::cache::CacheBackend;
use crate::error::AppResult;

/// Creates a Redis client for caching
pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    let client = Client::open(redis_url)?;
    Ok(client)
}

/// Escapes glob metacharacters so a key prefix matches literally in `SCAN MATCH`
fn escape_glob(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('*');
    escaped
}

/// Shared Redis cache backend
///
/// Holds a [`ConnectionManager`], which multiplexes commands over one connection
/// and reconnects on its own after the server goes away.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    pub async fn connect(client: Client) -> AppResult<Self> {
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl CacheBackend for RedisCache {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let mut conn = self.conn.clone();
        let cached: Option<String> = conn.get(key).await?;
        Ok(cached)
    }

    async fn set(&self, key: &str, value: String, ttl_secs: u64) -> AppResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(key, value, ttl_secs.max(1)).await?;
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> AppResult<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let _: () = conn.del(keys.to_vec()).await?;
        Ok(())
    }

    /// Walks the keyspace with `SCAN` rather than `KEYS` so large keyspaces never block Redis
    async fn scan_prefix(&self, prefix: &str) -> AppResult<Vec<String>> {
        let mut conn = self.conn.clone();
        let mut iter = conn.scan_match::<_, String>(escape_glob(prefix)).await?;

        let mut keys = Vec::new();
        while let Some(key) = iter.next_item().await {
            keys.push(key);
        }
        Ok(keys)
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_glob_plain_prefix() {
        assert_eq!(escape_glob("recommendations:"), "recommendations:*");
    }

    #[test]
    fn test_escape_glob_metacharacters() {
        assert_eq!(
            escape_glob("recommendations:a*b?[c]:"),
            "recommendations:a\\*b\\?\\[c\\]:*"
        );
    }

    #[tokio::test]
    #[ignore = "requires a running Redis at REDIS_URL"]
    async fn test_redis_round_trip_and_scan() {
        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());

        let client = create_redis_client(&redis_url).unwrap();
        let cache = RedisCache::connect(client).await.unwrap();

        cache
            .set("rec:test:round_trip", "value".to_string(), 60)
            .await
            .unwrap();
        assert_eq!(
            cache.get("rec:test:round_trip").await.unwrap(),
            Some("value".to_string())
        );

        let keys = cache.scan_prefix("rec:test:").await.unwrap();
        assert!(keys.contains(&"rec:test:round_trip".to_string()));

        cache.delete(&keys).await.unwrap();
        assert_eq!(cache.get("rec:test:round_trip").await.unwrap(), None);
    }
}
