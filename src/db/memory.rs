use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::db::cache::CacheBackend;
use crate::error::AppResult;

/// Writes between two full sweeps of expired entries
const SWEEP_EVERY_WRITES: u64 = 256;

/// In-process cache backend with lazy expiry
///
/// Stands in for Redis when the service runs as a single process
/// (`CACHE_BACKEND=memory`) and in tests. Expired entries are dropped when read,
/// when a prefix scan finds them, and by a full sweep every few hundred writes.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, (String, Instant)>>,
    writes: AtomicU64,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .values()
            .filter(|(_, expires_at)| *expires_at > now)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, (_, expires_at)| *expires_at > now);
        let removed = before - entries.len();
        if removed > 0 {
            tracing::debug!(removed, "Purged expired in-memory cache entries");
        }
        removed
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let now = Instant::now();
        {
            let entries = self.entries.read();
            match entries.get(key) {
                Some((value, expires_at)) if *expires_at > now => return Ok(Some(value.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }

        // Expired: drop it unless a writer replaced it in the meantime
        let mut entries = self.entries.write();
        if matches!(entries.get(key), Some((_, expires_at)) if *expires_at <= now) {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: String, ttl_secs: u64) -> AppResult<()> {
        let expires_at = Instant::now() + Duration::from_secs(ttl_secs);
        self.entries
            .write()
            .insert(key.to_string(), (value, expires_at));

        if self.writes.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY_WRITES == SWEEP_EVERY_WRITES - 1 {
            self.purge_expired();
        }
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> AppResult<()> {
        let mut entries = self.entries.write();
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }

    /// Expired keys are included so that a delete by prefix reclaims them too
    async fn scan_prefix(&self, prefix: &str) -> AppResult<Vec<String>> {
        Ok(self
            .entries
            .read()
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
