//! Structured observability events
//!
//! Services describe what happened as [`ServiceEvent`] values handed to an
//! [`EventSink`]; the sink decides whether that means a log line, a counter, or
//! (in tests) a recorded list.

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::services::background::{spawn_periodic, BackgroundTaskHandle};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServiceEvent {
    CacheHit {
        namespace: &'static str,
        key: String,
    },
    CacheMiss {
        namespace: &'static str,
        key: String,
    },
    StoreQuery {
        operation: &'static str,
        rows: usize,
        elapsed_ms: u64,
    },
    /// A result was served without part of its inputs and was not cached
    DegradedResult {
        operation: &'static str,
        user_id: String,
        reason: String,
    },
    CacheCleared {
        prefix: String,
        keys: usize,
    },
    WarmUpFailed {
        user_id: String,
        error: String,
    },
    WarmUpCompleted {
        requested: usize,
        succeeded: usize,
        elapsed_ms: u64,
    },
    EngagementRecomputed {
        rows: u64,
        elapsed_ms: u64,
    },
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: ServiceEvent);
}

/// Cache effectiveness counters
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub total_operations: u64,
    /// Percentage of lookups served from cache, 0 when nothing was looked up yet
    pub hit_rate: f64,
}

/// Default sink: logs every event through `tracing` and counts cache hits and misses
#[derive(Debug)]
pub struct TracingEventSink {
    hits: AtomicU64,
    misses: AtomicU64,
    last_reset: Mutex<Instant>,
}

impl Default for TracingEventSink {
    fn default() -> Self {
        Self {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            last_reset: Mutex::new(Instant::now()),
        }
    }
}

impl TracingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache_metrics(&self) -> CacheMetrics {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        CacheMetrics {
            hits,
            misses,
            total_operations: total,
            hit_rate: if total == 0 {
                0.0
            } else {
                hits as f64 / total as f64 * 100.0
            },
        }
    }

    pub fn reset_cache_metrics(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        *self.last_reset.lock() = Instant::now();
        tracing::info!("Cache metrics reset");
    }

    /// Reports the hit rate against `threshold` (a percentage), then zeroes the
    /// counters once they are older than `reset_after`
    ///
    /// Returns the figures that were checked.
    pub fn check_hit_rate(&self, threshold: f64, reset_after: Duration) -> CacheMetrics {
        let metrics = self.cache_metrics();

        if metrics.total_operations == 0 {
            tracing::debug!("No cache lookups since the last reset");
        } else if metrics.hit_rate < threshold {
            tracing::warn!(
                hit_rate = metrics.hit_rate,
                threshold,
                hits = metrics.hits,
                misses = metrics.misses,
                "Cache hit rate is low"
            );
        } else {
            tracing::info!(hit_rate = metrics.hit_rate, "Cache hit rate is healthy");
        }

        let expired = self.last_reset.lock().elapsed() > reset_after;
        if expired {
            self.reset_cache_metrics();
        }

        metrics
    }

    /// Runs [`check_hit_rate`](Self::check_hit_rate) every `interval`
    pub fn spawn_hit_rate_monitor(
        self: &Arc<Self>,
        interval: Duration,
        threshold: f64,
        reset_after: Duration,
    ) -> BackgroundTaskHandle {
        let sink = Arc::clone(self);
        spawn_periodic("cache-hit-rate-monitor", interval, move || {
            let sink = sink.clone();
            async move {
                sink.check_hit_rate(threshold, reset_after);
            }
        })
    }
}

impl EventSink for TracingEventSink {
    fn emit(&self, event: ServiceEvent) {
        match event {
            ServiceEvent::CacheHit { namespace, key } => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(namespace, key = %key, "Cache hit");
            }
            ServiceEvent::CacheMiss { namespace, key } => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(namespace, key = %key, "Cache miss");
            }
            ServiceEvent::StoreQuery {
                operation,
                rows,
                elapsed_ms,
            } => {
                tracing::info!(operation, rows, elapsed_ms, "Store query completed");
            }
            ServiceEvent::DegradedResult {
                operation,
                user_id,
                reason,
            } => {
                tracing::warn!(operation, user_id = %user_id, reason = %reason, "Serving degraded result");
            }
            ServiceEvent::CacheCleared { prefix, keys } => {
                tracing::info!(prefix = %prefix, keys, "Cleared cache keys");
            }
            ServiceEvent::WarmUpFailed { user_id, error } => {
                tracing::warn!(user_id = %user_id, error = %error, "Failed to warm cache for user");
            }
            ServiceEvent::WarmUpCompleted {
                requested,
                succeeded,
                elapsed_ms,
            } => {
                tracing::info!(requested, succeeded, elapsed_ms, "Cache warm-up complete");
            }
            ServiceEvent::EngagementRecomputed { rows, elapsed_ms } => {
                tracing::info!(rows, elapsed_ms, "Engagement scores recomputed");
            }
        }
    }
}

/// Sink that keeps every event in memory, for assertions
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<ServiceEvent>>,
}

#[cfg(test)]
impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ServiceEvent> {
        self.events.lock().clone()
    }
}

#[cfg(test)]
impl EventSink for RecordingEventSink {
    fn emit(&self, event: ServiceEvent) {
        self.events.lock().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate_from_cache_events() {
        let sink = TracingEventSink::new();
        assert_eq!(sink.cache_metrics().hit_rate, 0.0);

        for _ in 0..3 {
            sink.emit(ServiceEvent::CacheHit {
                namespace: "recommendations",
                key: "k".to_string(),
            });
        }
        sink.emit(ServiceEvent::CacheMiss {
            namespace: "recommendations",
            key: "k".to_string(),
        });

        let metrics = sink.cache_metrics();
        assert_eq!(metrics.hits, 3);
        assert_eq!(metrics.misses, 1);
        assert_eq!(metrics.total_operations, 4);
        assert!((metrics.hit_rate - 75.0).abs() < 1e-9);

        sink.reset_cache_metrics();
        assert_eq!(sink.cache_metrics().total_operations, 0);
    }

    #[test]
    fn test_events_serialize_with_tag() {
        let event = ServiceEvent::CacheCleared {
            prefix: "recommendations:".to_string(),
            keys: 4,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "cache_cleared");
        assert_eq!(json["keys"], 4);
    }

    fn lookups(sink: &TracingEventSink, hits: usize, misses: usize) {
        for _ in 0..hits {
            sink.emit(ServiceEvent::CacheHit {
                namespace: "recommendations",
                key: "k".to_string(),
            });
        }
        for _ in 0..misses {
            sink.emit(ServiceEvent::CacheMiss {
                namespace: "recommendations",
                key: "k".to_string(),
            });
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_hit_rate_keeps_counters_inside_window() {
        let sink = TracingEventSink::new();
        lookups(&sink, 1, 3);

        tokio::time::sleep(Duration::from_secs(3600)).await;
        let checked = sink.check_hit_rate(80.0, Duration::from_secs(86400));

        assert!((checked.hit_rate - 25.0).abs() < 1e-9);
        assert_eq!(sink.cache_metrics().total_operations, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hit_rate_monitor_resets_counters_daily() {
        let sink = Arc::new(TracingEventSink::new());
        lookups(&sink, 9, 1);

        let handle = sink.spawn_hit_rate_monitor(
            Duration::from_secs(3600),
            80.0,
            Duration::from_secs(86400),
        );

        // Ticks at 1h..24h leave the counters alone; 24h is not past the window yet
        tokio::time::sleep(Duration::from_secs(24 * 3600 + 60)).await;
        assert_eq!(sink.cache_metrics().total_operations, 10);

        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(sink.cache_metrics().total_operations, 0);

        lookups(&sink, 1, 0);
        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(sink.cache_metrics().total_operations, 1);

        handle.shutdown().await;
    }
}
