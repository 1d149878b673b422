use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::{
    db::{ContentStore, PoolStats},
    error::{AppError, AppResult},
    resilience::{
        CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitBreakerSnapshot,
        CircuitState,
    },
    services::background::{spawn_periodic, BackgroundTaskHandle},
};

/// Name of the logical resource the breaker protects
pub const DATABASE_RESOURCE: &str = "database";

/// Failure count above which the health report flags connectivity
const FAILURE_WARNING_COUNT: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Recovering,
    Unhealthy,
}

impl From<CircuitState> for HealthState {
    fn from(state: CircuitState) -> Self {
        match state {
            CircuitState::Closed => HealthState::Healthy,
            CircuitState::HalfOpen => HealthState::Recovering,
            CircuitState::Open => HealthState::Unhealthy,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolMetrics {
    pub size: u32,
    pub idle: u32,
    /// Guarded calls currently running or waiting on the store
    pub in_flight: usize,
    pub total_checks: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: HealthState,
    pub circuit_breaker: CircuitBreakerSnapshot,
    pub pool: PoolMetrics,
    /// Human-readable operator guidance derived from the figures above
    pub recommendations: Vec<String>,
}

/// Decrements the in-flight counter when a guarded call ends, cancelled or not
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Routes every store call through one circuit breaker
///
/// The breaker is built here, once, from configuration and lives as long as this
/// value; everything that talks to the store shares this through an `Arc`.
pub struct GuardedDataAccess {
    store: Arc<dyn ContentStore>,
    breaker: CircuitBreaker,
    in_flight: AtomicUsize,
    total_checks: AtomicU64,
    queue_alert_threshold: usize,
}

impl GuardedDataAccess {
    pub fn new(
        store: Arc<dyn ContentStore>,
        breaker_config: CircuitBreakerConfig,
        queue_alert_threshold: usize,
    ) -> Self {
        Self {
            store,
            breaker: CircuitBreaker::new(DATABASE_RESOURCE, breaker_config),
            in_flight: AtomicUsize::new(0),
            total_checks: AtomicU64::new(0),
            queue_alert_threshold,
        }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Runs `operation` against the store under the circuit breaker
    ///
    /// On success the operation's value is returned. When the operation fails, or
    /// the circuit is open and the store is never touched, `fallback` is returned if
    /// given; otherwise the store error or [`AppError::CircuitOpen`] propagates.
    pub async fn execute<T, F, Fut>(
        &self,
        operation_name: &str,
        fallback: Option<T>,
        operation: F,
    ) -> AppResult<T>
    where
        F: FnOnce(Arc<dyn ContentStore>) -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let store = self.store.clone();
        let _in_flight = InFlight::enter(&self.in_flight);

        match self.breaker.call(|| operation(store)).await {
            Ok(value) => Ok(value),
            Err(CircuitBreakerError::CircuitOpen { component }) => match fallback {
                Some(value) => {
                    tracing::warn!(
                        operation = operation_name,
                        "Circuit breaker open, using fallback"
                    );
                    Ok(value)
                }
                None => Err(AppError::CircuitOpen { component }),
            },
            Err(CircuitBreakerError::OperationFailed(e)) => match fallback {
                Some(value) => {
                    tracing::warn!(
                        operation = operation_name,
                        error = %e,
                        "Operation failed, using fallback"
                    );
                    Ok(value)
                }
                None => Err(e),
            },
        }
    }

    /// One store probe through the guarded path
    pub async fn check_health(&self) -> AppResult<()> {
        self.total_checks.fetch_add(1, Ordering::Relaxed);

        let result = self
            .execute("pool-health-check", None, |store| async move {
                store.ping().await
            })
            .await;

        match &result {
            Ok(()) if self.breaker.state() == CircuitState::HalfOpen => {
                tracing::info!("Store health check passed while recovering");
            }
            Ok(()) => {}
            Err(e) => tracing::error!(error = %e, "Store health check failed"),
        }
        result
    }

    /// Starts the periodic health probe
    ///
    /// Probes only help the breaker notice recovery sooner; their failures are
    /// logged and never escalated.
    pub fn spawn_health_check(self: &Arc<Self>, interval: Duration) -> BackgroundTaskHandle {
        let guarded = Arc::clone(self);
        spawn_periodic("store-health-check", interval, move || {
            let guarded = guarded.clone();
            async move {
                let _ = guarded.check_health().await;
            }
        })
    }

    pub fn health_status(&self) -> HealthStatus {
        let snapshot = self.breaker.snapshot();
        let PoolStats { size, idle } = self.store.pool_stats();
        let pool = PoolMetrics {
            size,
            idle,
            in_flight: self.in_flight.load(Ordering::Relaxed),
            total_checks: self.total_checks.load(Ordering::Relaxed),
        };

        let recommendations = operational_recommendations(&snapshot, &pool, self.queue_alert_threshold);

        HealthStatus {
            status: HealthState::from(snapshot.state),
            circuit_breaker: snapshot,
            pool,
            recommendations,
        }
    }

    /// Operator override: close the breaker regardless of its state
    pub fn reset_circuit_breaker(&self) -> CircuitBreakerSnapshot {
        self.breaker.reset();
        tracing::info!("Store circuit breaker reset by operator");
        self.breaker.snapshot()
    }
}

fn operational_recommendations(
    snapshot: &CircuitBreakerSnapshot,
    pool: &PoolMetrics,
    queue_alert_threshold: usize,
) -> Vec<String> {
    let mut recommendations = Vec::new();

    match snapshot.state {
        CircuitState::Open => {
            recommendations.push("Database connection pool is failing".to_string());
            recommendations.push(
                "Suggest: check database health, restart the service if necessary".to_string(),
            );
        }
        CircuitState::HalfOpen => {
            recommendations.push("Database connection pool is recovering".to_string());
            recommendations.push("Suggest: monitor closely, avoid heavy operations".to_string());
        }
        CircuitState::Closed => {}
    }

    if snapshot.failure_count > FAILURE_WARNING_COUNT {
        recommendations.push(format!(
            "{} connection failures detected",
            snapshot.failure_count
        ));
        recommendations.push(
            "Suggest: check network connectivity and database resource usage".to_string(),
        );
    }

    if pool.in_flight > queue_alert_threshold {
        recommendations.push(format!(
            "Connection pool queue is backing up ({} calls in flight)",
            pool.in_flight
        ));
        recommendations
            .push("Suggest: increase pool size or optimize slow queries".to_string());
    }

    recommendations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::store::MockContentStore;
    use crate::models::ContentItem;
    use tokio_test::assert_ok;

    fn config(failure_threshold: u32) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold,
            success_threshold: 2,
            reset_timeout: Duration::from_secs(60),
        }
    }

    fn guarded(store: MockContentStore, failure_threshold: u32) -> GuardedDataAccess {
        GuardedDataAccess::new(Arc::new(store), config(failure_threshold), 5)
    }

    fn db_down() -> AppError {
        AppError::Internal("connection refused".to_string())
    }

    async fn ranked(guarded: &GuardedDataAccess, fallback: Option<Vec<ContentItem>>) -> AppResult<Vec<ContentItem>> {
        guarded
            .execute("ranked-contents", fallback, |store| async move {
                store.fetch_ranked_contents(10).await
            })
            .await
    }

    #[tokio::test]
    async fn test_success_passes_value_through() {
        let mut store = MockContentStore::new();
        store
            .expect_fetch_ranked_contents()
            .times(1)
            .returning(|_| Ok(vec![]));

        let guarded = guarded(store, 5);
        let contents = assert_ok!(ranked(&guarded, None).await);
        assert!(contents.is_empty());
    }

    #[tokio::test]
    async fn test_failure_without_fallback_propagates() {
        let mut store = MockContentStore::new();
        store
            .expect_fetch_ranked_contents()
            .times(1)
            .returning(|_| Err(db_down()));

        let guarded = guarded(store, 5);
        let err = ranked(&guarded, None).await.unwrap_err();

        assert!(matches!(err, AppError::Internal(_)));
        assert_eq!(guarded.breaker().snapshot().failure_count, 1);
    }

    #[tokio::test]
    async fn test_failure_with_fallback_returns_fallback_and_counts() {
        let mut store = MockContentStore::new();
        store
            .expect_fetch_ranked_contents()
            .times(1)
            .returning(|_| Err(db_down()));

        let guarded = guarded(store, 5);
        let contents = assert_ok!(ranked(&guarded, Some(vec![])).await);

        assert!(contents.is_empty());
        assert_eq!(guarded.breaker().snapshot().metrics.total_failures, 1);
    }

    #[tokio::test]
    async fn test_open_circuit_returns_fallback_without_store_call() {
        let mut store = MockContentStore::new();
        // Only the call that trips the breaker reaches the store
        store
            .expect_fetch_ranked_contents()
            .times(1)
            .returning(|_| Err(db_down()));

        let guarded = guarded(store, 1);
        let _ = ranked(&guarded, None).await;
        assert_eq!(guarded.breaker().state(), CircuitState::Open);

        let contents = assert_ok!(ranked(&guarded, Some(vec![])).await);
        assert_eq!(contents, vec![]);

        let err = ranked(&guarded, None).await.unwrap_err();
        assert!(err.is_circuit_open());
    }

    #[tokio::test]
    async fn test_health_status_tracks_breaker_state() {
        let mut store = MockContentStore::new();
        store.expect_ping().returning(|| Err(db_down()));
        store
            .expect_pool_stats()
            .returning(|| PoolStats { size: 5, idle: 2 });

        let guarded = guarded(store, 3);

        let status = guarded.health_status();
        assert_eq!(status.status, HealthState::Healthy);
        assert!(status.recommendations.is_empty());

        for _ in 0..3 {
            assert!(guarded.check_health().await.is_err());
        }

        let status = guarded.health_status();
        assert_eq!(status.status, HealthState::Unhealthy);
        assert_eq!(status.pool.total_checks, 3);
        assert_eq!(status.pool.size, 5);
        assert!(status.circuit_breaker.next_retry_at.is_some());
        assert!(status
            .recommendations
            .iter()
            .any(|r| r.contains("failing")));
        assert!(status
            .recommendations
            .iter()
            .any(|r| r.contains("3 connection failures")));

        let snapshot = guarded.reset_circuit_breaker();
        assert_eq!(snapshot.state, CircuitState::Closed);
        assert_eq!(guarded.health_status().status, HealthState::Healthy);
    }

    #[test]
    fn test_queue_backlog_recommendation() {
        let snapshot = CircuitBreaker::new("db", config(5)).snapshot();
        let pool = PoolMetrics {
            size: 5,
            idle: 0,
            in_flight: 9,
            total_checks: 0,
        };

        let recommendations = operational_recommendations(&snapshot, &pool, 5);
        assert_eq!(recommendations.len(), 2);
        assert!(recommendations[0].contains("backing up"));
    }
}
