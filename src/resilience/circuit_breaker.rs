//! # Circuit Breaker
//!
//! Three states: Closed (calls pass through), Open (calls fail fast) and
//! Half-Open (calls are admitted to test recovery).
//!
//! ```text
//! Closed   -> Open:      failure_count >= failure_threshold
//! Open     -> HalfOpen:  now - last_failure > reset_timeout (checked on the next call)
//! HalfOpen -> Closed:    success_count >= success_threshold
//! HalfOpen -> Open:      any failure
//! ```
//!
//! State and counters live behind one mutex so that every transition is decided
//! against the counters it reads. The lock is never held across the protected
//! operation itself.

use crate::resilience::CircuitBreakerConfig;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Circuit breaker states representing the current operational mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Normal operation - all calls are allowed through
    Closed,
    /// Failure mode - all calls fail fast without executing
    Open,
    /// Testing recovery - calls are admitted and their outcome decides the next state
    HalfOpen,
}

/// Errors returned by [`CircuitBreaker::call`]
#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    /// Circuit is open, the operation was not executed
    #[error("Circuit breaker is open for {component}")]
    CircuitOpen { component: String },

    /// Operation ran and failed; the failure was recorded
    #[error("Operation failed: {0}")]
    OperationFailed(E),
}

/// Monotonic counters for external reporting. Never used for transitions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerMetrics {
    pub total_requests: u64,
    pub total_failures: u64,
    pub total_successes: u64,
    /// Calls rejected without running because the circuit was open
    pub total_rejected: u64,
}

/// Point-in-time view of a breaker, returned by [`CircuitBreaker::snapshot`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerSnapshot {
    pub component: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub last_failure_at: Option<DateTime<Utc>>,
    /// When an open circuit will admit its next call
    pub next_retry_at: Option<DateTime<Utc>>,
    pub metrics: CircuitBreakerMetrics,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    /// Monotonic clock reading used for the cool-down check
    last_failure: Option<Instant>,
    /// Wall-clock twin of `last_failure`, for reporting only
    last_failure_at: Option<DateTime<Utc>>,
    metrics: CircuitBreakerMetrics,
}

impl BreakerInner {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            last_failure: None,
            last_failure_at: None,
            metrics: CircuitBreakerMetrics::default(),
        }
    }

    fn mark_failure_time(&mut self) {
        self.last_failure = Some(Instant::now());
        self.last_failure_at = Some(Utc::now());
    }
}

/// Circuit breaker guarding one logical resource
#[derive(Debug)]
pub struct CircuitBreaker {
    /// Component name for logging and error messages
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker in the closed state
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let name = name.into();
        info!(
            component = %name,
            failure_threshold = config.failure_threshold,
            success_threshold = config.success_threshold,
            reset_timeout_secs = config.reset_timeout.as_secs(),
            "Circuit breaker initialized"
        );

        Self {
            name,
            config,
            inner: Mutex::new(BreakerInner::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Current state, without applying the open -> half-open cool-down check
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Execute an operation with circuit breaker protection
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.admit() {
            return Err(CircuitBreakerError::CircuitOpen {
                component: self.name.clone(),
            });
        }

        let start = Instant::now();
        let result = operation().await;
        let duration = start.elapsed();

        match &result {
            Ok(_) => self.record_success(duration),
            Err(_) => self.record_failure(duration),
        }

        result.map_err(CircuitBreakerError::OperationFailed)
    }

    /// Counts the request and decides whether it may run
    fn admit(&self) -> bool {
        let mut inner = self.inner.lock();
        inner.metrics.total_requests += 1;

        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let cooled_down = inner
                    .last_failure
                    .map(|at| at.elapsed() > self.config.reset_timeout)
                    .unwrap_or(true);

                if cooled_down {
                    self.transition_to_half_open(&mut inner);
                    true
                } else {
                    inner.metrics.total_rejected += 1;
                    debug!(component = %self.name, "Circuit open, rejecting call");
                    false
                }
            }
        }
    }

    fn record_success(&self, duration: Duration) {
        let mut inner = self.inner.lock();
        inner.metrics.total_successes += 1;

        debug!(
            component = %self.name,
            duration_ms = duration.as_millis() as u64,
            "Operation succeeded"
        );

        match inner.state {
            CircuitState::Closed => {
                inner.failure_count = 0;
            }
            CircuitState::HalfOpen => {
                inner.failure_count = 0;
                inner.success_count += 1;
                if inner.success_count >= self.config.success_threshold {
                    self.transition_to_closed(&mut inner);
                }
            }
            CircuitState::Open => {
                // Admitted before the circuit opened; the open period stands.
                debug!(component = %self.name, "Late success recorded while circuit is open");
            }
        }
    }

    fn record_failure(&self, duration: Duration) {
        let mut inner = self.inner.lock();
        inner.metrics.total_failures += 1;

        match inner.state {
            CircuitState::Closed => {
                inner.failure_count += 1;
                inner.mark_failure_time();
                warn!(
                    component = %self.name,
                    duration_ms = duration.as_millis() as u64,
                    failure_count = inner.failure_count,
                    failure_threshold = self.config.failure_threshold,
                    "Operation failed"
                );
                if inner.failure_count >= self.config.failure_threshold {
                    self.transition_to_open(&mut inner);
                }
            }
            CircuitState::HalfOpen => {
                inner.mark_failure_time();
                inner.failure_count = 0;
                inner.success_count = 0;
                inner.state = CircuitState::Open;
                error!(
                    component = %self.name,
                    duration_ms = duration.as_millis() as u64,
                    "Circuit breaker re-opened (recovery failed)"
                );
            }
            CircuitState::Open => {
                // A call admitted before the circuit opened failed late; restart the cool-down.
                inner.mark_failure_time();
            }
        }
    }

    fn transition_to_open(&self, inner: &mut BreakerInner) {
        inner.state = CircuitState::Open;
        error!(
            component = %self.name,
            failure_count = inner.failure_count,
            reset_timeout_secs = self.config.reset_timeout.as_secs(),
            "Circuit breaker opened (failing fast)"
        );
    }

    fn transition_to_half_open(&self, inner: &mut BreakerInner) {
        inner.state = CircuitState::HalfOpen;
        inner.failure_count = 0;
        inner.success_count = 0;
        info!(
            component = %self.name,
            success_threshold = self.config.success_threshold,
            "Circuit breaker half-open (testing recovery)"
        );
    }

    fn transition_to_closed(&self, inner: &mut BreakerInner) {
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
        inner.success_count = 0;
        info!(
            component = %self.name,
            total_requests = inner.metrics.total_requests,
            "Circuit breaker closed (recovered)"
        );
    }

    /// Manual return to the closed state for operator intervention
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
        inner.success_count = 0;
        warn!(component = %self.name, "Circuit breaker manually reset");
    }

    pub fn snapshot(&self) -> CircuitBreakerSnapshot {
        let inner = self.inner.lock();

        let next_retry_at = match (inner.state, inner.last_failure_at) {
            (CircuitState::Open, Some(at)) => chrono::Duration::from_std(self.config.reset_timeout)
                .ok()
                .map(|timeout| at + timeout),
            _ => None,
        };

        CircuitBreakerSnapshot {
            component: self.name.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
            last_failure_at: inner.last_failure_at,
            next_retry_at,
            metrics: inner.metrics.clone(),
        }
    }
}
