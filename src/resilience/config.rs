use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Thresholds for one circuit breaker instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures in the closed state that open the circuit
    pub failure_threshold: u32,
    /// Successes in the half-open state that close the circuit
    pub success_threshold: u32,
    /// Time an open circuit waits after its last failure before admitting a probe
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            reset_timeout: Duration::from_secs(60),
        }
    }
}
