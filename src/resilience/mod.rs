//! # Resilience
//!
//! Fault isolation for the relational store. A single [`CircuitBreaker`] guards one
//! logical resource ("database") and is shared by every caller through an `Arc`;
//! it is built once at startup from [`CircuitBreakerConfig`].
//!
//! ```rust,no_run
//! use recommendation_service::resilience::{CircuitBreaker, CircuitBreakerConfig};
//!
//! # async fn example() {
//! let breaker = CircuitBreaker::new("database", CircuitBreakerConfig::default());
//! let rows = breaker.call(|| async { Ok::<_, String>(vec![1, 2, 3]) }).await;
//! # let _ = rows;
//! # }
//! ```

pub mod circuit_breaker;
pub mod config;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerError, CircuitBreakerMetrics, CircuitBreakerSnapshot,
    CircuitState,
};
pub use config::CircuitBreakerConfig;
