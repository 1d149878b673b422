//! Recommendation caching and resilience service.
//!
//! Ranks content for a user from engagement and tag interest, caches results in
//! several tiers, guards the relational store behind a circuit breaker, and
//! recomputes engagement scores in bulk.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod resilience;
pub mod routes;
pub mod services;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use routes::{create_router, AppState};
