pub mod background;
pub mod engagement;
pub mod events;
pub mod guarded;
pub mod recommendations;
pub mod scoring;

pub use engagement::{EngagementUpdateReport, EngagementUpdater};
pub use events::{CacheMetrics, EventSink, ServiceEvent, TracingEventSink};
pub use guarded::{GuardedDataAccess, HealthState, HealthStatus};
pub use recommendations::{RecommendationService, WarmUpReport};
