use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::{
    db::Cache,
    error::AppResult,
    services::{
        background::{spawn_periodic, BackgroundTaskHandle},
        events::{EventSink, ServiceEvent},
        guarded::GuardedDataAccess,
        recommendations::{clear_prefixes, RECOMMENDATION_PREFIXES},
        scoring::EngagementFormula,
    },
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngagementUpdateReport {
    pub rows_updated: u64,
    pub cache_keys_cleared: usize,
    pub elapsed_ms: u64,
}

/// Recomputes every content item's engagement score with one bulk statement
pub struct EngagementUpdater {
    cache: Cache,
    guarded: Arc<GuardedDataAccess>,
    events: Arc<dyn EventSink>,
    formula: EngagementFormula,
}

impl EngagementUpdater {
    pub fn new(
        cache: Cache,
        guarded: Arc<GuardedDataAccess>,
        events: Arc<dyn EventSink>,
        formula: EngagementFormula,
    ) -> Self {
        Self {
            cache,
            guarded,
            events,
            formula,
        }
    }

    pub fn formula(&self) -> EngagementFormula {
        self.formula
    }

    /// Issues the single guarded bulk update, then invalidates every
    /// recommendation and content cache entry
    ///
    /// No fallback: a skipped recompute must surface to whoever triggered it.
    pub async fn update_content_engagement_scores(&self) -> AppResult<EngagementUpdateReport> {
        self.formula.validate()?;

        let start = Instant::now();
        let formula = self.formula;
        let rows_updated = self
            .guarded
            .execute("engagement-recompute", None, |store| async move {
                store.recompute_engagement_scores(&formula).await
            })
            .await?;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        self.events.emit(ServiceEvent::EngagementRecomputed {
            rows: rows_updated,
            elapsed_ms,
        });

        let cache_keys_cleared =
            clear_prefixes(&self.cache, self.events.as_ref(), &RECOMMENDATION_PREFIXES).await;

        Ok(EngagementUpdateReport {
            rows_updated,
            cache_keys_cleared,
            elapsed_ms,
        })
    }

    /// Runs the recompute every `interval`
    ///
    /// A failed run is logged at ERROR; the next attempt happens on the next tick.
    pub fn spawn_schedule(self: &Arc<Self>, interval: Duration) -> BackgroundTaskHandle {
        let updater = Arc::clone(self);
        spawn_periodic("engagement-recompute", interval, move || {
            let updater = updater.clone();
            async move {
                if let Err(e) = updater.update_content_engagement_scores().await {
                    tracing::error!(error = %e, "Scheduled engagement recompute failed");
                }
            }
        })
    }
}
