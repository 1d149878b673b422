use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Shortest period a task ticks at; `tokio::time::interval` rejects zero
const MIN_PERIOD: Duration = Duration::from_secs(1);

/// Handle for stopping a periodic background task
pub struct BackgroundTaskHandle {
    name: &'static str,
    shutdown_tx: mpsc::Sender<()>,
    join: JoinHandle<()>,
}

impl BackgroundTaskHandle {
    /// Signals the task to stop and waits for the current tick to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Err(e) = self.join.await {
            tracing::error!(task = self.name, error = %e, "Background task panicked");
        }
        tracing::info!(task = self.name, "Background task stopped");
    }
}

/// Runs `tick` every `period`, first after one full period, until shut down
///
/// A tick in progress is never interrupted; shutdown takes effect between ticks.
pub fn spawn_periodic<F, Fut>(name: &'static str, period: Duration, tick: F) -> BackgroundTaskHandle
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let period = if period.is_zero() {
        tracing::warn!(task = name, "Zero period requested, ticking every second instead");
        MIN_PERIOD
    } else {
        period
    };
    let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);

    let join = tokio::spawn(async move {
        tracing::info!(task = name, period_secs = period.as_secs(), "Background task started");
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => tick().await,
                _ = shutdown_rx.recv() => break,
            }
        }
    });

    BackgroundTaskHandle {
        name,
        shutdown_tx,
        join,
    }
}
