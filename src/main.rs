use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use recommendation_service::{
    config::CacheBackendKind,
    create_router,
    db::{create_pool, create_redis_client, CacheBackend, MemoryCache, PgContentStore, RedisCache},
    AppState, Config,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    let pool = create_pool(&config.database_url, config.db_max_connections).await?;
    let store = PgContentStore::new(pool);
    store.migrate().await?;

    let cache_backend: Arc<dyn CacheBackend> = match config.cache_backend {
        CacheBackendKind::Redis => {
            let client = create_redis_client(&config.redis_url)?;
            Arc::new(RedisCache::connect(client).await?)
        }
        CacheBackendKind::Memory => Arc::new(MemoryCache::new()),
    };
    tracing::info!(backend = cache_backend.name(), "Cache backend ready");

    let state = Arc::new(AppState::new(Arc::new(store), cache_backend, &config));

    let health_task = state
        .guarded
        .spawn_health_check(config.health_check_interval());
    let engagement_task = config
        .engagement_refresh_interval()
        .map(|interval| state.engagement.spawn_schedule(interval));
    let cache_monitor_task = config.cache_monitor_interval().map(|interval| {
        state.metrics.spawn_hit_rate_monitor(
            interval,
            config.cache_hit_rate_threshold,
            config.cache_metrics_reset_after(),
        )
    });

    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server running on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await?;

    health_task.shutdown().await;
    for task in [engagement_task, cache_monitor_task].into_iter().flatten() {
        task.shutdown().await;
    }

    Ok(())
}
