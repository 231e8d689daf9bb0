mod config;
mod error;
mod handlers;
mod middleware;
mod state;

use std::sync::Arc;

use axum::{middleware as axum_mw, routing::{get, post}, Router};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use xcluster_cluster::Clusterer;
use xcluster_fetcher::{default_adapters, Fetcher};
use xcluster_scheduler::{NoopIndexingCollaborator, Scheduler, SchedulerConfig};
use xcluster_store::{InMemoryStore, PgStore, StoreAdapter};
use xcluster_worker::{DedupCache, NewClusterTracker, RateLimiter, TracingSignals, WorkerPool, WorkerPoolConfig, WorkQueue};

use config::Config;
use handlers::*;
use middleware::require_bearer_token;
use state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;
    info!(port = config.port, "starting xcluster ingest core");

    let store: Arc<dyn StoreAdapter> = if config.store_url == "memory" {
        info!("using in-memory store (XC_STORE_URL=memory); not for production use");
        Arc::new(InMemoryStore::new())
    } else {
        let pg = PgStore::connect(&config.store_url, config.store_max_conns).await?;
        pg.run_migrations().await?;
        Arc::new(pg)
    };

    let dedup = Arc::new(DedupCache::new(config.dedup_window_secs));
    let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit_capacity, config.rate_limit_refill_per_min));
    let new_cluster_tracker = Arc::new(NewClusterTracker::new());
    let clusterer = Arc::new(Clusterer::new(store.clone()));

    let work_queue = WorkQueue::bounded(config.worker_queue_capacity);
    let queue_handle = work_queue.handle.clone();

    let pool = Arc::new(WorkerPool::new(
        WorkerPoolConfig {
            pool_size: config.worker_pool_size,
            record_deadline: config.worker_record_deadline,
            shutdown_grace: std::time::Duration::from_secs(30),
        },
        dedup.clone(),
        clusterer,
        Arc::new(TracingSignals),
        new_cluster_tracker.clone(),
    ));
    let pool_handle = pool.clone().spawn(work_queue.receiver);

    let adapters = default_adapters().await;
    let fetcher = Arc::new(Fetcher::new(store.clone(), queue_handle.clone(), adapters));

    let scheduler = Arc::new(Scheduler::new(
        SchedulerConfig {
            tick_interval: config.scheduler_tick_interval,
            default_cleanup_interval: std::time::Duration::from_secs(7 * 24 * 3600),
            min_indexing_interval: config.scheduler_indexing_min_interval,
        },
        store.clone(),
        fetcher,
        dedup.clone(),
        new_cluster_tracker,
        Arc::new(NoopIndexingCollaborator),
    ));
    tokio::spawn(scheduler.run());

    let config = Arc::new(config);
    let state = Arc::new(AppState {
        store,
        rate_limiter,
        dedup,
        queue: queue_handle,
        pool,
        config: config.clone(),
    });

    let ingest_routes = Router::new()
        .route("/ingest/logs", post(ingest_batch))
        .route("/ingest/logs/single", post(ingest_single))
        .layer(axum_mw::from_fn_with_state(state.clone(), require_bearer_token));

    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    let app = Router::new()
        .route("/ingest/health", get(health))
        .route("/ingest/metrics", get(metrics))
        .merge(ingest_routes)
        .route("/clusters", get(list_clusters))
        .route("/clusters/{id}", get(get_cluster))
        .route("/clusters/{id}/status", post(set_cluster_status))
        .layer(cors)
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received, draining worker pool");
        })
        .await?;

    pool_handle.shutdown().await;
    Ok(())
}
