use std::sync::Arc;

use xcluster_store::StoreAdapter;
use xcluster_worker::{DedupCache, QueueHandle, RateLimiter, WorkerPool};

use crate::config::Config;

pub struct AppState {
    pub store: Arc<dyn StoreAdapter>,
    pub rate_limiter: Arc<RateLimiter>,
    pub dedup: Arc<DedupCache>,
    pub queue: QueueHandle,
    pub pool: Arc<WorkerPool>,
    pub config: Arc<Config>,
}
