//! Fixed-cadence driver of fetch, cleanup, and conditional indexing jobs.
//! One tick enumerates active services; a failure scheduling one service is
//! logged and never blocks the others, mirroring the ambient rule isolation
//! the teacher's anomaly runner applies per-rule.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::time::interval;

use xcluster_fetcher::{FetchOutcome, Fetcher};
use xcluster_store::{Service, StoreAdapter};
use xcluster_worker::DedupCache;

use crate::indexing::{IndexingCollaborator, IndexingReason};

#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub tick_interval: Duration,
    pub default_cleanup_interval: Duration,
    pub min_indexing_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(300),
            default_cleanup_interval: Duration::from_secs(7 * 24 * 3600),
            min_indexing_interval: Duration::from_secs(300),
        }
    }
}

/// Per-service bookkeeping the Scheduler needs across ticks that the data
/// model itself has no place for (the Service/LogSource rows only track
/// `last_fetch_at` per source, not a scheduler-local cleanup or indexing
/// clock).
#[derive(Default)]
struct ServiceState {
    last_cleanup_at: Option<DateTime<Utc>>,
    last_indexed_at: Option<DateTime<Utc>>,
    last_indexed_commit: Option<String>,
    indexing_in_flight: bool,
}

pub struct Scheduler {
    config: SchedulerConfig,
    store: Arc<dyn StoreAdapter>,
    fetcher: Arc<Fetcher>,
    dedup: Arc<DedupCache>,
    new_cluster_tracker: Arc<xcluster_worker::NewClusterTracker>,
    indexing: Arc<dyn IndexingCollaborator>,
    state: Mutex<HashMap<String, ServiceState>>,
}

impl Scheduler {
    pub fn new(
        config: SchedulerConfig,
        store: Arc<dyn StoreAdapter>,
        fetcher: Arc<Fetcher>,
        dedup: Arc<DedupCache>,
        new_cluster_tracker: Arc<xcluster_worker::NewClusterTracker>,
        indexing: Arc<dyn IndexingCollaborator>,
    ) -> Self {
        Self { config, store, fetcher, dedup, new_cluster_tracker, indexing, state: Mutex::new(HashMap::new()) }
    }

    /// Run the tick loop forever. Intended to be spawned as its own task.
    pub async fn run(self: Arc<Self>) {
        let mut ticker = interval(self.config.tick_interval);
        tracing::info!(interval_secs = self.config.tick_interval.as_secs(), "scheduler starting");

        loop {
            ticker.tick().await;
            self.tick().await;
        }
    }

    /// One pass over active services. Public so tests and the CLI's
    /// `serve --once` style invocations can drive it without the loop.
    pub async fn tick(&self) {
        let services = match self.store.list_active_services().await {
            Ok(services) => services,
            Err(err) => {
                tracing::error!(error = %err, "scheduler could not list active services, skipping tick");
                return;
            }
        };

        let mut seen: HashSet<String> = HashSet::new();
        for service in services {
            seen.insert(service.id.clone());
            if let Err(err) = self.schedule_service(&service).await {
                tracing::warn!(service_id = %service.id, error = %err, "scheduling failed for service, continuing with others");
            }
        }

        // drop bookkeeping for services no longer active so the map does not
        // grow unboundedly as services are deactivated over time.
        self.state.lock().await.retain(|id, _| seen.contains(id));
    }

    async fn schedule_service(&self, service: &Service) -> Result<(), String> {
        if service.log_processing_enabled {
            self.schedule_fetches(service).await?;
        }
        self.schedule_cleanup_if_due(service).await;
        self.schedule_indexing_if_due(service).await;
        Ok(())
    }

    async fn schedule_fetches(&self, service: &Service) -> Result<(), String> {
        let sources = self.store.list_enabled_sources(&service.id).await.map_err(|e| e.to_string())?;
        let fetch_interval = chrono::Duration::seconds(service.fetch_interval_secs as i64);
        let now = Utc::now();

        for source in sources {
            let due = match source.last_fetch_at {
                Some(last) => now - last >= fetch_interval,
                None => true,
            };
            if !due {
                continue;
            }

            let fetcher = self.fetcher.clone();
            let service = service.clone();
            tokio::spawn(async move {
                match fetcher.fetch_source(&service, &source).await {
                    FetchOutcome::Success { record_count } => {
                        tracing::info!(service_id = %service.id, source_id = %source.id, record_count, "fetch completed");
                    }
                    FetchOutcome::ServiceGated => {}
                    FetchOutcome::Failed { reason } => {
                        tracing::warn!(service_id = %service.id, source_id = %source.id, %reason, "fetch job failed");
                    }
                }
            });
        }
        Ok(())
    }

    async fn schedule_cleanup_if_due(&self, service: &Service) {
        let now = Utc::now();
        let cleanup_interval = if service.cleanup_interval_secs > 0 {
            chrono::Duration::seconds(service.cleanup_interval_secs as i64)
        } else {
            chrono::Duration::from_std(self.config.default_cleanup_interval).unwrap_or(chrono::Duration::zero())
        };

        let mut state = self.state.lock().await;
        let entry = state.entry(service.id.clone()).or_default();

        let due = match entry.last_cleanup_at {
            Some(last) => now - last >= cleanup_interval,
            None => true,
        };
        if !due {
            return;
        }
        entry.last_cleanup_at = Some(now);
        drop(state);

        tracing::info!(service_id = %service.id, "running cleanup job");
        self.dedup.evict_expired();
    }

    async fn schedule_indexing_if_due(&self, service: &Service) {
        if !self.new_cluster_tracker.take(&service.id) {
            return;
        }

        let now = Utc::now();
        let min_interval = chrono::Duration::from_std(self.config.min_indexing_interval).unwrap_or(chrono::Duration::zero());

        let mut state = self.state.lock().await;
        let entry = state.entry(service.id.clone()).or_default();

        if entry.indexing_in_flight {
            return;
        }
        if let Some(last) = entry.last_indexed_at {
            if now - last < min_interval {
                return;
            }
        }

        let last_commit = entry.last_indexed_commit.clone();
        entry.indexing_in_flight = true;
        drop(state);

        let current_commit = self.indexing.current_commit_hash(&service.id).await;
        let should_fire = current_commit.is_some() && current_commit != last_commit;

        if should_fire {
            let commit = current_commit.clone().unwrap_or_default();
            let result = self.indexing.trigger_indexing(&service.id, IndexingReason::ExceptionDetected).await;
            let status = if result.is_ok() { "ok" } else { "error" };
            let error = result.err();

            let _ = self
                .store
                .record_indexing_result(xcluster_store::IndexingResult {
                    service_id: service.id.clone(),
                    commit_hash: commit.clone(),
                    status: status.to_string(),
                    error: error.clone(),
                })
                .await;

            if let Some(error) = &error {
                tracing::warn!(service_id = %service.id, %error, "indexing job failed");
            } else {
                tracing::info!(service_id = %service.id, commit_hash = %commit, "indexing job fired");
            }

            let mut state = self.state.lock().await;
            let entry = state.entry(service.id.clone()).or_default();
            entry.last_indexed_at = Some(now);
            if result.is_ok() {
                entry.last_indexed_commit = current_commit;
            }
            entry.indexing_in_flight = false;
        } else {
            let mut state = self.state.lock().await;
            let entry = state.entry(service.id.clone()).or_default();
            entry.indexing_in_flight = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap as Map;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use xcluster_store::InMemoryStore;
    use xcluster_worker::{NewClusterTracker, WorkQueue};

    struct CountingIndexer {
        commit: Option<String>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl IndexingCollaborator for CountingIndexer {
        async fn current_commit_hash(&self, _service_id: &str) -> Option<String> {
            self.commit.clone()
        }

        async fn trigger_indexing(&self, _service_id: &str, _reason: IndexingReason) -> Result<(), String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn service(id: &str) -> Service {
        Service {
            id: id.to_string(),
            display_name: id.to_string(),
            active: true,
            log_processing_enabled: true,
            fetch_interval_secs: 60,
            cleanup_interval_secs: 3600,
            notification_target: None,
            last_log_fetch: None,
            created_at: Utc::now(),
        }
    }

    fn test_scheduler(indexing: Arc<dyn IndexingCollaborator>) -> (Arc<Scheduler>, Arc<NewClusterTracker>) {
        let store: Arc<dyn StoreAdapter> = Arc::new(InMemoryStore::new());
        let queue = WorkQueue::bounded(8);
        let fetcher = Arc::new(Fetcher::new(store.clone(), queue.handle, Map::new()));
        let dedup = Arc::new(DedupCache::new(600));
        let tracker = Arc::new(NewClusterTracker::new());

        let scheduler = Arc::new(Scheduler::new(
            SchedulerConfig { tick_interval: Duration::from_secs(1), default_cleanup_interval: Duration::from_secs(3600), min_indexing_interval: Duration::from_secs(0) },
            store,
            fetcher,
            dedup,
            tracker.clone(),
            indexing,
        ));
        (scheduler, tracker)
    }

    #[tokio::test]
    async fn indexing_trigger_skips_without_a_new_cluster() {
        let indexer = Arc::new(CountingIndexer { commit: Some("abc".to_string()), calls: AtomicUsize::new(0) });
        let (scheduler, _tracker) = test_scheduler(indexer.clone());

        scheduler.schedule_indexing_if_due(&service("svc")).await;
        assert_eq!(indexer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn indexing_trigger_fires_once_for_unchanged_commit() {
        let indexer = Arc::new(CountingIndexer { commit: Some("abc".to_string()), calls: AtomicUsize::new(0) });
        let (scheduler, tracker) = test_scheduler(indexer.clone());

        tracker.mark("svc");
        scheduler.schedule_indexing_if_due(&service("svc")).await;
        assert_eq!(indexer.calls.load(Ordering::SeqCst), 1);

        // same commit hash, no new cluster this time: must not fire again.
        scheduler.schedule_indexing_if_due(&service("svc")).await;
        assert_eq!(indexer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn tick_continues_past_a_failing_service() {
        let indexer = Arc::new(CountingIndexer { commit: None, calls: AtomicUsize::new(0) });
        let (scheduler, _tracker) = test_scheduler(indexer);

        // no services seeded; tick should complete without panicking.
        scheduler.tick().await;
    }
}
