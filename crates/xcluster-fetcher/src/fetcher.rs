//! Pull Fetcher - for each `LogSource` the Scheduler decides is due, compute
//! the fetch window, invoke the type-specific adapter, normalize the result
//! into `NormalizedLog` shape, and enqueue it to the worker pool exactly as
//! if it had been pushed through Ingress.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use xcluster_core::NormalizedLog;
use xcluster_store::{LogSource, Service, SourceType, StoreAdapter};
use xcluster_worker::{EnqueueError, QueueHandle, QueuedRecord, WorkItem};

use crate::adapter::{FetchWindow, SourceAdapter};

const MAX_WINDOW_HOURS: i64 = 24;
const ENQUEUE_TIMEOUT: Duration = Duration::from_secs(2);

pub enum FetchOutcome {
    /// Skipped because the owning service has log processing disabled.
    ServiceGated,
    /// Fetched successfully; `last_fetch_at` advanced.
    Success { record_count: usize },
    /// The adapter or enqueue step failed; `last_fetch_at` left unchanged so
    /// the next run re-reads the same window.
    Failed { reason: String },
}

pub struct Fetcher {
    store: Arc<dyn StoreAdapter>,
    queue: QueueHandle,
    adapters: HashMap<SourceType, Arc<dyn SourceAdapter>>,
}

impl Fetcher {
    pub fn new(store: Arc<dyn StoreAdapter>, queue: QueueHandle, adapters: HashMap<SourceType, Arc<dyn SourceAdapter>>) -> Self {
        Self { store, queue, adapters }
    }

    /// Drive one `(service, source)` firing. The Scheduler is responsible
    /// for deciding a source is due; this call always attempts the fetch.
    pub async fn fetch_source(&self, service: &Service, source: &LogSource) -> FetchOutcome {
        if !service.log_processing_enabled {
            tracing::info!(service_id = %service.id, source_id = %source.id, "log processing disabled, skipping fetch");
            return FetchOutcome::ServiceGated;
        }

        let Some(adapter) = self.adapters.get(&source.source_type) else {
            let reason = format!("no adapter registered for source type {:?}", source.source_type);
            tracing::warn!(service_id = %service.id, source_id = %source.id, %reason, "fetch failed");
            let _ = self.store.set_source_connection_status(source.id, &reason).await;
            return FetchOutcome::Failed { reason };
        };

        let now = Utc::now();
        let window_start = source.last_fetch_at.unwrap_or(now - chrono::Duration::hours(MAX_WINDOW_HOURS));
        let floor = now - chrono::Duration::hours(MAX_WINDOW_HOURS);
        let window = FetchWindow { start: window_start.max(floor), end: now };

        let raw_entries = match adapter.fetch(source, window).await {
            Ok(entries) => entries,
            Err(err) => {
                let reason = err.to_string();
                tracing::warn!(service_id = %service.id, source_id = %source.id, error = %reason, "fetch failed, last_fetch_at unchanged");
                let _ = self.store.set_source_connection_status(source.id, &reason).await;
                return FetchOutcome::Failed { reason };
            }
        };

        let record_count = raw_entries.len();
        if record_count > 0 {
            let records = raw_entries
                .into_iter()
                .map(|raw| QueuedRecord {
                    log: NormalizedLog::from_raw(raw, service.id.clone()),
                    log_source_id: Some(source.id),
                    already_deduped: false,
                })
                .collect();

            let item = WorkItem { service_id: service.id.clone(), records };
            if let Err(err) = self.queue.enqueue(item, ENQUEUE_TIMEOUT).await {
                let reason = match err {
                    EnqueueError::Overflow(_) => "worker queue overflow".to_string(),
                    EnqueueError::Closed => "worker queue closed".to_string(),
                };
                tracing::warn!(service_id = %service.id, source_id = %source.id, %reason, "failed to enqueue fetched batch");
                let _ = self.store.set_source_connection_status(source.id, &reason).await;
                return FetchOutcome::Failed { reason };
            }
        }

        if let Err(err) = self.store.advance_source_fetched_at(source.id, now).await {
            let reason = err.to_string();
            tracing::warn!(service_id = %service.id, source_id = %source.id, error = %reason, "failed to advance last_fetch_at");
            return FetchOutcome::Failed { reason };
        }
        let _ = self.store.set_source_connection_status(source.id, "ok").await;

        FetchOutcome::Success { record_count }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;
    use xcluster_core::RawLogEntry;
    use xcluster_store::InMemoryStore;
    use xcluster_worker::WorkQueue;

    use crate::adapter::{FetchError, FetchResult};

    struct StubAdapter {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl SourceAdapter for StubAdapter {
        fn name(&self) -> &'static str {
            "stub"
        }

        async fn fetch(&self, _source: &LogSource, _window: FetchWindow) -> FetchResult<Vec<RawLogEntry>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(FetchError::Transport("boom".to_string()));
            }
            Ok(vec![RawLogEntry {
                message: "Connection refused by peer".to_string(),
                timestamp: Some(Utc::now()),
                service_id: None,
                level: Some(xcluster_core::LogLevel::Error),
                logger: None,
                exception_type: Some("ConnectionError".to_string()),
                exception_message: None,
                stack_trace: None,
                hostname: None,
                trace_id: None,
                request_id: None,
                fields: Default::default(),
            }])
        }
    }

    fn service() -> Service {
        Service {
            id: "svc".to_string(),
            display_name: "svc".to_string(),
            active: true,
            log_processing_enabled: true,
            fetch_interval_secs: 60,
            cleanup_interval_secs: 3600,
            notification_target: None,
            last_log_fetch: None,
            created_at: Utc::now(),
        }
    }

    fn source() -> LogSource {
        LogSource {
            id: Uuid::new_v4(),
            service_id: "svc".to_string(),
            source_type: SourceType::File,
            connection_descriptor: serde_json::json!({}),
            index_pattern: String::new(),
            query_filter: None,
            fetch_enabled: true,
            last_fetch_at: None,
            connection_status: "unknown".to_string(),
        }
    }

    #[tokio::test]
    async fn successful_fetch_advances_last_fetch_at_and_enqueues() {
        let mem = InMemoryStore::new();
        let src = source();
        mem.seed_source(src.clone());
        let store: Arc<dyn StoreAdapter> = Arc::new(mem);

        let queue = WorkQueue::bounded(8);
        let mut adapters: HashMap<SourceType, Arc<dyn SourceAdapter>> = HashMap::new();
        adapters.insert(SourceType::File, Arc::new(StubAdapter { calls: AtomicUsize::new(0), fail: false }));
        let fetcher = Fetcher::new(store.clone(), queue.handle.clone(), adapters);

        let outcome = fetcher.fetch_source(&service(), &src).await;
        assert!(matches!(outcome, FetchOutcome::Success { record_count: 1 }));
    }

    #[tokio::test]
    async fn failed_fetch_does_not_advance_last_fetch_at() {
        let store: Arc<dyn StoreAdapter> = Arc::new(InMemoryStore::new());
        let src = source();

        let queue = WorkQueue::bounded(8);
        let mut adapters: HashMap<SourceType, Arc<dyn SourceAdapter>> = HashMap::new();
        adapters.insert(SourceType::File, Arc::new(StubAdapter { calls: AtomicUsize::new(0), fail: true }));
        let fetcher = Fetcher::new(store.clone(), queue.handle.clone(), adapters);

        let outcome = fetcher.fetch_source(&service(), &src).await;
        assert!(matches!(outcome, FetchOutcome::Failed { .. }));
    }

    #[tokio::test]
    async fn gated_service_skips_fetch_entirely() {
        let store: Arc<dyn StoreAdapter> = Arc::new(InMemoryStore::new());
        let src = source();
        let mut svc = service();
        svc.log_processing_enabled = false;

        let queue = WorkQueue::bounded(8);
        let mut adapters: HashMap<SourceType, Arc<dyn SourceAdapter>> = HashMap::new();
        adapters.insert(SourceType::File, Arc::new(StubAdapter { calls: AtomicUsize::new(0), fail: false }));
        let fetcher = Fetcher::new(store, queue.handle, adapters);

        let outcome = fetcher.fetch_source(&svc, &src).await;
        assert!(matches!(outcome, FetchOutcome::ServiceGated));
    }
}
