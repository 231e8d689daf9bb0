//! Worker Pool - a bounded number of concurrent workers draining the single
//! FIFO queue. Each worker processes one batch atomically with respect to
//! itself (in submission order); batches across workers are independent and
//! only contend where the Clusterer's store-level unique constraint
//! resolves the race.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

use xcluster_cluster::Clusterer;
use xcluster_core::parser::ParserRegistry;
use xcluster_core::NormalizedLog;

use crate::dedup::{dedup_hash, DedupCache};
use crate::queue::{QueuedRecord, WorkItem};
use crate::signals::{NewClusterTracker, PipelineSignals};

#[derive(Debug, Clone, Copy)]
pub struct WorkerPoolConfig {
    pub pool_size: usize,
    pub record_deadline: Duration,
    pub shutdown_grace: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self { pool_size: 8, record_deadline: Duration::from_millis(5_000), shutdown_grace: Duration::from_secs(30) }
    }
}

/// Lifecycle counters surfaced on `/ingest/metrics`.
#[derive(Default)]
pub struct WorkerMetrics {
    pub processed: AtomicU64,
    pub duplicates: AtomicU64,
    pub not_an_exception: AtomicU64,
    pub clusters_created: AtomicU64,
    pub clusters_hit: AtomicU64,
    pub deadline_exceeded: AtomicU64,
    pub store_errors: AtomicU64,
}

pub enum RecordOutcome {
    Duplicate,
    NotAnException,
    ClusterCreated(Uuid),
    ClusterHit(Uuid),
    DeadlineExceeded,
    StoreError,
}

pub struct WorkerPool {
    config: WorkerPoolConfig,
    extractor: ParserRegistry,
    dedup: Arc<DedupCache>,
    clusterer: Arc<Clusterer>,
    signals: Arc<dyn PipelineSignals>,
    new_cluster_tracker: Arc<NewClusterTracker>,
    pub metrics: WorkerMetrics,
}

impl WorkerPool {
    pub fn new(
        config: WorkerPoolConfig,
        dedup: Arc<DedupCache>,
        clusterer: Arc<Clusterer>,
        signals: Arc<dyn PipelineSignals>,
        new_cluster_tracker: Arc<NewClusterTracker>,
    ) -> Self {
        Self {
            config,
            extractor: ParserRegistry::default_registry(),
            dedup,
            clusterer,
            signals,
            new_cluster_tracker,
            metrics: WorkerMetrics::default(),
        }
    }

    /// Spawn `config.pool_size` tasks draining `receiver`. Returns a handle
    /// whose `shutdown` drains the current queue for `shutdown_grace` then
    /// abandons the rest.
    pub fn spawn(self: Arc<Self>, receiver: mpsc::Receiver<WorkItem>) -> WorkerPoolHandle {
        let shared_receiver = Arc::new(Mutex::new(receiver));
        let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);
        let mut handles = Vec::with_capacity(self.config.pool_size);

        for _ in 0..self.config.pool_size {
            let pool = self.clone();
            let receiver = shared_receiver.clone();
            let mut shutdown_rx = shutdown_tx.subscribe();
            handles.push(tokio::spawn(async move {
                loop {
                    let item = {
                        let mut guard = receiver.lock().await;
                        tokio::select! {
                            biased;
                            _ = shutdown_rx.recv() => {
                                // drain whatever is already queued within the grace
                                // period, then stop picking up new batches.
                                match tokio::time::timeout(pool.config.shutdown_grace, guard.recv()).await {
                                    Ok(Some(item)) => Some(item),
                                    _ => None,
                                }
                            }
                            item = guard.recv() => item,
                        }
                    };
                    match item {
                        Some(item) => pool.process_item(item).await,
                        None => break,
                    }
                }
            }));
        }

        WorkerPoolHandle { shutdown_tx, handles }
    }

    /// Process one batch: records run in submission order, sequentially,
    /// inside this call.
    pub async fn process_item(&self, item: WorkItem) {
        for record in item.records {
            self.process_record(&item.service_id, record).await;
        }
    }

    async fn process_record(&self, service_id: &str, record: QueuedRecord) -> RecordOutcome {
        let QueuedRecord { log, log_source_id, already_deduped } = record;
        let result =
            tokio::time::timeout(self.config.record_deadline, self.run_pipeline(service_id, log_source_id, log, already_deduped)).await;

        match result {
            Ok(outcome) => outcome,
            Err(_) => {
                self.metrics.deadline_exceeded.fetch_add(1, Ordering::Relaxed);
                RecordOutcome::DeadlineExceeded
            }
        }
    }

    async fn run_pipeline(&self, service_id: &str, log_source_id: Option<Uuid>, log: NormalizedLog, already_deduped: bool) -> RecordOutcome {
        // Ingress applies this same check before enqueueing so it can report
        // `rejected_duplicate` synchronously; re-running it here against the
        // same cache entry would always read back "seen". Fetcher-sourced
        // records carry no such pre-check and still need it here.
        if !already_deduped {
            let hash = dedup_hash(&log.message, &format!("{:?}", log.level), log.logger.as_deref(), log.timestamp);
            if self.dedup.check_and_record(service_id, &hash) {
                self.metrics.duplicates.fetch_add(1, Ordering::Relaxed);
                return RecordOutcome::Duplicate;
            }
        }

        let Some(record) = self.extractor.extract(&log) else {
            self.metrics.not_an_exception.fetch_add(1, Ordering::Relaxed);
            return RecordOutcome::NotAnException;
        };

        self.metrics.processed.fetch_add(1, Ordering::Relaxed);

        match self.clusterer.assign(service_id, log_source_id, &record).await {
            Ok(outcome) if outcome.created => {
                self.metrics.clusters_created.fetch_add(1, Ordering::Relaxed);
                self.new_cluster_tracker.mark(service_id);
                self.signals.on_cluster_created(service_id, outcome.cluster_id).await;
                RecordOutcome::ClusterCreated(outcome.cluster_id)
            }
            Ok(outcome) => {
                self.metrics.clusters_hit.fetch_add(1, Ordering::Relaxed);
                self.signals.on_cluster_hit(service_id, outcome.cluster_id).await;
                RecordOutcome::ClusterHit(outcome.cluster_id)
            }
            Err(err) => {
                // StoreUnavailable / StoreContention exhaustion: drop the
                // record rather than retry forever, bump the error counter,
                // and let the caller's next occurrence re-attempt clustering.
                tracing::warn!(service_id, ?log_source_id, error = %err, "cluster assignment failed, dropping record");
                self.metrics.store_errors.fetch_add(1, Ordering::Relaxed);
                RecordOutcome::StoreError
            }
        }
    }
}

pub struct WorkerPoolHandle {
    shutdown_tx: tokio::sync::broadcast::Sender<()>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPoolHandle {
    /// Signal every worker to drain-and-stop, then wait for them to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::WorkQueue;
    use crate::signals::TracingSignals;
    use chrono::Utc;
    use std::collections::HashMap;
    use std::time::Duration as StdDuration;
    use xcluster_core::{LogLevel, RawLogEntry};
    use xcluster_store::InMemoryStore;

    fn exception_log(service_id: &str, message: &str) -> NormalizedLog {
        let raw = RawLogEntry {
            message: message.to_string(),
            timestamp: Some(Utc::now()),
            service_id: Some(service_id.to_string()),
            level: Some(LogLevel::Error),
            logger: Some("com.x.Handler".to_string()),
            exception_type: Some("ConnectionError".to_string()),
            exception_message: None,
            stack_trace: None,
            hostname: None,
            trace_id: None,
            request_id: None,
            fields: HashMap::new(),
        };
        NormalizedLog::from_raw(raw, service_id.to_string())
    }

    fn test_pool() -> WorkerPool {
        let store = Arc::new(InMemoryStore::new());
        WorkerPool::new(
            WorkerPoolConfig { pool_size: 2, record_deadline: StdDuration::from_secs(5), shutdown_grace: StdDuration::from_secs(1) },
            Arc::new(DedupCache::new(600)),
            Arc::new(Clusterer::new(store)),
            Arc::new(TracingSignals),
            Arc::new(NewClusterTracker::new()),
        )
    }

    #[tokio::test]
    async fn first_occurrence_creates_cluster_second_is_duplicate() {
        let pool = test_pool();
        let source = Uuid::new_v4();
        let log = exception_log("svc", "Connection failed to 10.0.0.1:5432");

        let first = pool.process_record("svc", QueuedRecord { log: log.clone(), log_source_id: Some(source), already_deduped: false }).await;
        assert!(matches!(first, RecordOutcome::ClusterCreated(_)));

        // byte-identical within the same second: the dedup hash collides.
        let second = pool.process_record("svc", QueuedRecord { log, log_source_id: Some(source), already_deduped: false }).await;
        assert!(matches!(second, RecordOutcome::Duplicate));
        assert_eq!(pool.metrics.duplicates.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn non_error_level_is_not_an_exception() {
        let pool = test_pool();
        let mut log = exception_log("svc", "background heartbeat");
        log.level = LogLevel::Info;
        let outcome = pool.process_record("svc", QueuedRecord { log, log_source_id: Some(Uuid::new_v4()), already_deduped: false }).await;
        assert!(matches!(outcome, RecordOutcome::NotAnException));
    }

    #[tokio::test]
    async fn pool_drains_queued_batches_end_to_end() {
        let pool = Arc::new(test_pool());
        let mut queue = WorkQueue::bounded(8);
        let source = Uuid::new_v4();

        let item = WorkItem {
            service_id: "svc".to_string(),
            records: vec![QueuedRecord { log: exception_log("svc", "Connection failed to 10.0.0.9:5432"), log_source_id: Some(source), already_deduped: false }],
        };
        queue.handle.enqueue(item, StdDuration::from_millis(50)).await.unwrap();
        drop(queue.handle);

        let handle = pool.clone().spawn(queue.receiver);
        handle.shutdown().await;

        assert_eq!(pool.metrics.clusters_created.load(Ordering::Relaxed), 1);
    }
}
