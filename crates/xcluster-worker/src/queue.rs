//! The single bounded FIFO queue between producers (Ingress, Fetcher) and
//! the Worker Pool. A `WorkItem` is one batch: records inside it are
//! processed in submission order by the single worker that dequeues it;
//! ordering across batches is not guaranteed and the Clusterer does not
//! need it to be.

use std::time::Duration;

use tokio::sync::mpsc;
use uuid::Uuid;

use xcluster_core::NormalizedLog;

/// One record plus the log source it arrived through - the Clusterer needs
/// the source id only at cluster-creation time, but every hit carries it so
/// the pipeline does not need a second lookup.
#[derive(Debug, Clone)]
pub struct QueuedRecord {
    pub log: NormalizedLog,
    /// `None` for push-ingested records, which have no owning `LogSource` row.
    pub log_source_id: Option<Uuid>,
    /// Set by Ingress, which must apply the dedup check itself so it can
    /// report `rejected_duplicate` synchronously in the batch response
    /// (§4.4 validation order runs dedup before enqueue). The Worker Pool's
    /// own dedup check (§4.6 step 1) exists for Fetcher-sourced records,
    /// which carry no such pre-check; skipping it here avoids re-testing
    /// the same cache entry against itself and flagging every accepted
    /// Ingress record as a duplicate the moment it is dequeued.
    pub already_deduped: bool,
}

#[derive(Debug, Clone)]
pub struct WorkItem {
    pub service_id: String,
    pub records: Vec<QueuedRecord>,
}

#[derive(Debug, thiserror::Error)]
pub enum EnqueueError {
    #[error("work queue is full, dropped after waiting {0:?}")]
    Overflow(Duration),
    #[error("work queue is closed")]
    Closed,
}

/// Producer-side handle. Cheaply cloneable; every producer task holds one.
#[derive(Clone)]
pub struct QueueHandle {
    sender: mpsc::Sender<WorkItem>,
}

impl QueueHandle {
    /// Enqueue `item`, waiting up to `timeout` for room. Producers must
    /// treat a timeout as an explicit overflow to report upward, never as
    /// a reason to block indefinitely.
    pub async fn enqueue(&self, item: WorkItem, timeout: Duration) -> Result<(), EnqueueError> {
        match tokio::time::timeout(timeout, self.sender.send(item)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(EnqueueError::Closed),
            Err(_) => Err(EnqueueError::Overflow(timeout)),
        }
    }

    /// Current slack in the queue, used by `/ingest/metrics`.
    pub fn capacity_remaining(&self) -> usize {
        self.sender.capacity()
    }
}

pub struct WorkQueue {
    pub handle: QueueHandle,
    pub receiver: mpsc::Receiver<WorkItem>,
}

impl WorkQueue {
    pub fn bounded(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity);
        Self { handle: QueueHandle { sender }, receiver }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::HashMap;
    use xcluster_core::{LogLevel, RawLogEntry};

    fn sample_item(service_id: &str) -> WorkItem {
        let raw = RawLogEntry {
            message: "boom".to_string(),
            timestamp: Some(Utc::now()),
            service_id: Some(service_id.to_string()),
            level: Some(LogLevel::Error),
            logger: None,
            exception_type: None,
            exception_message: None,
            stack_trace: None,
            hostname: None,
            trace_id: None,
            request_id: None,
            fields: HashMap::new(),
        };
        let log = NormalizedLog::from_raw(raw, service_id.to_string());
        WorkItem {
            service_id: service_id.to_string(),
            records: vec![QueuedRecord { log, log_source_id: Some(Uuid::new_v4()), already_deduped: false }],
        }
    }

    #[tokio::test]
    async fn enqueue_and_drain_round_trip() {
        let mut queue = WorkQueue::bounded(4);
        queue.handle.enqueue(sample_item("svc"), Duration::from_millis(50)).await.unwrap();
        let item = queue.receiver.recv().await.unwrap();
        assert_eq!(item.service_id, "svc");
    }

    #[tokio::test]
    async fn full_queue_times_out_with_overflow() {
        let mut queue = WorkQueue::bounded(1);
        queue.handle.enqueue(sample_item("svc"), Duration::from_millis(50)).await.unwrap();

        let err = queue.handle.enqueue(sample_item("svc"), Duration::from_millis(20)).await.unwrap_err();
        assert!(matches!(err, EnqueueError::Overflow(_)));

        // drain so the receiver isn't dropped mid-test
        let _ = queue.receiver.recv().await;
    }

    #[tokio::test]
    async fn closed_queue_reports_closed_not_overflow() {
        let queue = WorkQueue::bounded(1);
        drop(queue.receiver);
        let err = queue.handle.enqueue(sample_item("svc"), Duration::from_millis(20)).await.unwrap_err();
        assert!(matches!(err, EnqueueError::Closed));
    }
}
