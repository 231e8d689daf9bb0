//! Ingress API: the push surface for `NormalizedLog`-shaped batches.
//! Validation happens in the declared order from the record shape contract
//! -- auth is handled by `middleware::require_bearer_token` before a handler
//! ever runs; everything below is per-record shape, size, service gating,
//! rate limiting, and dedup, in that order.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use xcluster_core::{NormalizedLog, RawLogEntry};
use xcluster_worker::{dedup_hash, QueuedRecord, WorkItem};

use crate::error::ApiError;
use crate::state::AppState;

const MAX_MESSAGE_BYTES: usize = 50 * 1024;
const MAX_STACK_TRACE_BYTES: usize = 100 * 1024;
const ENQUEUE_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Debug, Deserialize)]
pub struct IngestBatchRequest {
    pub logs: Vec<RawLogEntry>,
}

#[derive(Debug, Default, Serialize)]
pub struct RejectedCounts {
    pub validation: u64,
    pub unknown_service: u64,
    pub rate_limited: u64,
    pub duplicate: u64,
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub received_count: usize,
    pub accepted_count: usize,
    pub rejected_count: RejectedCounts,
    pub task_id: Uuid,
}

pub async fn ingest_batch(
    State(state): State<Arc<AppState>>,
    Json(req): Json<IngestBatchRequest>,
) -> Result<Json<IngestResponse>, ApiError> {
    if req.logs.len() > state.config.ingest_batch_limit {
        return Err(ApiError::BatchTooLarge { limit: state.config.ingest_batch_limit, received: req.logs.len() });
    }
    let response = process_batch(&state, req.logs).await?;
    Ok(Json(response))
}

pub async fn ingest_single(
    State(state): State<Arc<AppState>>,
    Json(entry): Json<RawLogEntry>,
) -> Result<Json<IngestResponse>, ApiError> {
    let response = process_batch(&state, vec![entry]).await?;
    Ok(Json(response))
}

async fn process_batch(state: &AppState, logs: Vec<RawLogEntry>) -> Result<IngestResponse, ApiError> {
    let received_count = logs.len();
    let mut rejected = RejectedCounts::default();
    let mut by_service: HashMap<String, Vec<RawLogEntry>> = HashMap::new();

    // shape + size validation, then group by service so the rate limiter
    // can be charged once per service rather than once per record.
    for entry in logs {
        let Some(service_id) = entry.service_id.clone() else {
            rejected.validation += 1;
            continue;
        };
        if entry.timestamp.is_none() {
            rejected.validation += 1;
            continue;
        }
        if entry.level.is_none() {
            rejected.validation += 1;
            continue;
        }
        if entry.message.len() > MAX_MESSAGE_BYTES {
            rejected.validation += 1;
            continue;
        }
        if entry.stack_trace.as_ref().is_some_and(|s| s.len() > MAX_STACK_TRACE_BYTES) {
            rejected.validation += 1;
            continue;
        }
        by_service.entry(service_id).or_default().push(entry);
    }

    let mut accepted_count = 0usize;
    let task_id = Uuid::new_v4();

    for (service_id, entries) in by_service {
        let Some(service) = state.store.get_service(&service_id).await? else {
            rejected.unknown_service += entries.len() as u64;
            continue;
        };
        if !service.log_processing_enabled {
            rejected.unknown_service += entries.len() as u64;
            continue;
        }

        let allowed = state.rate_limiter.allow(&service_id, entries.len() as u64);
        rejected.rate_limited += allowed.rejected;

        let mut records = Vec::with_capacity(allowed.accepted as usize);
        for entry in entries.into_iter().take(allowed.accepted as usize) {
            let message = entry.message.clone();
            let level = entry.level.unwrap_or(xcluster_core::LogLevel::Info);
            let logger = entry.logger.clone();
            let timestamp = entry.timestamp.unwrap_or_else(chrono::Utc::now);

            let hash = dedup_hash(&message, &format!("{level:?}"), logger.as_deref(), timestamp);
            if state.dedup.check_and_record(&service_id, &hash) {
                rejected.duplicate += 1;
                continue;
            }

            let log = NormalizedLog::from_raw(entry, service_id.clone());
            records.push(QueuedRecord { log, log_source_id: None, already_deduped: true });
            accepted_count += 1;
        }

        if records.is_empty() {
            continue;
        }

        let item = WorkItem { service_id: service_id.clone(), records };
        if state.queue.enqueue(item, ENQUEUE_TIMEOUT).await.is_err() {
            return Err(ApiError::QueueOverflow);
        }
    }

    Ok(IngestResponse { received_count, accepted_count, rejected_count: rejected, task_id })
}

pub async fn health() -> &'static str {
    "ok"
}

#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    pub processed: u64,
    pub duplicates: u64,
    pub not_an_exception: u64,
    pub clusters_created: u64,
    pub clusters_hit: u64,
    pub deadline_exceeded: u64,
    pub store_errors: u64,
    pub queue_capacity_remaining: usize,
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> Json<MetricsResponse> {
    use std::sync::atomic::Ordering;
    let m = &state.pool.metrics;
    Json(MetricsResponse {
        processed: m.processed.load(Ordering::Relaxed),
        duplicates: m.duplicates.load(Ordering::Relaxed),
        not_an_exception: m.not_an_exception.load(Ordering::Relaxed),
        clusters_created: m.clusters_created.load(Ordering::Relaxed),
        clusters_hit: m.clusters_hit.load(Ordering::Relaxed),
        deadline_exceeded: m.deadline_exceeded.load(Ordering::Relaxed),
        store_errors: m.store_errors.load(Ordering::Relaxed),
        queue_capacity_remaining: state.queue.capacity_remaining(),
    })
}
