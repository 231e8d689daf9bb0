use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StoreResult;
use crate::types::{ClusterStatus, ExceptionCluster, IndexingResult, LogSource, Service};
use xcluster_core::ExceptionRecord;

/// Result of `find_or_create_cluster`: whether this call's representative
/// won the race, alongside the cluster id either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FindOrCreate {
    pub cluster_id: Uuid,
    pub created: bool,
}

/// Storage seam for everything the pipeline needs durable: services,
/// log sources, and exception clusters. Implementations must make
/// `find_or_create_cluster` serializable per `(service_id, fingerprint_static)` -
/// at most one active cluster can ever exist for that pair.
#[async_trait]
pub trait StoreAdapter: Send + Sync {
    async fn get_service(&self, id: &str) -> StoreResult<Option<Service>>;

    async fn list_active_services(&self) -> StoreResult<Vec<Service>>;

    async fn list_enabled_sources(&self, service_id: &str) -> StoreResult<Vec<LogSource>>;

    /// find an existing cluster for `(service_id, fingerprint_static)` or create
    /// one with `representative` as its snapshot. the representative is
    /// persisted only on the winning create; a loser's representative is discarded.
    /// `log_source_id` is `None` for push-ingested records, which have no
    /// owning `LogSource` row.
    async fn find_or_create_cluster(
        &self,
        service_id: &str,
        log_source_id: Option<Uuid>,
        fingerprint_static: &str,
        representative: &ExceptionRecord,
    ) -> StoreResult<FindOrCreate>;

    /// bump `last_seen`, `size` and the rolling 24h bucket for a cluster hit.
    async fn touch_cluster(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<()>;

    async fn set_cluster_status(
        &self,
        id: Uuid,
        status: ClusterStatus,
        actor: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<()>;

    async fn get_cluster(&self, id: Uuid) -> StoreResult<Option<ExceptionCluster>>;

    async fn list_clusters(
        &self,
        service_id: Option<&str>,
        status: Option<ClusterStatus>,
        since: Option<DateTime<Utc>>,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<ExceptionCluster>>;

    async fn advance_source_fetched_at(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<()>;

    /// record the outcome of the source's most recent fetch attempt, e.g.
    /// `"ok"` or a short failure reason. Surfaced back through the health
    /// endpoint so a broken credential or unreachable index shows up fast.
    async fn set_source_connection_status(&self, id: Uuid, status: &str) -> StoreResult<()>;

    async fn record_indexing_result(&self, result: IndexingResult) -> StoreResult<()>;
}
