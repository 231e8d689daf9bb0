//! Clusterer - assigns exception records to clusters, creating on first
//! sight and maintaining counters on every subsequent hit. This is the one
//! correctness-critical seam in the pipeline: the `(service_id,
//! fingerprint_static)` key must map to exactly one cluster regardless of
//! how many workers race to create it, which `find_or_create_cluster`
//! guarantees at the store layer (unique constraint, retry-on-conflict).
//! The Clusterer itself just sequences find-or-create -> touch and exposes
//! the idempotent status transition.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use xcluster_core::ExceptionRecord;
use xcluster_store::{ClusterStatus, StoreAdapter, StoreResult};

/// Outcome of assigning one exception record to a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssignOutcome {
    pub cluster_id: Uuid,
    /// true only for the caller whose representative won the create race.
    pub created: bool,
}

pub struct Clusterer {
    store: Arc<dyn StoreAdapter>,
}

impl Clusterer {
    pub fn new(store: Arc<dyn StoreAdapter>) -> Self {
        Self { store }
    }

    /// Assign `record` to its cluster for `service_id`. On first sight this
    /// creates the cluster with `record` as the representative snapshot; on
    /// every later hit it bumps `last_seen`, `size`, and the rolling 24h
    /// bucket. The cluster's logger is fixed at creation (tie-breaking for
    /// the stack-less path: later instances with a different logger are
    /// still accepted, just not adopted onto the cluster).
    pub async fn assign(
        &self,
        service_id: &str,
        log_source_id: Option<Uuid>,
        record: &ExceptionRecord,
    ) -> StoreResult<AssignOutcome> {
        let found = self
            .store
            .find_or_create_cluster(service_id, log_source_id, &record.fingerprint_static, record)
            .await?;

        if !found.created {
            self.store.touch_cluster(found.cluster_id, Utc::now()).await?;
        }

        Ok(AssignOutcome { cluster_id: found.cluster_id, created: found.created })
    }

    /// Apply a user-driven status transition. Idempotent: applying the same
    /// status twice only refreshes `status_updated_at`/`status_updated_by`,
    /// never touches `size` or `frequency_24h`.
    pub async fn set_status(&self, cluster_id: Uuid, status: ClusterStatus, actor: &str) -> StoreResult<()> {
        self.store.set_cluster_status(cluster_id, status, actor, Utc::now()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xcluster_core::{ErrorCategory, Fingerprints};
    use xcluster_store::InMemoryStore;

    fn record(fingerprint: &str, logger: &str) -> ExceptionRecord {
        ExceptionRecord {
            log_id: Uuid::new_v4(),
            exception_type: "ConnectionError".to_string(),
            message: "connection failed".to_string(),
            logger: Some(logger.to_string()),
            frames: vec![],
            has_stack_trace: false,
            fingerprints: Fingerprints {
                exact: "e".into(),
                template: fingerprint.to_string(),
                semantic: "s".into(),
                category: "c".into(),
            },
            fingerprint_static: fingerprint.to_string(),
            error_category: ErrorCategory::ConnectionError,
            content_hash: Uuid::new_v4().to_string(),
        }
    }

    #[tokio::test]
    async fn first_sight_creates_second_sight_hits() {
        let clusterer = Clusterer::new(Arc::new(InMemoryStore::new()));
        let source = Uuid::new_v4();
        let rec = record("fp-a", "com.x.Handler");

        let first = clusterer.assign("svc", Some(source), &rec).await.unwrap();
        assert!(first.created);

        let second = clusterer.assign("svc", Some(source), &rec).await.unwrap();
        assert!(!second.created);
        assert_eq!(first.cluster_id, second.cluster_id);
    }

    #[tokio::test]
    async fn concurrent_first_sight_yields_exactly_one_cluster() {
        // Property 1 / Scenario F: many workers racing on the same key under
        // any interleaving must leave exactly one cluster in the store.
        let store: Arc<dyn StoreAdapter> = Arc::new(InMemoryStore::new());
        let source = Uuid::new_v4();

        let mut handles = Vec::new();
        for _ in 0..32 {
            let clusterer = Clusterer::new(store.clone());
            let rec = record("fp-race", "com.x.Handler");
            handles.push(tokio::spawn(async move { clusterer.assign("svc", Some(source), &rec).await.unwrap() }));
        }

        let mut cluster_ids = std::collections::HashSet::new();
        let mut created_count = 0;
        for h in handles {
            let outcome = h.await.unwrap();
            cluster_ids.insert(outcome.cluster_id);
            if outcome.created {
                created_count += 1;
            }
        }

        assert_eq!(cluster_ids.len(), 1, "exactly one cluster must exist for the key");
        assert_eq!(created_count, 1, "exactly one caller's representative wins the create race");

        let id = *cluster_ids.iter().next().unwrap();
        let cluster = store.get_cluster(id).await.unwrap().unwrap();
        assert_eq!(cluster.size, 32);
    }

    #[tokio::test]
    async fn tie_break_keeps_first_logger_on_the_cluster() {
        let clusterer = Clusterer::new(Arc::new(InMemoryStore::new()));
        let source = Uuid::new_v4();

        let a = record("fp-logger", "com.x.First");
        let b = record("fp-logger", "com.x.Second");

        let first = clusterer.assign("svc", Some(source), &a).await.unwrap();
        let second = clusterer.assign("svc", Some(source), &b).await.unwrap();
        assert_eq!(first.cluster_id, second.cluster_id);

        let cluster = clusterer.store.get_cluster(first.cluster_id).await.unwrap().unwrap();
        assert_eq!(cluster.logger.as_deref(), Some("com.x.First"));
        assert_eq!(cluster.representative.logger.as_deref(), Some("com.x.First"));
    }

    #[tokio::test]
    async fn resolved_cluster_keeps_accepting_hits_on_the_same_key() {
        let clusterer = Clusterer::new(Arc::new(InMemoryStore::new()));
        let source = Uuid::new_v4();
        let rec = record("fp-resolved", "com.x.Handler");

        let created = clusterer.assign("svc", Some(source), &rec).await.unwrap();
        clusterer.set_status(created.cluster_id, ClusterStatus::Resolved, "operator").await.unwrap();

        let hit = clusterer.assign("svc", Some(source), &rec).await.unwrap();
        assert!(!hit.created);
        assert_eq!(hit.cluster_id, created.cluster_id);

        let cluster = clusterer.store.get_cluster(hit.cluster_id).await.unwrap().unwrap();
        assert_eq!(cluster.status, ClusterStatus::Resolved);
        assert_eq!(cluster.size, 2);
    }

    #[tokio::test]
    async fn status_transition_is_idempotent() {
        let clusterer = Clusterer::new(Arc::new(InMemoryStore::new()));
        let source = Uuid::new_v4();
        let rec = record("fp-idem", "com.x.Handler");
        let created = clusterer.assign("svc", Some(source), &rec).await.unwrap();

        clusterer.set_status(created.cluster_id, ClusterStatus::Skipped, "bob").await.unwrap();
        let size_after_first = clusterer.store.get_cluster(created.cluster_id).await.unwrap().unwrap().size;

        clusterer.set_status(created.cluster_id, ClusterStatus::Skipped, "bob").await.unwrap();
        let size_after_second = clusterer.store.get_cluster(created.cluster_id).await.unwrap().unwrap().size;

        assert_eq!(size_after_first, size_after_second);
    }
}
