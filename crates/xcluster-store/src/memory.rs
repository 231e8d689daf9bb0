use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::adapter::{FindOrCreate, StoreAdapter};
use crate::error::{StoreError, StoreResult};
use crate::types::{ClusterKey, ClusterStatus, ExceptionCluster, IndexingResult, LogSource, Service};
use xcluster_core::ExceptionRecord;

/// In-process store for tests and `xcluster-cli`'s demo mode. Not for
/// production use: state is lost on restart and holds no real transaction
/// isolation, but `find_or_create_cluster` still serializes correctly under
/// a single global lock, which is enough to exercise Clusterer behaviour.
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    services: HashMap<String, Service>,
    sources: HashMap<String, Vec<LogSource>>,
    clusters: HashMap<Uuid, ExceptionCluster>,
    cluster_by_key: HashMap<ClusterKey, Uuid>,
    buckets: HashMap<Uuid, Vec<(DateTime<Utc>, i64)>>,
    indexing_results: Vec<IndexingResult>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_service(&self, service: Service) {
        self.inner.lock().unwrap().services.insert(service.id.clone(), service);
    }

    pub fn seed_source(&self, source: LogSource) {
        self.inner
            .lock()
            .unwrap()
            .sources
            .entry(source.service_id.clone())
            .or_default()
            .push(source);
    }
}

#[async_trait]
impl StoreAdapter for InMemoryStore {
    async fn get_service(&self, id: &str) -> StoreResult<Option<Service>> {
        Ok(self.inner.lock().unwrap().services.get(id).cloned())
    }

    async fn list_active_services(&self) -> StoreResult<Vec<Service>> {
        Ok(self.inner.lock().unwrap().services.values().filter(|s| s.active).cloned().collect())
    }

    async fn list_enabled_sources(&self, service_id: &str) -> StoreResult<Vec<LogSource>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .sources
            .get(service_id)
            .map(|v| v.iter().filter(|s| s.fetch_enabled).cloned().collect())
            .unwrap_or_default())
    }

    async fn find_or_create_cluster(
        &self,
        service_id: &str,
        log_source_id: Option<Uuid>,
        fingerprint_static: &str,
        representative: &ExceptionRecord,
    ) -> StoreResult<FindOrCreate> {
        let mut inner = self.inner.lock().unwrap();
        let key = ClusterKey {
            service_id: service_id.to_string(),
            fingerprint_static: fingerprint_static.to_string(),
        };

        if let Some(&id) = inner.cluster_by_key.get(&key) {
            return Ok(FindOrCreate { cluster_id: id, created: false });
        }

        let now = Utc::now();
        let id = Uuid::new_v4();
        let cluster = ExceptionCluster {
            id,
            service_id: service_id.to_string(),
            log_source_id,
            fingerprint_static: fingerprint_static.to_string(),
            representative: representative.clone(),
            logger: representative.logger.clone(),
            size: 1,
            frequency_24h: 1,
            first_seen: now,
            last_seen: now,
            status: ClusterStatus::Active,
            status_updated_at: None,
            status_updated_by: None,
            has_rca: false,
        };
        inner.clusters.insert(id, cluster);
        inner.cluster_by_key.insert(key, id);
        inner.buckets.insert(id, vec![(now, 1)]);

        Ok(FindOrCreate { cluster_id: id, created: true })
    }

    async fn touch_cluster(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let cluster = inner.clusters.get_mut(&id).ok_or(StoreError::ClusterNotFound(id))?;
        cluster.size += 1;
        cluster.last_seen = now;

        let buckets = inner.buckets.entry(id).or_default();
        buckets.push((now, 1));
        let cutoff = now - chrono::Duration::hours(24);
        buckets.retain(|(ts, _)| *ts >= cutoff);
        let total: i64 = buckets.iter().map(|(_, c)| c).sum();

        inner.clusters.get_mut(&id).unwrap().frequency_24h = total;
        Ok(())
    }

    async fn set_cluster_status(
        &self,
        id: Uuid,
        status: ClusterStatus,
        actor: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        // the (service_id, fingerprint_static) key is permanent for the life of
        // the cluster regardless of status: a resolved or skipped cluster keeps
        // absorbing hits rather than freeing the slot for a new cluster.
        let mut inner = self.inner.lock().unwrap();
        let cluster = inner.clusters.get_mut(&id).ok_or(StoreError::ClusterNotFound(id))?;
        cluster.status = status;
        cluster.status_updated_at = Some(now);
        cluster.status_updated_by = Some(actor.to_string());
        Ok(())
    }

    async fn get_cluster(&self, id: Uuid) -> StoreResult<Option<ExceptionCluster>> {
        Ok(self.inner.lock().unwrap().clusters.get(&id).cloned())
    }

    async fn list_clusters(
        &self,
        service_id: Option<&str>,
        status: Option<ClusterStatus>,
        since: Option<DateTime<Utc>>,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<ExceptionCluster>> {
        let inner = self.inner.lock().unwrap();
        let mut matched: Vec<ExceptionCluster> = inner
            .clusters
            .values()
            .filter(|c| service_id.map_or(true, |s| c.service_id == s))
            .filter(|c| status.map_or(true, |st| c.status == st))
            .filter(|c| since.map_or(true, |s| c.last_seen >= s))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.last_seen.cmp(&a.last_seen));

        let start = offset.max(0) as usize;
        let end = (start + limit.max(0) as usize).min(matched.len());
        Ok(if start >= matched.len() { vec![] } else { matched[start..end].to_vec() })
    }

    async fn advance_source_fetched_at(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        for sources in inner.sources.values_mut() {
            for s in sources.iter_mut() {
                if s.id == id {
                    s.last_fetch_at = Some(now);
                }
            }
        }
        Ok(())
    }

    async fn set_source_connection_status(&self, id: Uuid, status: &str) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        for sources in inner.sources.values_mut() {
            for s in sources.iter_mut() {
                if s.id == id {
                    s.connection_status = status.to_string();
                }
            }
        }
        Ok(())
    }

    async fn record_indexing_result(&self, result: IndexingResult) -> StoreResult<()> {
        self.inner.lock().unwrap().indexing_results.push(result);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xcluster_core::{ErrorCategory, Fingerprints};

    fn sample_record(fingerprint: &str) -> ExceptionRecord {
        ExceptionRecord {
            log_id: Uuid::new_v4(),
            exception_type: "NullPointerException".to_string(),
            message: "npe".to_string(),
            logger: Some("com.x.Handler".to_string()),
            frames: vec![],
            has_stack_trace: false,
            fingerprints: Fingerprints {
                exact: "a".into(),
                template: fingerprint.to_string(),
                semantic: "c".into(),
                category: "d".into(),
            },
            fingerprint_static: fingerprint.to_string(),
            error_category: ErrorCategory::NullError,
            content_hash: "hash".into(),
        }
    }

    #[tokio::test]
    async fn second_hit_on_same_key_does_not_create() {
        let store = InMemoryStore::new();
        let source_id = Uuid::new_v4();
        let rec = sample_record("fp-1");

        let first = store.find_or_create_cluster("svc", Some(source_id), "fp-1", &rec).await.unwrap();
        let second = store.find_or_create_cluster("svc", Some(source_id), "fp-1", &rec).await.unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.cluster_id, second.cluster_id);
    }

    #[tokio::test]
    async fn touch_cluster_bumps_size_and_frequency() {
        let store = InMemoryStore::new();
        let source_id = Uuid::new_v4();
        let rec = sample_record("fp-2");
        let created = store.find_or_create_cluster("svc", Some(source_id), "fp-2", &rec).await.unwrap();

        store.touch_cluster(created.cluster_id, Utc::now()).await.unwrap();
        store.touch_cluster(created.cluster_id, Utc::now()).await.unwrap();

        let cluster = store.get_cluster(created.cluster_id).await.unwrap().unwrap();
        assert_eq!(cluster.size, 3);
        assert_eq!(cluster.frequency_24h, 3);
    }

    #[tokio::test]
    async fn resolving_a_cluster_keeps_the_key_bound_to_it() {
        let store = InMemoryStore::new();
        let source_id = Uuid::new_v4();
        let rec = sample_record("fp-3");
        let created = store.find_or_create_cluster("svc", Some(source_id), "fp-3", &rec).await.unwrap();

        store
            .set_cluster_status(created.cluster_id, ClusterStatus::Resolved, "operator", Utc::now())
            .await
            .unwrap();

        // a later hit on the same key must join the resolved cluster, not
        // spawn a second one for the same (service_id, fingerprint_static).
        let hit = store.find_or_create_cluster("svc", Some(source_id), "fp-3", &rec).await.unwrap();
        assert!(!hit.created);
        assert_eq!(hit.cluster_id, created.cluster_id);

        store.touch_cluster(hit.cluster_id, Utc::now()).await.unwrap();
        let cluster = store.get_cluster(hit.cluster_id).await.unwrap().unwrap();
        assert_eq!(cluster.status, ClusterStatus::Resolved);
        assert_eq!(cluster.size, 2);
    }

    #[tokio::test]
    async fn status_transition_is_idempotent_on_counters() {
        let store = InMemoryStore::new();
        let source_id = Uuid::new_v4();
        let rec = sample_record("fp-4");
        let created = store.find_or_create_cluster("svc", Some(source_id), "fp-4", &rec).await.unwrap();

        let t1 = Utc::now();
        store.set_cluster_status(created.cluster_id, ClusterStatus::Resolved, "alice", t1).await.unwrap();
        let after_first = store.get_cluster(created.cluster_id).await.unwrap().unwrap();

        let t2 = t1 + chrono::Duration::seconds(5);
        store.set_cluster_status(created.cluster_id, ClusterStatus::Resolved, "alice", t2).await.unwrap();
        let after_second = store.get_cluster(created.cluster_id).await.unwrap().unwrap();

        assert_eq!(after_first.size, after_second.size);
        assert_eq!(after_second.status, ClusterStatus::Resolved);
        assert_eq!(after_second.status_updated_at, Some(t2));
    }
}
