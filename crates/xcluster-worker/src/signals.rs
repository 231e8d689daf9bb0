//! Downstream signal hooks. The LLM root-cause generator, the
//! code-embedding/retrieval subsystem, and the notification/webhook
//! dispatcher are external collaborators (see scope); the core only needs a
//! seam to fire-and-forget at them. `NewClusterTracker` is the one piece of
//! signal state the core itself reads back: the Scheduler's conditional
//! indexing trigger needs to know whether a service produced a new cluster
//! since its last tick.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

/// Fired once per record, after cluster assignment, with a timeout budget
/// the core does not block the record pipeline on - a slow or failing
/// collaborator never holds up the worker.
#[async_trait]
pub trait PipelineSignals: Send + Sync {
    async fn on_cluster_created(&self, service_id: &str, cluster_id: Uuid);
    async fn on_cluster_hit(&self, service_id: &str, cluster_id: Uuid);
}

/// Default sink: logs the signal and nothing else. Real notification/RCA
/// wiring lives outside the core.
pub struct TracingSignals;

#[async_trait]
impl PipelineSignals for TracingSignals {
    async fn on_cluster_created(&self, service_id: &str, cluster_id: Uuid) {
        tracing::info!(service_id, %cluster_id, "cluster created");
    }

    async fn on_cluster_hit(&self, service_id: &str, cluster_id: Uuid) {
        tracing::debug!(service_id, %cluster_id, "cluster hit");
    }
}

/// Tracks which services have produced at least one newly-created cluster
/// since the last time the Scheduler drained the set. Process-local, like
/// the dedup cache and rate limiter.
#[derive(Default)]
pub struct NewClusterTracker {
    services: Mutex<HashSet<String>>,
}

impl NewClusterTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&self, service_id: &str) {
        self.services.lock().unwrap().insert(service_id.to_string());
    }

    /// Returns true and clears the flag if `service_id` had a new cluster
    /// since the last check.
    pub fn take(&self, service_id: &str) -> bool {
        self.services.lock().unwrap().remove(service_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_clears_the_flag() {
        let tracker = NewClusterTracker::new();
        tracker.mark("svc");
        assert!(tracker.take("svc"));
        assert!(!tracker.take("svc"));
    }
}
