//! Seam to the code-indexing/retrieval collaborator. The Scheduler only
//! needs to know the collaborator's current content-hash for a service and
//! be able to fire a job at it; everything about how indexing actually
//! works lives outside this crate.

use async_trait::async_trait;

/// Why an indexing job was fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexingReason {
    ExceptionDetected,
}

impl IndexingReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExceptionDetected => "exception_detected",
        }
    }
}

#[async_trait]
pub trait IndexingCollaborator: Send + Sync {
    /// The collaborator's current content-hash for this service's indexed
    /// source, or `None` if it has never indexed the service.
    async fn current_commit_hash(&self, service_id: &str) -> Option<String>;

    /// Fire an indexing job. Errors are logged and do not retry here; the
    /// next scheduler tick re-evaluates the trigger from scratch.
    async fn trigger_indexing(&self, service_id: &str, reason: IndexingReason) -> Result<(), String>;
}

/// Default collaborator: never has a new commit, so the trigger never
/// fires. Used when no real indexing backend is wired up.
pub struct NoopIndexingCollaborator;

#[async_trait]
impl IndexingCollaborator for NoopIndexingCollaborator {
    async fn current_commit_hash(&self, _service_id: &str) -> Option<String> {
        None
    }

    async fn trigger_indexing(&self, _service_id: &str, _reason: IndexingReason) -> Result<(), String> {
        Ok(())
    }
}
