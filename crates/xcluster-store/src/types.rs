use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use xcluster_core::ExceptionRecord;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    pub display_name: String,
    pub active: bool,
    pub log_processing_enabled: bool,
    pub fetch_interval_secs: u64,
    pub cleanup_interval_secs: u64,
    pub notification_target: Option<String>,
    pub last_log_fetch: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Opensearch,
    Elasticsearch,
    File,
    Cloudwatch,
    HttpPush,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSource {
    pub id: Uuid,
    pub service_id: String,
    pub source_type: SourceType,
    pub connection_descriptor: serde_json::Value,
    pub index_pattern: String,
    pub query_filter: Option<String>,
    pub fetch_enabled: bool,
    pub last_fetch_at: Option<DateTime<Utc>>,
    pub connection_status: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterStatus {
    Active,
    Skipped,
    Resolved,
}

impl ClusterStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Skipped => "skipped",
            Self::Resolved => "resolved",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "skipped" => Some(Self::Skipped),
            "resolved" => Some(Self::Resolved),
            _ => None,
        }
    }
}

/// the key a cluster is uniquely identified by: `(service_id, fingerprint_static)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClusterKey {
    pub service_id: String,
    pub fingerprint_static: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExceptionCluster {
    pub id: Uuid,
    pub service_id: String,
    /// `None` for push-ingested clusters, which have no owning `LogSource`
    /// row; `Some` for every cluster created from a pull fetch.
    pub log_source_id: Option<Uuid>,
    pub fingerprint_static: String,
    pub representative: ExceptionRecord,
    pub logger: Option<String>,
    pub size: i64,
    pub frequency_24h: i64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub status: ClusterStatus,
    pub status_updated_at: Option<DateTime<Utc>>,
    pub status_updated_by: Option<String>,
    pub has_rca: bool,
}

#[derive(Debug, Clone)]
pub struct IndexingResult {
    pub service_id: String,
    pub commit_hash: String,
    pub status: String,
    pub error: Option<String>,
}
