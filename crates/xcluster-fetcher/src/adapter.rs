//! The `SourceAdapter` seam: the Fetcher's scheduling and window logic has
//! no knowledge of the wire protocol underneath. Every pull source type
//! implements this trait; `opensearch` and `elasticsearch` share one
//! implementation since they speak the same query-DSL-over-REST format.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use xcluster_core::RawLogEntry;
use xcluster_store::LogSource;

/// `[start, end]`, computed by the Fetcher as `[max(last_fetch_at, now-24h), now]`.
#[derive(Debug, Clone, Copy)]
pub struct FetchWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("source returned malformed data: {0}")]
    MalformedResponse(String),

    #[error("connection descriptor missing required field: {0}")]
    BadDescriptor(&'static str),
}

pub type FetchResult<T> = Result<T, FetchError>;

/// One page-level pull against a source. A `FetchError` here means the page
/// failed; this must not advance `last_fetch_at` so the next run re-reads
/// the same window (duplicates absorbed by the dedup cache).
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch(&self, source: &LogSource, window: FetchWindow) -> FetchResult<Vec<RawLogEntry>>;
}
