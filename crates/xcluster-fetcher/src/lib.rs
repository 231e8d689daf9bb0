//! Pull Fetcher: periodically reads from externally-owned log stores
//! (OpenSearch/Elasticsearch, local files, CloudWatch Logs) and feeds the
//! results into the same worker queue Ingress pushes to.

pub mod adapter;
pub mod cloudwatch;
pub mod fetcher;
pub mod file;
pub mod opensearch;

pub use adapter::{FetchError, FetchResult, FetchWindow, SourceAdapter};
pub use cloudwatch::CloudWatchAdapter;
pub use fetcher::{FetchOutcome, Fetcher};
pub use file::FileAdapter;
pub use opensearch::SearchAdapter;

use std::collections::HashMap;
use std::sync::Arc;

use xcluster_store::SourceType;

/// Build the standard adapter table, one entry per `SourceType` this crate
/// knows how to pull from. `HttpPush` has no adapter here: those logs only
/// ever arrive through Ingress.
pub async fn default_adapters() -> HashMap<SourceType, Arc<dyn SourceAdapter>> {
    let mut adapters: HashMap<SourceType, Arc<dyn SourceAdapter>> = HashMap::new();
    let search: Arc<dyn SourceAdapter> = Arc::new(SearchAdapter::new());
    adapters.insert(SourceType::Opensearch, search.clone());
    adapters.insert(SourceType::Elasticsearch, search);
    adapters.insert(SourceType::File, Arc::new(FileAdapter::new()));
    adapters.insert(SourceType::Cloudwatch, Arc::new(CloudWatchAdapter::new().await));
    adapters
}
