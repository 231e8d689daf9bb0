//! Store Adapter: the durable boundary for services, log sources and
//! exception clusters. `find_or_create_cluster` is the one call every
//! other component depends on being serializable per cluster key.

pub mod adapter;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod types;

pub use adapter::{FindOrCreate, StoreAdapter};
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryStore;
pub use postgres::PgStore;
pub use types::{ClusterKey, ClusterStatus, ExceptionCluster, IndexingResult, LogSource, Service, SourceType};
