//! Worker Pool crate - dedup, rate limiting, the producer/worker queue, and
//! the pool itself. Both Ingress and the Pull Fetcher depend on this crate
//! for the shared dedup cache, rate limiter, and queue handle; only the
//! pool's tasks actually run the extraction/clustering pipeline.

pub mod dedup;
pub mod pool;
pub mod queue;
pub mod ratelimit;
pub mod signals;

pub use dedup::{dedup_hash, DedupCache};
pub use pool::{RecordOutcome, WorkerMetrics, WorkerPool, WorkerPoolConfig, WorkerPoolHandle};
pub use queue::{EnqueueError, QueueHandle, QueuedRecord, WorkItem, WorkQueue};
pub use ratelimit::{AllowResult, RateLimiter};
pub use signals::{NewClusterTracker, PipelineSignals, TracingSignals};
