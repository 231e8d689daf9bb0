//! Scheduler: fires fetch, cleanup, and conditional code-indexing jobs per
//! service on a fixed cadence.

pub mod indexing;
pub mod scheduler;

pub use indexing::{IndexingCollaborator, IndexingReason, NoopIndexingCollaborator};
pub use scheduler::{Scheduler, SchedulerConfig};
