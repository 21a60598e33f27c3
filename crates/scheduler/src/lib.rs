//! Single-flight task queue.
//!
//! Tasks carry a priority and a `not_before` time. The queue hands out at
//! most one task at a time and keeps returning it until it reports done.

pub mod error;
pub mod metrics;
pub mod model;
pub mod queue;

pub use error::SchedulerError;
pub use metrics::SchedulerMetricsSnapshot;
pub use model::{Task, TaskKind, TaskState};
pub use queue::TaskQueue;
