//! Background task queue for pipeline runs.
//!
//! An in-process queue bounds concurrent runs with a semaphore, tracks
//! task state in a registry, and retries infra failures with a backoff.

mod config;
mod error;
mod local;
mod types;

pub use config::QueueConfig;
pub use error::QueueError;
pub use local::LocalQueue;
pub use types::{QueueStats, TaskInfo, TaskState};
