//! Types for the queue module.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a queued task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TaskState {
    /// Waiting for a free slot.
    Queued,
    /// A pipeline run is in flight.
    Running,
    /// The run finished successfully.
    Completed,
    /// The run finished with an error, all attempts exhausted.
    Failed { error: String },
    /// The run observed a cancellation.
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed { .. } | Self::Cancelled
        )
    }
}

/// A task tracked by the queue.
///
/// Progress mirrors the record's checkpoints, so polling the task gives
/// the same numbers as reading the record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskInfo {
    pub task_id: String,
    pub video_id: String,
    #[serde(flatten)]
    pub state: TaskState,
    pub progress_pct: u8,
    pub stage: String,
    /// Attempts started so far.
    pub attempts: u32,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Point-in-time view of queue load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStats {
    pub active: usize,
    pub queued: usize,
    pub max_concurrent: usize,
    pub total_processed: u64,
    pub total_failed: u64,
}
