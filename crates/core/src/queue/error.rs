//! Error types for the queue module.

use thiserror::Error;

/// Errors that can occur when interacting with the task queue.
#[derive(Debug, Error)]
pub enum QueueError {
    /// A non-terminal task already exists for the video.
    #[error("Video {video_id} already has an active task: {task_id}")]
    AlreadyQueued { video_id: String, task_id: String },

    /// Task not found in the registry.
    #[error("Task not found: {0}")]
    TaskNotFound(String),
}
