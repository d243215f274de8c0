//! Error types for the pipeline module.

use thiserror::Error;

use crate::record::StoreError;

/// Errors that can occur while running the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Record does not exist.
    #[error("Video record not found: {0}")]
    RecordNotFound(String),

    /// Another run already owns the record, or it is in a state that
    /// cannot start processing.
    #[error("Video {video_id} cannot start processing: status is {current_status}")]
    AlreadyProcessing {
        video_id: String,
        current_status: String,
    },

    /// The compression stage failed; this is the one fatal stage.
    #[error("Compression failed for video {video_id}: {reason}")]
    CompressionFailed { video_id: String, reason: String },

    /// The store rejected an update mid-run.
    #[error("Store error: {0}")]
    Store(String),

    /// Failed to move an artifact into the object store.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<StoreError> for PipelineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => Self::RecordNotFound(id),
            StoreError::InvalidState {
                video_id,
                current_status,
                ..
            } => Self::AlreadyProcessing {
                video_id,
                current_status,
            },
            StoreError::Database(msg) => Self::Store(msg),
        }
    }
}
