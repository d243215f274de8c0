//! Video record storage trait and request/filter types.

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::types::{
    CompressionMetadata, OriginalMetadata, QualityPreset, StoredFile, VideoRecord,
};

/// Error type for video store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Record not found.
    #[error("Video record not found: {0}")]
    NotFound(String),

    /// Cannot perform the operation in the record's current state.
    #[error("Cannot {operation} video {video_id}: current status is {current_status}")]
    InvalidState {
        video_id: String,
        current_status: String,
        operation: String,
    },

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),
}

/// Request to register a new video record.
#[derive(Debug, Clone)]
pub struct CreateVideoRequest {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub recorded_at: DateTime<Utc>,
    pub access_level: String,
    pub sensitive: bool,
    /// Already-persisted upload that the record takes ownership of.
    pub original_file: StoredFile,
    pub target_quality: QualityPreset,
}

/// Filter for querying video records.
#[derive(Debug, Clone)]
pub struct VideoFilter {
    /// Filter by processing status.
    pub status: Option<String>,
    /// Maximum number of results.
    pub limit: i64,
    /// Offset for pagination.
    pub offset: i64,
}

impl Default for VideoFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoFilter {
    pub fn new() -> Self {
        Self {
            status: None,
            limit: 100,
            offset: 0,
        }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

/// Terminal outcome of a pipeline run.
#[derive(Debug, Clone)]
pub enum CompletionOutcome {
    /// All stages done; progress is forced to 100.
    Success,
    /// Fatal failure; the message is stored and the retry counter bumped.
    Failure { error: String },
}

/// Trait for video record storage backends.
pub trait VideoStore: Send + Sync {
    /// Register a new record in pending state.
    fn create(&self, request: CreateVideoRequest) -> Result<VideoRecord, StoreError>;

    /// Register a record whose upload is still being moved into managed
    /// storage. Stays in uploading until [`Self::finish_upload`].
    fn create_uploading(&self, request: CreateVideoRequest) -> Result<VideoRecord, StoreError>;

    /// Mark an uploading record as fully uploaded (uploading -> pending).
    /// Fails with `InvalidState` from any other status.
    fn finish_upload(&self, id: &str) -> Result<VideoRecord, StoreError>;

    /// Get a record by ID.
    fn get(&self, id: &str) -> Result<Option<VideoRecord>, StoreError>;

    /// List records matching the filter, newest first.
    fn list(&self, filter: &VideoFilter) -> Result<Vec<VideoRecord>, StoreError>;

    /// Count records matching the filter.
    fn count(&self, filter: &VideoFilter) -> Result<i64, StoreError>;

    /// Claim a record for processing.
    ///
    /// Atomically transitions pending/failed to processing, stamping the
    /// start time and task ID and resetting progress and error. Fails with
    /// `InvalidState` when another run already owns the record, so at most
    /// one pipeline run is active per record.
    fn begin_processing(
        &self,
        id: &str,
        task_id: &str,
        quality: Option<QualityPreset>,
    ) -> Result<VideoRecord, StoreError>;

    /// Update progress percentage (clamped to 0-100) and stage label.
    fn update_progress(&self, id: &str, progress_pct: u8, stage: &str)
        -> Result<VideoRecord, StoreError>;

    /// Persist a successful probe: technical columns plus the full report.
    fn set_original_metadata(
        &self,
        id: &str,
        metadata: &OriginalMetadata,
    ) -> Result<VideoRecord, StoreError>;

    /// Attach a generated thumbnail, replacing any previous one.
    fn set_thumbnail(&self, id: &str, file: StoredFile) -> Result<VideoRecord, StoreError>;

    /// Attach the compressed rendition and its metadata.
    fn set_compression_result(
        &self,
        id: &str,
        file: StoredFile,
        metadata: &CompressionMetadata,
    ) -> Result<VideoRecord, StoreError>;

    /// Finish the current run: stamps completion time and wall time, sets
    /// the terminal status, and on failure increments the retry counter.
    fn complete(&self, id: &str, outcome: CompletionOutcome) -> Result<VideoRecord, StoreError>;

    /// Request cancellation of a processing record. Marks it failed with a
    /// cancellation message; the running pipeline observes the status
    /// change between stages.
    fn cancel(&self, id: &str) -> Result<VideoRecord, StoreError>;

    /// Permanently delete a record. Returns the deleted record so the
    /// caller can cascade deletion of its files.
    fn delete(&self, id: &str) -> Result<VideoRecord, StoreError>;
}
