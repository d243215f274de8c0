//! Video records: the central entity tracked by the pipeline.

mod sqlite_store;
mod store;
mod types;

pub use sqlite_store::SqliteVideoStore;
pub use store::{
    CompletionOutcome, CreateVideoRequest, StoreError, VideoFilter, VideoStore,
};
pub use types::{
    format_duration, format_file_size, CompressionMetadata, OriginalMetadata, ProcessingMetadata,
    ProcessingStatus, QualityPreset, StoredFile, VideoRecord,
};
