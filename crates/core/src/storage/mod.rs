//! Object storage for video files.
//!
//! Stores originals, compressed outputs, and thumbnails under stable
//! category-scoped names, behind a trait so tests can swap in memory.

mod config;
mod error;
mod fs_store;
mod traits;
mod types;

pub use config::StorageConfig;
pub use error::StorageError;
pub use fs_store::FsObjectStore;
pub use traits::ObjectStore;
pub use types::{FileCategory, StoredObject};
