//! Testing utilities and mock implementations.
//!
//! Mock implementations of the media and storage traits, allowing
//! pipeline and server tests to run without ffmpeg or a media root.

mod memory_store;
mod mock_media;

pub use memory_store::MemoryObjectStore;
pub use mock_media::MockMediaTools;
