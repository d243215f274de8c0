//! Media tool wrappers: probing, thumbnail extraction, compression.

mod config;
mod error;
mod ffmpeg;
mod traits;
mod types;

pub use config::MediaConfig;
pub use error::MediaError;
pub use ffmpeg::FfmpegTools;
pub use traits::MediaTools;
pub use types::{
    CompressionOutcome, CompressionRequest, ProbeReport, StageProgress, ThumbnailInfo,
    SUPPORTED_INPUT_EXTENSIONS,
};
