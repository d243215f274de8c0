//! Error types for the media module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while probing or transcoding media.
#[derive(Debug, Error)]
pub enum MediaError {
    /// FFmpeg binary not found.
    #[error("FFmpeg not found at path: {path}")]
    FfmpegNotFound { path: PathBuf },

    /// FFprobe binary not found.
    #[error("FFprobe not found at path: {path}")]
    FfprobeNotFound { path: PathBuf },

    /// Input file not found.
    #[error("Input file not found: {path}")]
    InputNotFound { path: PathBuf },

    /// Input extension is not a supported video format.
    #[error("Unsupported video format: {extension}")]
    UnsupportedFormat { extension: String },

    /// Input exceeds the configured size cap.
    #[error("Input file too large: {size_bytes} bytes (max {max_bytes})")]
    FileTooLarge { size_bytes: u64, max_bytes: u64 },

    /// ffprobe ran but reported an error.
    #[error("Failed to probe media file: {reason}")]
    ProbeFailed { reason: String },

    /// ffprobe output could not be parsed.
    #[error("Failed to parse media info: {reason}")]
    ParseError { reason: String },

    /// Thumbnail extraction failed.
    #[error("Thumbnail extraction failed: {reason}")]
    ThumbnailFailed { reason: String },

    /// Compression process failed.
    #[error("Compression failed: {reason}")]
    CompressionFailed {
        reason: String,
        stderr: Option<String>,
    },

    /// Compression timed out.
    #[error("Compression timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    pub fn probe_failed(reason: impl Into<String>) -> Self {
        Self::ProbeFailed {
            reason: reason.into(),
        }
    }

    pub fn thumbnail_failed(reason: impl Into<String>) -> Self {
        Self::ThumbnailFailed {
            reason: reason.into(),
        }
    }

    pub fn compression_failed(reason: impl Into<String>, stderr: Option<String>) -> Self {
        Self::CompressionFailed {
            reason: reason.into(),
            stderr,
        }
    }

    /// Whether the failure came from a missing external tool.
    pub fn is_tool_missing(&self) -> bool {
        matches!(
            self,
            Self::FfmpegNotFound { .. } | Self::FfprobeNotFound { .. }
        )
    }

    /// Whether a retry of the whole run could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Io(_))
    }
}
