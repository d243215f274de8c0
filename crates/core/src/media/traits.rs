//! Trait definitions for the media module.

use async_trait::async_trait;
use std::path::Path;
use tokio::sync::mpsc;

use super::error::MediaError;
use super::types::{
    CompressionOutcome, CompressionRequest, ProbeReport, StageProgress, ThumbnailInfo,
    SUPPORTED_INPUT_EXTENSIONS,
};

/// External media tooling behind one seam: probing, thumbnails, compression.
#[async_trait]
pub trait MediaTools: Send + Sync {
    /// Returns the name of this implementation.
    fn name(&self) -> &str;

    /// Probes a video file.
    ///
    /// Falls back to a degraded, filesystem-only report when the probe tool
    /// is missing; unsupported extensions and missing files are errors.
    async fn probe(&self, path: &Path) -> Result<ProbeReport, MediaError>;

    /// Extracts a single thumbnail frame into `output`.
    ///
    /// Returns `Ok(None)` when ffmpeg is unavailable; thumbnailing is never
    /// a reason to fail a pipeline run.
    async fn extract_thumbnail(
        &self,
        input: &Path,
        output: &Path,
    ) -> Result<Option<ThumbnailInfo>, MediaError>;

    /// Compresses a video according to the request's preset.
    async fn compress(
        &self,
        request: CompressionRequest,
    ) -> Result<CompressionOutcome, MediaError>;

    /// Compresses with stage-local progress reporting.
    ///
    /// If the receiver is dropped, compression continues without progress.
    async fn compress_with_progress(
        &self,
        request: CompressionRequest,
        progress_tx: mpsc::Sender<StageProgress>,
    ) -> Result<CompressionOutcome, MediaError>;

    /// Validates that the tools are available and configured.
    async fn validate(&self) -> Result<(), MediaError>;

    /// Returns the accepted input extensions.
    fn supported_input_extensions(&self) -> &[&str] {
        SUPPORTED_INPUT_EXTENSIONS
    }
}
