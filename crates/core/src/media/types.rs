//! Types for the media module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::record::{OriginalMetadata, QualityPreset};

/// Video container extensions accepted for ingestion.
pub const SUPPORTED_INPUT_EXTENSIONS: &[&str] =
    &["mp4", "mov", "avi", "mkv", "webm", "flv", "wmv", "m4v"];

/// Information about a probed media file.
///
/// When the probe tool is unavailable this carries a filesystem-only
/// report: size and extension-derived format, zeros elsewhere, with
/// `degraded` set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeReport {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub duration_secs: f64,
    pub width: u32,
    pub height: u32,
    pub container_format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_codec: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_bitrate_kbps: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_codec: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_bitrate_kbps: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_sample_rate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_channels: Option<u8>,
    /// True when ffprobe was unavailable and only filesystem facts are known.
    #[serde(default)]
    pub degraded: bool,
}

impl From<&ProbeReport> for OriginalMetadata {
    fn from(report: &ProbeReport) -> Self {
        Self {
            duration_secs: report.duration_secs,
            width: report.width,
            height: report.height,
            video_codec: report.video_codec.clone(),
            video_bitrate_kbps: report.video_bitrate_kbps,
            audio_codec: report.audio_codec.clone(),
            audio_bitrate_kbps: report.audio_bitrate_kbps,
            audio_sample_rate: report.audio_sample_rate,
            audio_channels: report.audio_channels,
            container_format: report.container_format.clone(),
            size_bytes: report.size_bytes,
        }
    }
}

/// A compression job request.
#[derive(Debug, Clone)]
pub struct CompressionRequest {
    /// Video record ID, used for progress attribution.
    pub video_id: String,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub preset: QualityPreset,
}

/// Result of a successful compression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionOutcome {
    pub output_path: PathBuf,
    pub input_size_bytes: u64,
    pub output_size_bytes: u64,
    /// output / input size.
    pub compression_ratio: f64,
    pub elapsed_secs: f64,
    /// Resolution the preset resolved to, e.g. "1280x720"; None for passthrough.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
}

/// A generated thumbnail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThumbnailInfo {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub width: u32,
    pub height: u32,
}

/// Progress update emitted during compression (stage-local 0-100).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageProgress {
    pub video_id: String,
    /// Stage-local percentage (0.0 - 100.0).
    pub percent: f32,
    /// Media time processed so far, in seconds.
    pub time_secs: f64,
    /// Encoder speed (e.g. "1.5x") when reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<String>,
}

/// Returns the lowercase extension of a path, if any.
pub(crate) fn file_extension(path: &std::path::Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}
