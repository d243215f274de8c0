//! Types for video records and quality presets.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Processing lifecycle state of a video record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    /// Registered, waiting to be picked up.
    Pending,
    /// Original file still being received.
    Uploading,
    /// A pipeline run owns this record.
    Processing,
    /// Pipeline finished successfully.
    Completed,
    /// Pipeline finished with a fatal error (or was cancelled).
    Failed,
}

impl ProcessingStatus {
    /// Returns the snake_case string used in storage and APIs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Uploading => "uploading",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parses the storage representation back into a status.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "uploading" => Some(Self::Uploading),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Whether a pipeline run may claim a record in this state.
    pub fn can_begin_processing(&self) -> bool {
        matches!(self, Self::Pending | Self::Failed)
    }

    /// Whether this state is terminal for the current attempt.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Target quality preset for compression.
///
/// The parameter table is a compatibility contract: records processed by
/// earlier deployments carry these exact resolutions and bitrates in their
/// compression metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityPreset {
    /// Re-mux only, keep original resolution and bitrate.
    Original,
    /// 1080p, 4000k video / 128k audio.
    High,
    /// 720p, 2500k video / 128k audio. Default.
    Medium,
    /// 480p, 1000k video / 96k audio.
    Low,
    /// 360p, 500k video / 64k audio, for bandwidth-constrained review.
    Mobile,
}

impl Default for QualityPreset {
    fn default() -> Self {
        Self::Medium
    }
}

impl QualityPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Original => "original",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Mobile => "mobile",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "original" => Some(Self::Original),
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            "mobile" => Some(Self::Mobile),
            _ => None,
        }
    }

    /// Target resolution cap, None for passthrough.
    pub fn max_resolution(&self) -> Option<(u32, u32)> {
        match self {
            Self::Original => None,
            Self::High => Some((1920, 1080)),
            Self::Medium => Some((1280, 720)),
            Self::Low => Some((854, 480)),
            Self::Mobile => Some((640, 360)),
        }
    }

    /// Target video bitrate in kbps, None for passthrough.
    pub fn video_bitrate_kbps(&self) -> Option<u32> {
        match self {
            Self::Original => None,
            Self::High => Some(4000),
            Self::Medium => Some(2500),
            Self::Low => Some(1000),
            Self::Mobile => Some(500),
        }
    }

    /// Target audio bitrate in kbps, None for passthrough.
    pub fn audio_bitrate_kbps(&self) -> Option<u32> {
        match self {
            Self::Original => None,
            Self::High | Self::Medium => Some(128),
            Self::Low => Some(96),
            Self::Mobile => Some(64),
        }
    }

    /// Constant rate factor for libx264, None for passthrough.
    pub fn crf(&self) -> Option<u8> {
        match self {
            Self::Original => None,
            Self::High => Some(20),
            Self::Medium => Some(23),
            Self::Low => Some(26),
            Self::Mobile => Some(28),
        }
    }

    /// Human-readable description for UIs.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Original => "Original quality (no re-encoding)",
            Self::High => "High quality (1080p)",
            Self::Medium => "Medium quality (720p)",
            Self::Low => "Low quality (480p)",
            Self::Mobile => "Mobile quality (360p)",
        }
    }

    /// Rough wall-time multiplier relative to media duration, used for
    /// processing estimates.
    pub fn time_multiplier(&self) -> f64 {
        match self {
            Self::Original => 0.1,
            Self::High => 1.5,
            Self::Medium => 1.0,
            Self::Low => 0.7,
            Self::Mobile => 0.5,
        }
    }
}

/// A file handle owned by a video record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFile {
    /// Original or generated file name.
    pub name: String,
    /// Path relative to the media root.
    pub path: PathBuf,
    /// Size in bytes.
    pub size_bytes: u64,
}

/// Full probe report captured when metadata extraction succeeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OriginalMetadata {
    pub duration_secs: f64,
    pub width: u32,
    pub height: u32,
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
    pub container_format: String,
    pub size_bytes: u64,
}

/// Outcome of the compression stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressionMetadata {
    pub preset: QualityPreset,
    pub input_size_bytes: u64,
    pub output_size_bytes: u64,
    /// output size / input size, in (0, 1] for effective compression.
    pub compression_ratio: f64,
    pub elapsed_secs: f64,
    /// Resolution the encoder actually produced, e.g. "1280x720".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
}

/// Per-stage reports attached to a record, each filled when its stage
/// completes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original: Option<OriginalMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression: Option<CompressionMetadata>,
}

impl ProcessingMetadata {
    pub fn is_empty(&self) -> bool {
        self.original.is_none() && self.compression.is_none()
    }
}

/// A video record: descriptive fields, owned files, technical metadata,
/// and processing state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoRecord {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub recorded_at: DateTime<Utc>,
    #[serde(default)]
    pub access_level: String,
    #[serde(default)]
    pub sensitive: bool,

    pub original_file: StoredFile,
    pub compressed_file: Option<StoredFile>,
    pub thumbnail: Option<StoredFile>,
    pub target_quality: QualityPreset,

    // Technical metadata, null until the probe stage succeeds.
    pub duration_secs: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub video_codec: Option<String>,
    pub video_bitrate_kbps: Option<u32>,
    pub container_format: Option<String>,

    // Processing state.
    pub status: ProcessingStatus,
    pub progress_pct: u8,
    pub stage: String,
    pub error: Option<String>,
    pub retry_count: u32,
    pub task_id: Option<String>,
    pub processing_started_at: Option<DateTime<Utc>>,
    pub processing_completed_at: Option<DateTime<Utc>>,
    pub processing_time_secs: Option<f64>,
    pub compression_ratio: Option<f64>,

    #[serde(default)]
    pub processing_metadata: ProcessingMetadata,
}

impl VideoRecord {
    /// Original file size in megabytes, rounded to two decimals.
    pub fn file_size_mb(&self) -> f64 {
        (self.original_file.size_bytes as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0
    }

    /// Path clients should play: the compressed rendition when available,
    /// the original otherwise.
    pub fn playback_path(&self) -> &PathBuf {
        self.compressed_file
            .as_ref()
            .map(|f| &f.path)
            .unwrap_or(&self.original_file.path)
    }

    /// Duration as "MM:SS" / "H:MM:SS", or None before the probe ran.
    pub fn formatted_duration(&self) -> Option<String> {
        self.duration_secs.map(format_duration)
    }

    /// Wall time of the last processing run, formatted.
    pub fn formatted_processing_time(&self) -> Option<String> {
        self.processing_time_secs.map(format_duration)
    }

    /// Subject age in whole years at the recording date, given an
    /// externally-owned birth date.
    pub fn age_at_recording(&self, date_of_birth: NaiveDate) -> Option<u32> {
        let recorded = self.recorded_at.date_naive();
        if recorded < date_of_birth {
            return None;
        }
        recorded.years_since(date_of_birth)
    }
}

/// Formats a duration in seconds as "MM:SS" (or "H:MM:SS" above an hour).
pub fn format_duration(secs: f64) -> String {
    let total = secs.max(0.0).round() as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

/// Formats a byte count with a binary unit suffix.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
