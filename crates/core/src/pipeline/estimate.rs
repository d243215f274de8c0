//! Processing time and output size estimates.

use serde::{Deserialize, Serialize};

use crate::record::QualityPreset;

/// Rough forecast for a compression run, used to set expectations in
/// the UI before a record is queued.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingEstimate {
    pub preset: QualityPreset,
    /// Expected wall time in seconds.
    pub estimated_secs: f64,
    /// Expected output size in bytes; None when it cannot be derived.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_output_bytes: Option<u64>,
}

/// Estimates a run from the source duration and size.
///
/// Wall time scales with duration by a per-preset multiplier; output
/// size is derived from the preset's target bitrates, or carried over
/// unchanged for passthrough.
pub fn estimate_processing(
    duration_secs: f64,
    input_size_bytes: u64,
    preset: QualityPreset,
) -> ProcessingEstimate {
    let estimated_secs = duration_secs * preset.time_multiplier();

    let estimated_output_bytes = match (preset.video_bitrate_kbps(), preset.audio_bitrate_kbps()) {
        (Some(video), Some(audio)) => {
            let total_kbps = (video + audio) as f64;
            Some((total_kbps * 1000.0 / 8.0 * duration_secs) as u64)
        }
        _ => {
            if preset == QualityPreset::Original {
                Some(input_size_bytes)
            } else {
                None
            }
        }
    };

    ProcessingEstimate {
        preset,
        estimated_secs,
        estimated_output_bytes,
    }
}
