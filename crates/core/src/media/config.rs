//! Configuration for the media tools.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the FFmpeg-based media tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Path to ffmpeg binary.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// Path to ffprobe binary.
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: PathBuf,

    /// Temporary directory for intermediate files.
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    /// Timeout for a single compression job in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Maximum accepted input file size in bytes.
    #[serde(default = "default_max_input_bytes")]
    pub max_input_bytes: u64,

    /// Offset into the video for the thumbnail frame, in seconds.
    #[serde(default = "default_thumbnail_offset")]
    pub thumbnail_offset_secs: f64,

    /// Thumbnail dimensions.
    #[serde(default = "default_thumbnail_width")]
    pub thumbnail_width: u32,
    #[serde(default = "default_thumbnail_height")]
    pub thumbnail_height: u32,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[serde(default = "default_log_level")]
    pub ffmpeg_log_level: String,
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe_path() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_temp_dir() -> PathBuf {
    std::env::temp_dir().join("clinivid-media")
}

fn default_timeout() -> u64 {
    3600 // 1 hour
}

fn default_max_input_bytes() -> u64 {
    2 * 1024 * 1024 * 1024 // 2 GiB
}

fn default_thumbnail_offset() -> f64 {
    1.0
}

fn default_thumbnail_width() -> u32 {
    320
}

fn default_thumbnail_height() -> u32 {
    240
}

fn default_log_level() -> String {
    "warning".to_string()
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
            temp_dir: default_temp_dir(),
            timeout_secs: default_timeout(),
            max_input_bytes: default_max_input_bytes(),
            thumbnail_offset_secs: default_thumbnail_offset(),
            thumbnail_width: default_thumbnail_width(),
            thumbnail_height: default_thumbnail_height(),
            ffmpeg_log_level: default_log_level(),
        }
    }
}

impl MediaConfig {
    /// Creates a config with custom ffmpeg/ffprobe paths.
    pub fn with_paths(ffmpeg_path: PathBuf, ffprobe_path: PathBuf) -> Self {
        Self {
            ffmpeg_path,
            ffprobe_path,
            ..Default::default()
        }
    }

    /// Sets the temp directory.
    pub fn with_temp_dir(mut self, temp_dir: PathBuf) -> Self {
        self.temp_dir = temp_dir;
        self
    }

    /// Sets the compression timeout in seconds.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Sets the input size cap in bytes.
    pub fn with_max_input_bytes(mut self, max_input_bytes: u64) -> Self {
        self.max_input_bytes = max_input_bytes;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MediaConfig::default();
        assert_eq!(config.ffmpeg_path, PathBuf::from("ffmpeg"));
        assert_eq!(config.ffprobe_path, PathBuf::from("ffprobe"));
        assert_eq!(config.timeout_secs, 3600);
        assert_eq!(config.max_input_bytes, 2 * 1024 * 1024 * 1024);
        assert_eq!(config.thumbnail_width, 320);
        assert_eq!(config.thumbnail_height, 240);
    }

    #[test]
    fn test_config_builder() {
        let config = MediaConfig::with_paths(
            PathBuf::from("/usr/local/bin/ffmpeg"),
            PathBuf::from("/usr/local/bin/ffprobe"),
        )
        .with_temp_dir(PathBuf::from("/tmp/test"))
        .with_timeout(600)
        .with_max_input_bytes(1024);

        assert_eq!(config.ffmpeg_path, PathBuf::from("/usr/local/bin/ffmpeg"));
        assert_eq!(config.temp_dir, PathBuf::from("/tmp/test"));
        assert_eq!(config.timeout_secs, 600);
        assert_eq!(config.max_input_bytes, 1024);
    }

    #[test]
    fn test_config_serialization() {
        let config = MediaConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: MediaConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.timeout_secs, config.timeout_secs);
        assert_eq!(parsed.thumbnail_offset_secs, config.thumbnail_offset_secs);
    }
}
