//! FFmpeg-based media tools implementation.

use async_trait::async_trait;
use regex_lite::Regex;
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};
use tracing::warn;

use crate::record::QualityPreset;

use super::config::MediaConfig;
use super::error::MediaError;
use super::traits::MediaTools;
use super::types::{
    file_extension, CompressionOutcome, CompressionRequest, ProbeReport, StageProgress,
    ThumbnailInfo, SUPPORTED_INPUT_EXTENSIONS,
};

/// FFmpeg/ffprobe-backed implementation of [`MediaTools`].
pub struct FfmpegTools {
    config: MediaConfig,
}

impl FfmpegTools {
    /// Creates new media tools with the given configuration.
    pub fn new(config: MediaConfig) -> Self {
        Self { config }
    }

    /// Creates media tools with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(MediaConfig::default())
    }

    /// Rejects unsupported extensions, missing files, and oversized inputs.
    async fn check_input(&self, path: &Path) -> Result<u64, MediaError> {
        let extension = file_extension(path).unwrap_or_default();
        if !SUPPORTED_INPUT_EXTENSIONS.contains(&extension.as_str()) {
            return Err(MediaError::UnsupportedFormat { extension });
        }

        let meta = tokio::fs::metadata(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                MediaError::InputNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                MediaError::Io(e)
            }
        })?;

        if meta.len() > self.config.max_input_bytes {
            return Err(MediaError::FileTooLarge {
                size_bytes: meta.len(),
                max_bytes: self.config.max_input_bytes,
            });
        }

        Ok(meta.len())
    }

    /// Builds ffmpeg arguments for a preset-driven compression.
    fn build_compress_args(
        &self,
        input_path: &Path,
        output_path: &Path,
        preset: QualityPreset,
    ) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-i".to_string(),
            input_path.to_string_lossy().to_string(),
        ];

        if preset == QualityPreset::Original {
            // Re-mux without re-encoding.
            args.extend(["-c:v".to_string(), "copy".to_string()]);
            args.extend(["-c:a".to_string(), "copy".to_string()]);
        } else {
            args.extend(["-c:v".to_string(), "libx264".to_string()]);
            args.extend(["-preset".to_string(), "medium".to_string()]);

            if let Some(crf) = preset.crf() {
                args.extend(["-crf".to_string(), crf.to_string()]);
            }
            if let Some(bitrate) = preset.video_bitrate_kbps() {
                args.extend(["-b:v".to_string(), format!("{}k", bitrate)]);
            }
            if let Some((width, height)) = preset.max_resolution() {
                // Scale down only, preserving aspect ratio.
                args.extend([
                    "-vf".to_string(),
                    format!(
                        "scale='min({},iw)':'min({},ih)':force_original_aspect_ratio=decrease",
                        width, height
                    ),
                ]);
            }

            args.extend(["-c:a".to_string(), "aac".to_string()]);
            if let Some(bitrate) = preset.audio_bitrate_kbps() {
                args.extend(["-b:a".to_string(), format!("{}k", bitrate)]);
            }
        }

        // Streaming-friendly MP4 layout.
        args.extend(["-movflags".to_string(), "+faststart".to_string()]);

        args.extend([
            "-loglevel".to_string(),
            self.config.ffmpeg_log_level.clone(),
            "-progress".to_string(),
            "pipe:2".to_string(),
        ]);

        args.push(output_path.to_string_lossy().to_string());
        args
    }

    /// Builds ffmpeg arguments for single-frame thumbnail extraction.
    fn build_thumbnail_args(&self, input_path: &Path, output_path: &Path) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-ss".to_string(),
            format!("{}", self.config.thumbnail_offset_secs),
            "-i".to_string(),
            input_path.to_string_lossy().to_string(),
            "-vframes".to_string(),
            "1".to_string(),
            "-vcodec".to_string(),
            "mjpeg".to_string(),
            "-s".to_string(),
            format!(
                "{}x{}",
                self.config.thumbnail_width, self.config.thumbnail_height
            ),
            "-loglevel".to_string(),
            self.config.ffmpeg_log_level.clone(),
            output_path.to_string_lossy().to_string(),
        ]
    }

    /// Parses ffprobe JSON output into a ProbeReport.
    fn parse_probe_output(
        path: &Path,
        size_bytes: u64,
        output: &str,
    ) -> Result<ProbeReport, MediaError> {
        #[derive(Deserialize)]
        struct ProbeOutput {
            format: ProbeFormat,
            streams: Vec<ProbeStream>,
        }

        #[derive(Deserialize)]
        struct ProbeFormat {
            format_name: String,
            duration: Option<String>,
            size: Option<String>,
        }

        #[derive(Deserialize)]
        struct ProbeStream {
            codec_type: String,
            codec_name: Option<String>,
            bit_rate: Option<String>,
            sample_rate: Option<String>,
            channels: Option<u8>,
            width: Option<u32>,
            height: Option<u32>,
        }

        let probe: ProbeOutput =
            serde_json::from_str(output).map_err(|e| MediaError::ParseError {
                reason: format!("Failed to parse ffprobe output: {}", e),
            })?;

        let duration_secs = probe
            .format
            .duration
            .as_ref()
            .and_then(|d| d.parse::<f64>().ok())
            .unwrap_or(0.0);

        let reported_size = probe
            .format
            .size
            .as_ref()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(size_bytes);

        let video_stream = probe.streams.iter().find(|s| s.codec_type == "video");
        let audio_stream = probe.streams.iter().find(|s| s.codec_type == "audio");

        let format_name = probe
            .format
            .format_name
            .split(',')
            .next()
            .unwrap_or("unknown");

        Ok(ProbeReport {
            path: path.to_path_buf(),
            size_bytes: reported_size,
            duration_secs,
            width: video_stream.and_then(|s| s.width).unwrap_or(0),
            height: video_stream.and_then(|s| s.height).unwrap_or(0),
            container_format: format_name.to_string(),
            video_codec: video_stream.and_then(|s| s.codec_name.clone()),
            video_bitrate_kbps: video_stream
                .and_then(|s| s.bit_rate.as_ref())
                .and_then(|b| b.parse::<u32>().ok())
                .map(|b| b / 1000),
            audio_codec: audio_stream.and_then(|s| s.codec_name.clone()),
            audio_bitrate_kbps: audio_stream
                .and_then(|s| s.bit_rate.as_ref())
                .and_then(|b| b.parse::<u32>().ok())
                .map(|b| b / 1000),
            audio_sample_rate: audio_stream
                .and_then(|s| s.sample_rate.as_ref())
                .and_then(|r| r.parse::<u32>().ok()),
            audio_channels: audio_stream.and_then(|s| s.channels),
            degraded: false,
        })
    }

    /// Filesystem-only report used when ffprobe is not installed.
    fn degraded_report(path: &Path, size_bytes: u64) -> ProbeReport {
        ProbeReport {
            path: path.to_path_buf(),
            size_bytes,
            duration_secs: 0.0,
            width: 0,
            height: 0,
            container_format: file_extension(path).unwrap_or_else(|| "unknown".to_string()),
            video_codec: None,
            video_bitrate_kbps: None,
            audio_codec: None,
            audio_bitrate_kbps: None,
            audio_sample_rate: None,
            audio_channels: None,
            degraded: true,
        }
    }

    /// Runs the compression with optional progress reporting.
    async fn run_compression(
        &self,
        request: &CompressionRequest,
        progress_tx: Option<mpsc::Sender<StageProgress>>,
    ) -> Result<CompressionOutcome, MediaError> {
        let start = Instant::now();
        let input_size_bytes = self.check_input(&request.input_path).await?;

        if let Some(parent) = request.output_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Duration drives percentage; a degraded probe just means no
        // percentages on the wire.
        let duration_secs = self
            .probe(&request.input_path)
            .await
            .ok()
            .filter(|r| r.duration_secs > 0.0)
            .map(|r| r.duration_secs);

        let args = self.build_compress_args(&request.input_path, &request.output_path, request.preset);

        let mut child = Command::new(&self.config.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    MediaError::FfmpegNotFound {
                        path: self.config.ffmpeg_path.clone(),
                    }
                } else {
                    MediaError::Io(e)
                }
            })?;

        let stderr = child.stderr.take().expect("stderr should be captured");
        let mut reader = BufReader::new(stderr).lines();

        let mut current_time = 0.0;
        let mut current_speed = None;
        let time_regex = Regex::new(r"out_time_ms=(\d+)").ok();
        let speed_regex = Regex::new(r"speed=(\d+\.?\d*)x").ok();

        let timeout_duration = Duration::from_secs(self.config.timeout_secs);
        let result = timeout(timeout_duration, async {
            let mut last_progress_send = Instant::now();
            let progress_interval = Duration::from_millis(500);
            let mut error_output = String::new();

            while let Ok(Some(line)) = reader.next_line().await {
                if line.contains("Error") || line.contains("error") {
                    error_output.push_str(&line);
                    error_output.push('\n');
                }

                if let Some(ref re) = time_regex {
                    if let Some(caps) = re.captures(&line) {
                        if let Some(ms_str) = caps.get(1) {
                            if let Ok(ms) = ms_str.as_str().parse::<f64>() {
                                // out_time_ms is actually microseconds.
                                current_time = ms / 1_000_000.0;
                            }
                        }
                    }
                }

                if let Some(ref re) = speed_regex {
                    if let Some(caps) = re.captures(&line) {
                        if let Some(speed_str) = caps.get(1) {
                            current_speed = Some(format!("{}x", speed_str.as_str()));
                        }
                    }
                }

                if let Some(ref tx) = progress_tx {
                    if last_progress_send.elapsed() >= progress_interval {
                        let percent = match duration_secs {
                            Some(dur) => (current_time / dur * 100.0).min(100.0) as f32,
                            None => 0.0,
                        };

                        let progress = StageProgress {
                            video_id: request.video_id.clone(),
                            percent,
                            time_secs: current_time,
                            speed: current_speed.clone(),
                        };

                        // Non-blocking: a slow consumer never stalls the encoder.
                        let _ = tx.try_send(progress);
                        last_progress_send = Instant::now();
                    }
                }
            }

            let status = child.wait().await?;
            Ok::<(std::process::ExitStatus, String), std::io::Error>((status, error_output))
        })
        .await;

        match result {
            Ok(Ok((status, error_output))) => {
                if !status.success() {
                    let _ = tokio::fs::remove_file(&request.output_path).await;
                    return Err(MediaError::compression_failed(
                        format!("FFmpeg exited with code: {:?}", status.code()),
                        if error_output.is_empty() {
                            None
                        } else {
                            Some(error_output)
                        },
                    ));
                }
            }
            Ok(Err(e)) => {
                let _ = tokio::fs::remove_file(&request.output_path).await;
                return Err(MediaError::Io(e));
            }
            Err(_) => {
                let _ = child.kill().await;
                let _ = tokio::fs::remove_file(&request.output_path).await;
                return Err(MediaError::Timeout {
                    timeout_secs: self.config.timeout_secs,
                });
            }
        }

        let output_meta = tokio::fs::metadata(&request.output_path)
            .await
            .map_err(|_| MediaError::compression_failed("Output file not created", None))?;

        let output_size_bytes = output_meta.len();
        let compression_ratio = if input_size_bytes > 0 {
            output_size_bytes as f64 / input_size_bytes as f64
        } else {
            0.0
        };

        Ok(CompressionOutcome {
            output_path: request.output_path.clone(),
            input_size_bytes,
            output_size_bytes,
            compression_ratio,
            elapsed_secs: start.elapsed().as_secs_f64(),
            resolution: request
                .preset
                .max_resolution()
                .map(|(w, h)| format!("{}x{}", w, h)),
        })
    }
}

#[async_trait]
impl MediaTools for FfmpegTools {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn probe(&self, path: &Path) -> Result<ProbeReport, MediaError> {
        let size_bytes = self.check_input(path).await?;

        let output = match Command::new(&self.config.ffprobe_path)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .output()
            .await
        {
            Ok(output) => output,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(
                    path = %path.display(),
                    "ffprobe not available, returning filesystem-only metadata"
                );
                return Ok(Self::degraded_report(path, size_bytes));
            }
            Err(e) => return Err(MediaError::Io(e)),
        };

        if !output.status.success() {
            return Err(MediaError::probe_failed(format!(
                "ffprobe failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Self::parse_probe_output(path, size_bytes, &stdout)
    }

    async fn extract_thumbnail(
        &self,
        input: &Path,
        output: &Path,
    ) -> Result<Option<ThumbnailInfo>, MediaError> {
        self.check_input(input).await?;

        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let args = self.build_thumbnail_args(input, output);
        let result = match Command::new(&self.config.ffmpeg_path)
            .args(&args)
            .output()
            .await
        {
            Ok(result) => result,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(
                    input = %input.display(),
                    "ffmpeg not available, skipping thumbnail"
                );
                return Ok(None);
            }
            Err(e) => return Err(MediaError::Io(e)),
        };

        if !result.status.success() {
            let _ = tokio::fs::remove_file(output).await;
            return Err(MediaError::thumbnail_failed(format!(
                "ffmpeg exited with code {:?}: {}",
                result.status.code(),
                String::from_utf8_lossy(&result.stderr)
            )));
        }

        let meta = tokio::fs::metadata(output)
            .await
            .map_err(|_| MediaError::thumbnail_failed("Thumbnail file not created"))?;

        Ok(Some(ThumbnailInfo {
            path: output.to_path_buf(),
            size_bytes: meta.len(),
            width: self.config.thumbnail_width,
            height: self.config.thumbnail_height,
        }))
    }

    async fn compress(
        &self,
        request: CompressionRequest,
    ) -> Result<CompressionOutcome, MediaError> {
        self.run_compression(&request, None).await
    }

    async fn compress_with_progress(
        &self,
        request: CompressionRequest,
        progress_tx: mpsc::Sender<StageProgress>,
    ) -> Result<CompressionOutcome, MediaError> {
        self.run_compression(&request, Some(progress_tx)).await
    }

    async fn validate(&self) -> Result<(), MediaError> {
        let ffmpeg_result = Command::new(&self.config.ffmpeg_path)
            .arg("-version")
            .output()
            .await;

        if let Err(e) = ffmpeg_result {
            if e.kind() == std::io::ErrorKind::NotFound {
                return Err(MediaError::FfmpegNotFound {
                    path: self.config.ffmpeg_path.clone(),
                });
            }
            return Err(MediaError::Io(e));
        }

        let ffprobe_result = Command::new(&self.config.ffprobe_path)
            .arg("-version")
            .output()
            .await;

        if let Err(e) = ffprobe_result {
            if e.kind() == std::io::ErrorKind::NotFound {
                return Err(MediaError::FfprobeNotFound {
                    path: self.config.ffprobe_path.clone(),
                });
            }
            return Err(MediaError::Io(e));
        }

        tokio::fs::create_dir_all(&self.config.temp_dir).await?;

        Ok(())
    }
}
