//! Scriptable in-memory media tools for tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use tokio::sync::mpsc;

use crate::media::{
    CompressionOutcome, CompressionRequest, MediaError, MediaTools, ProbeReport, StageProgress,
    ThumbnailInfo,
};

#[derive(Default)]
struct MockState {
    probe_report: Option<ProbeReport>,
    next_probe_error: Option<String>,
    next_thumbnail_error: Option<String>,
    next_compression_error: Option<MediaError>,
    compression_errors_by_id: HashMap<String, MediaError>,
    skip_thumbnails: bool,
    compress_delay_ms: u64,
    probe_calls: usize,
    thumbnail_calls: usize,
    compress_calls: usize,
}

/// Media tools whose behavior is scripted per test.
///
/// Injected errors fire once and are then cleared, so a retry after a
/// scripted failure succeeds. Thumbnail skipping is persistent.
pub struct MockMediaTools {
    state: Mutex<MockState>,
}

impl MockMediaTools {
    /// Tools where every stage succeeds.
    pub fn healthy() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
        }
    }

    /// Overrides the report returned by `probe`.
    pub fn set_probe_report(&self, report: ProbeReport) {
        self.state.lock().unwrap().probe_report = Some(report);
    }

    /// Makes the next probe fail with the given message.
    pub fn fail_probe(&self, message: &str) {
        self.state.lock().unwrap().next_probe_error = Some(message.to_string());
    }

    /// Makes the next thumbnail extraction fail with the given message.
    pub fn fail_thumbnail(&self, message: &str) {
        self.state.lock().unwrap().next_thumbnail_error = Some(message.to_string());
    }

    /// Makes the next compression fail with a non-retryable error.
    pub fn fail_compression(&self, message: &str) {
        self.state.lock().unwrap().next_compression_error =
            Some(MediaError::compression_failed(message, None));
    }

    /// Makes compression fail once for the given video id only.
    pub fn fail_compression_for(&self, video_id: &str, message: &str) {
        self.state.lock().unwrap().compression_errors_by_id.insert(
            video_id.to_string(),
            MediaError::compression_failed(message, None),
        );
    }

    /// Makes the next compression fail with a retryable I/O error.
    pub fn fail_compression_retryable(&self, message: &str) {
        self.state.lock().unwrap().next_compression_error = Some(MediaError::Io(
            std::io::Error::new(std::io::ErrorKind::Other, message.to_string()),
        ));
    }

    /// Makes thumbnail extraction report the tool as unavailable.
    pub fn skip_thumbnails(&self) {
        self.state.lock().unwrap().skip_thumbnails = true;
    }

    /// Adds an artificial delay to compression.
    pub fn set_compress_delay_ms(&self, delay_ms: u64) {
        self.state.lock().unwrap().compress_delay_ms = delay_ms;
    }

    pub fn probe_calls(&self) -> usize {
        self.state.lock().unwrap().probe_calls
    }

    pub fn thumbnail_calls(&self) -> usize {
        self.state.lock().unwrap().thumbnail_calls
    }

    pub fn compress_calls(&self) -> usize {
        self.state.lock().unwrap().compress_calls
    }

    fn default_report(path: &Path) -> ProbeReport {
        ProbeReport {
            path: path.to_path_buf(),
            size_bytes: 1_000_000,
            duration_secs: 120.0,
            width: 1920,
            height: 1080,
            container_format: "mp4".to_string(),
            video_codec: Some("h264".to_string()),
            video_bitrate_kbps: Some(3000),
            audio_codec: Some("aac".to_string()),
            audio_bitrate_kbps: Some(128),
            audio_sample_rate: Some(48000),
            audio_channels: Some(2),
            degraded: false,
        }
    }

    async fn write_dummy(path: &Path, content: &[u8]) -> Result<(), MediaError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

#[async_trait]
impl MediaTools for MockMediaTools {
    fn name(&self) -> &str {
        "mock"
    }

    async fn probe(&self, path: &Path) -> Result<ProbeReport, MediaError> {
        let (error, report) = {
            let mut state = self.state.lock().unwrap();
            state.probe_calls += 1;
            (state.next_probe_error.take(), state.probe_report.clone())
        };
        if let Some(message) = error {
            return Err(MediaError::probe_failed(message));
        }
        Ok(report.unwrap_or_else(|| Self::default_report(path)))
    }

    async fn extract_thumbnail(
        &self,
        _input: &Path,
        output: &Path,
    ) -> Result<Option<ThumbnailInfo>, MediaError> {
        let (error, skip) = {
            let mut state = self.state.lock().unwrap();
            state.thumbnail_calls += 1;
            (state.next_thumbnail_error.take(), state.skip_thumbnails)
        };
        if let Some(message) = error {
            return Err(MediaError::thumbnail_failed(message));
        }
        if skip {
            return Ok(None);
        }

        Self::write_dummy(output, b"jpeg").await?;
        Ok(Some(ThumbnailInfo {
            path: output.to_path_buf(),
            size_bytes: 4,
            width: 320,
            height: 240,
        }))
    }

    async fn compress(
        &self,
        request: CompressionRequest,
    ) -> Result<CompressionOutcome, MediaError> {
        let (tx, _rx) = mpsc::channel(1);
        self.compress_with_progress(request, tx).await
    }

    async fn compress_with_progress(
        &self,
        request: CompressionRequest,
        progress_tx: mpsc::Sender<StageProgress>,
    ) -> Result<CompressionOutcome, MediaError> {
        let (error, delay_ms) = {
            let mut state = self.state.lock().unwrap();
            state.compress_calls += 1;
            let error = state
                .next_compression_error
                .take()
                .or_else(|| state.compression_errors_by_id.remove(&request.video_id));
            (error, state.compress_delay_ms)
        };
        if let Some(error) = error {
            return Err(error);
        }
        if delay_ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(delay_ms)).await;
        }

        // Simulate a handful of progress steps.
        for step in 1..=5u8 {
            let _ = progress_tx.try_send(StageProgress {
                video_id: request.video_id.clone(),
                percent: step as f32 * 20.0,
                time_secs: step as f64 * 24.0,
                speed: Some("2.0x".to_string()),
            });
        }

        Self::write_dummy(&request.output_path, b"compressed video").await?;
        let output_size_bytes = 16u64;
        let input_size_bytes = 1_000_000u64;

        Ok(CompressionOutcome {
            output_path: request.output_path.clone(),
            input_size_bytes,
            output_size_bytes,
            compression_ratio: output_size_bytes as f64 / input_size_bytes as f64,
            elapsed_secs: 0.05,
            resolution: request
                .preset
                .max_resolution()
                .map(|(w, h)| format!("{}x{}", w, h)),
        })
    }

    async fn validate(&self) -> Result<(), MediaError> {
        Ok(())
    }
}
