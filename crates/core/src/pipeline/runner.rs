//! Pipeline runner: drives a record through all processing stages.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::media::{CompressionRequest, MediaTools, StageProgress};
use crate::metrics;
use crate::record::{
    CompletionOutcome, CompressionMetadata, OriginalMetadata, ProcessingStatus, QualityPreset,
    StoredFile, VideoStore,
};
use crate::storage::{FileCategory, ObjectStore};

use super::config::PipelineConfig;
use super::error::PipelineError;
use super::progress::{
    compression_progress, ProgressMirror, ProgressReporter, COMPRESSION_CAP, COMPRESSION_START,
    METADATA_DONE, METADATA_START, STAGE_COMPRESSION, STAGE_METADATA, STAGE_THUMBNAIL,
    THUMBNAIL_DONE, THUMBNAIL_START,
};
use super::types::{RunOutcome, StageResults};

/// Runs records through probe, thumbnail, and compression stages.
///
/// Probe and thumbnail failures are recorded but do not abort the run;
/// a compression failure does. A record completes successfully only
/// when the probe succeeded and no stage recorded an error.
pub struct VideoPipeline {
    config: PipelineConfig,
    store: Arc<dyn VideoStore>,
    media: Arc<dyn MediaTools>,
    objects: Arc<dyn ObjectStore>,
}

impl VideoPipeline {
    /// Creates a new pipeline.
    pub fn new(
        config: PipelineConfig,
        store: Arc<dyn VideoStore>,
        media: Arc<dyn MediaTools>,
        objects: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            config,
            store,
            media,
            objects,
        }
    }

    pub fn store(&self) -> &Arc<dyn VideoStore> {
        &self.store
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs the full pipeline for one record.
    ///
    /// Claims the record first; returns `AlreadyProcessing` when another
    /// run owns it. Cancellation is observed between stages, never
    /// mid-stage.
    pub async fn run(
        &self,
        video_id: &str,
        task_id: &str,
        quality: Option<QualityPreset>,
    ) -> Result<RunOutcome, PipelineError> {
        self.run_mirrored(video_id, task_id, quality, None).await
    }

    /// Like [`Self::run`], with progress checkpoints also mirrored into
    /// the given sink under `task_id`.
    pub async fn run_mirrored(
        &self,
        video_id: &str,
        task_id: &str,
        quality: Option<QualityPreset>,
        mirror: Option<Arc<dyn ProgressMirror>>,
    ) -> Result<RunOutcome, PipelineError> {
        let start = Instant::now();
        let record = self.store.begin_processing(video_id, task_id, quality)?;
        let preset = record.target_quality;

        info!(video_id, task_id, preset = preset.as_str(), "Starting pipeline run");

        let input_path = self
            .objects
            .path(FileCategory::Originals, &record.original_file.name);
        let mut reporter = ProgressReporter::new(Arc::clone(&self.store), video_id);
        if let Some(mirror) = mirror {
            reporter = reporter.with_mirror(task_id, mirror);
        }
        let mut stages = StageResults::default();

        let work_dir = self.config.temp_dir.join(video_id);
        if let Err(e) = tokio::fs::create_dir_all(&work_dir).await {
            let error = format!("Failed to create working directory: {}", e);
            self.store
                .complete(video_id, CompletionOutcome::Failure { error: error.clone() })?;
            return Ok(RunOutcome::Failed {
                video_id: video_id.to_string(),
                error,
                retryable: true,
            });
        }

        // A retried record resumes from its last completed stage: artifacts
        // kept from an earlier attempt are not regenerated.
        let have_metadata = record.processing_metadata.original.is_some();
        let have_thumbnail = record.thumbnail.is_some();

        // Stage 1: metadata extraction. Non-fatal.
        reporter.report(METADATA_START, STAGE_METADATA);
        let probe_ok = if have_metadata {
            info!(video_id, "Metadata already extracted, skipping probe");
            true
        } else {
            let probe_timer = metrics::PROBE_DURATION.start_timer();
            let ok = match self.media.probe(&input_path).await {
                Ok(report) => {
                    if report.degraded {
                        warn!(video_id, "Probe degraded, only filesystem metadata available");
                    }
                    let metadata = OriginalMetadata::from(&report);
                    self.store.set_original_metadata(video_id, &metadata)?;
                    metrics::PROBES_TOTAL.with_label_values(&["ok"]).inc();
                    true
                }
                Err(e) => {
                    warn!(video_id, "Metadata extraction failed: {}", e);
                    metrics::PROBES_TOTAL.with_label_values(&["error"]).inc();
                    stages.metadata_error = Some(format!("Metadata extraction failed: {}", e));
                    false
                }
            };
            probe_timer.observe_duration();
            ok
        };
        reporter.report(METADATA_DONE, STAGE_METADATA);

        if self.cancellation_requested(video_id)? {
            self.cleanup_work_dir(&work_dir).await;
            return Ok(RunOutcome::Cancelled {
                video_id: video_id.to_string(),
            });
        }

        // Stage 2: thumbnail. Non-fatal; skipped entirely when the tool
        // is missing.
        reporter.report(THUMBNAIL_START, STAGE_THUMBNAIL);
        let thumbnail_name = format!("{}.jpg", video_id);
        let thumbnail_tmp = work_dir.join(&thumbnail_name);
        if have_thumbnail {
            info!(video_id, "Thumbnail already present, skipping");
        } else {
            match self.media.extract_thumbnail(&input_path, &thumbnail_tmp).await {
                Ok(Some(thumbnail)) => {
                    match self
                        .objects
                        .put_file(FileCategory::Thumbnails, &thumbnail_name, &thumbnail.path)
                        .await
                    {
                        Ok(stored) => {
                            let file = StoredFile {
                                name: thumbnail_name.clone(),
                                path: PathBuf::from(FileCategory::Thumbnails.as_str())
                                    .join(&thumbnail_name),
                                size_bytes: stored.size_bytes,
                            };
                            self.store.set_thumbnail(video_id, file)?;
                            metrics::THUMBNAILS_TOTAL.with_label_values(&["ok"]).inc();
                        }
                        Err(e) => {
                            warn!(video_id, "Failed to store thumbnail: {}", e);
                            metrics::THUMBNAILS_TOTAL.with_label_values(&["error"]).inc();
                            stages.thumbnail_error =
                                Some(format!("Thumbnail generation failed: {}", e));
                        }
                    }
                }
                Ok(None) => {
                    info!(video_id, "Thumbnail skipped, tool unavailable");
                    metrics::THUMBNAILS_TOTAL.with_label_values(&["skipped"]).inc();
                }
                Err(e) => {
                    warn!(video_id, "Thumbnail generation failed: {}", e);
                    metrics::THUMBNAILS_TOTAL.with_label_values(&["error"]).inc();
                    stages.thumbnail_error = Some(format!("Thumbnail generation failed: {}", e));
                }
            }
        }
        reporter.report(THUMBNAIL_DONE, STAGE_THUMBNAIL);

        if self.cancellation_requested(video_id)? {
            self.cleanup_work_dir(&work_dir).await;
            return Ok(RunOutcome::Cancelled {
                video_id: video_id.to_string(),
            });
        }

        // Stage 3: compression. Fatal on failure. A rendition kept from an
        // earlier attempt counts only when it matches the requested preset.
        reporter.report(COMPRESSION_START, STAGE_COMPRESSION);
        let output_name = format!("{}_{}.mp4", video_id, preset.as_str());
        let have_compressed = record
            .compressed_file
            .as_ref()
            .is_some_and(|f| f.name == output_name);

        if have_compressed {
            info!(video_id, "Compressed rendition already present, skipping");
        } else {
            let request = CompressionRequest {
                video_id: video_id.to_string(),
                input_path: input_path.clone(),
                output_path: work_dir.join(&output_name),
                preset,
            };

            let (progress_tx, mut progress_rx) = mpsc::channel::<StageProgress>(32);
            let stage_reporter = reporter.clone();
            let progress_task = tokio::spawn(async move {
                while let Some(update) = progress_rx.recv().await {
                    let overall = compression_progress(update.percent);
                    stage_reporter.report(overall, STAGE_COMPRESSION);
                }
            });

            let compression_timer = metrics::COMPRESSION_DURATION.start_timer();
            let compression = self.media.compress_with_progress(request, progress_tx).await;
            compression_timer.observe_duration();
            progress_task.abort();

            match compression {
                Ok(outcome) => {
                    metrics::COMPRESSIONS_TOTAL
                        .with_label_values(&[preset.as_str(), "ok"])
                        .inc();
                    match self
                        .objects
                        .put_file(FileCategory::Compressed, &output_name, &outcome.output_path)
                        .await
                    {
                        Ok(stored) => {
                            let file = StoredFile {
                                name: output_name.clone(),
                                path: PathBuf::from(FileCategory::Compressed.as_str())
                                    .join(&output_name),
                                size_bytes: stored.size_bytes,
                            };
                            let metadata = CompressionMetadata {
                                preset,
                                input_size_bytes: outcome.input_size_bytes,
                                output_size_bytes: outcome.output_size_bytes,
                                compression_ratio: outcome.compression_ratio,
                                elapsed_secs: outcome.elapsed_secs,
                                resolution: outcome.resolution.clone(),
                            };
                            self.store
                                .set_compression_result(video_id, file, &metadata)?;
                        }
                        Err(e) => {
                            stages.compression_error =
                                Some(format!("Compression failed: {}", e));
                        }
                    }
                }
                Err(e) => {
                    metrics::COMPRESSIONS_TOTAL
                        .with_label_values(&[preset.as_str(), "error"])
                        .inc();
                    warn!(video_id, "Compression failed: {}", e);
                    stages.compression_error = Some(format!("Compression failed: {}", e));
                    let error = stages.joined_errors();
                    self.store
                        .complete(video_id, CompletionOutcome::Failure { error: error.clone() })?;
                    metrics::VIDEOS_FAILED.inc();
                    self.cleanup_work_dir(&work_dir).await;
                    return Ok(RunOutcome::Failed {
                        video_id: video_id.to_string(),
                        error,
                        retryable: e.is_retryable(),
                    });
                }
            }
        }
        reporter.report(COMPRESSION_CAP, STAGE_COMPRESSION);

        self.cleanup_work_dir(&work_dir).await;

        // Finalize: success requires a good probe and zero stage errors.
        if probe_ok && !stages.has_errors() {
            self.store.complete(video_id, CompletionOutcome::Success)?;
            metrics::VIDEOS_COMPLETED.inc();
            let elapsed_secs = start.elapsed().as_secs_f64();
            info!(video_id, elapsed_secs, "Pipeline run completed");
            Ok(RunOutcome::Completed {
                video_id: video_id.to_string(),
                elapsed_secs,
            })
        } else {
            let error = stages.joined_errors();
            self.store
                .complete(video_id, CompletionOutcome::Failure { error: error.clone() })?;
            metrics::VIDEOS_FAILED.inc();
            info!(video_id, error, "Pipeline run failed");
            Ok(RunOutcome::Failed {
                video_id: video_id.to_string(),
                error,
                retryable: false,
            })
        }
    }

    /// Whether the record left the processing state while we were busy.
    fn cancellation_requested(&self, video_id: &str) -> Result<bool, PipelineError> {
        let record = self
            .store
            .get(video_id)?
            .ok_or_else(|| PipelineError::RecordNotFound(video_id.to_string()))?;
        Ok(record.status != ProcessingStatus::Processing)
    }

    async fn cleanup_work_dir(&self, work_dir: &std::path::Path) {
        if let Err(e) = tokio::fs::remove_dir_all(work_dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to clean up working directory {}: {}", work_dir.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{CreateVideoRequest, SqliteVideoStore, VideoRecord};
    use crate::testing::{MemoryObjectStore, MockMediaTools};
    use chrono::Utc;
    use tempfile::TempDir;

    fn test_request(name: &str) -> CreateVideoRequest {
        CreateVideoRequest {
            title: "Knee arthroscopy".to_string(),
            description: String::new(),
            tags: vec!["orthopedics".to_string()],
            recorded_at: Utc::now(),
            access_level: "restricted".to_string(),
            sensitive: true,
            original_file: StoredFile {
                name: name.to_string(),
                path: PathBuf::from("originals").join(name),
                size_bytes: 1_000_000,
            },
            target_quality: QualityPreset::Medium,
        }
    }

    struct Harness {
        pipeline: VideoPipeline,
        store: Arc<dyn VideoStore>,
        media: Arc<MockMediaTools>,
        _temp: TempDir,
    }

    fn harness(media: MockMediaTools) -> Harness {
        let temp = TempDir::new().unwrap();
        let store: Arc<dyn VideoStore> = Arc::new(SqliteVideoStore::in_memory().unwrap());
        let media = Arc::new(media);
        let objects: Arc<dyn ObjectStore> =
            Arc::new(MemoryObjectStore::new(temp.path().join("media")));
        let pipeline = VideoPipeline::new(
            PipelineConfig::default().with_temp_dir(temp.path().join("work")),
            Arc::clone(&store),
            media.clone() as Arc<dyn MediaTools>,
            objects,
        );
        Harness {
            pipeline,
            store,
            media,
            _temp: temp,
        }
    }

    fn fetch(store: &Arc<dyn VideoStore>, id: &str) -> VideoRecord {
        store.get(id).unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_successful_run() {
        let h = harness(MockMediaTools::healthy());
        let record = h.store.create(test_request("in.mp4")).unwrap();

        let outcome = h.pipeline.run(&record.id, "task-1", None).await.unwrap();
        assert!(outcome.is_success());

        let record = fetch(&h.store, &record.id);
        assert_eq!(record.status, ProcessingStatus::Completed);
        assert_eq!(record.progress_pct, 100);
        assert!(record.error.is_none());
        assert!(record.compressed_file.is_some());
        assert!(record.thumbnail.is_some());
        assert!(record.duration_secs.is_some());
        assert_eq!(record.retry_count, 0);
    }

    #[tokio::test]
    async fn test_probe_failure_is_non_fatal_but_fails_run() {
        let media = MockMediaTools::healthy();
        media.fail_probe("no streams found");
        let h = harness(media);
        let record = h.store.create(test_request("in.mp4")).unwrap();

        let outcome = h.pipeline.run(&record.id, "task-1", None).await.unwrap();
        assert!(!outcome.is_success());

        let record = fetch(&h.store, &record.id);
        assert_eq!(record.status, ProcessingStatus::Failed);
        assert!(record.error.unwrap().contains("Metadata extraction failed"));
        assert_eq!(record.retry_count, 1);
        // Compression still ran.
        assert!(record.compressed_file.is_some());
        assert_eq!(h.media.compress_calls(), 1);
    }

    #[tokio::test]
    async fn test_thumbnail_failure_joined_into_error() {
        let media = MockMediaTools::healthy();
        media.fail_probe("no streams");
        media.fail_thumbnail("decode error");
        let h = harness(media);
        let record = h.store.create(test_request("in.mp4")).unwrap();

        h.pipeline.run(&record.id, "task-1", None).await.unwrap();

        let record = fetch(&h.store, &record.id);
        let error = record.error.unwrap();
        assert!(error.contains("Metadata extraction failed"));
        assert!(error.contains("; "));
        assert!(error.contains("Thumbnail generation failed"));
    }

    #[tokio::test]
    async fn test_thumbnail_skip_does_not_fail_run() {
        let media = MockMediaTools::healthy();
        media.skip_thumbnails();
        let h = harness(media);
        let record = h.store.create(test_request("in.mp4")).unwrap();

        let outcome = h.pipeline.run(&record.id, "task-1", None).await.unwrap();
        assert!(outcome.is_success());

        let record = fetch(&h.store, &record.id);
        assert_eq!(record.status, ProcessingStatus::Completed);
        assert!(record.thumbnail.is_none());
    }

    #[tokio::test]
    async fn test_compression_failure_is_fatal() {
        let media = MockMediaTools::healthy();
        media.fail_compression("encoder exploded");
        let h = harness(media);
        let record = h.store.create(test_request("in.mp4")).unwrap();

        let outcome = h.pipeline.run(&record.id, "task-1", None).await.unwrap();
        match outcome {
            RunOutcome::Failed { error, .. } => {
                assert!(error.contains("Compression failed"));
            }
            other => panic!("expected failure, got {:?}", other),
        }

        let record = fetch(&h.store, &record.id);
        assert_eq!(record.status, ProcessingStatus::Failed);
        assert!(record.compressed_file.is_none());
        assert_eq!(record.retry_count, 1);
    }

    #[tokio::test]
    async fn test_second_claim_rejected() {
        let h = harness(MockMediaTools::healthy());
        let record = h.store.create(test_request("in.mp4")).unwrap();

        h.store
            .begin_processing(&record.id, "task-other", None)
            .unwrap();

        let result = h.pipeline.run(&record.id, "task-1", None).await;
        assert!(matches!(
            result,
            Err(PipelineError::AlreadyProcessing { .. })
        ));
    }

    #[tokio::test]
    async fn test_run_missing_record() {
        let h = harness(MockMediaTools::healthy());
        let result = h.pipeline.run("nope", "task-1", None).await;
        assert!(matches!(result, Err(PipelineError::RecordNotFound(_))));
    }

    #[tokio::test]
    async fn test_quality_override_applied() {
        let h = harness(MockMediaTools::healthy());
        let record = h.store.create(test_request("in.mp4")).unwrap();

        h.pipeline
            .run(&record.id, "task-1", Some(QualityPreset::Low))
            .await
            .unwrap();

        let record = fetch(&h.store, &record.id);
        assert_eq!(record.target_quality, QualityPreset::Low);
        assert!(record
            .compressed_file
            .unwrap()
            .name
            .ends_with("_low.mp4"));
    }

    #[tokio::test]
    async fn test_failed_record_can_be_retried() {
        let media = MockMediaTools::healthy();
        media.fail_compression("transient");
        let h = harness(media);
        let record = h.store.create(test_request("in.mp4")).unwrap();

        h.pipeline.run(&record.id, "task-1", None).await.unwrap();
        assert_eq!(fetch(&h.store, &record.id).status, ProcessingStatus::Failed);

        // Error was injected once; the second run succeeds.
        let outcome = h.pipeline.run(&record.id, "task-2", None).await.unwrap();
        assert!(outcome.is_success());

        let record = fetch(&h.store, &record.id);
        assert_eq!(record.status, ProcessingStatus::Completed);
        assert!(record.error.is_none());
        assert_eq!(record.retry_count, 1);
    }

    #[tokio::test]
    async fn test_retry_resumes_from_failed_stage() {
        let media = MockMediaTools::healthy();
        media.fail_compression("transient");
        let h = harness(media);
        let record = h.store.create(test_request("in.mp4")).unwrap();

        h.pipeline.run(&record.id, "task-1", None).await.unwrap();
        assert_eq!(h.media.probe_calls(), 1);
        assert_eq!(h.media.thumbnail_calls(), 1);

        // Metadata and thumbnail from the first attempt are reused; only
        // compression runs again.
        let outcome = h.pipeline.run(&record.id, "task-2", None).await.unwrap();
        assert!(outcome.is_success());
        assert_eq!(h.media.probe_calls(), 1);
        assert_eq!(h.media.thumbnail_calls(), 1);
        assert_eq!(h.media.compress_calls(), 2);
    }

    #[tokio::test]
    async fn test_retry_with_new_preset_recompresses() {
        let media = MockMediaTools::healthy();
        media.fail_probe("no streams");
        let h = harness(media);
        let record = h.store.create(test_request("in.mp4")).unwrap();

        h.pipeline.run(&record.id, "task-1", None).await.unwrap();
        assert_eq!(h.media.compress_calls(), 1);

        let outcome = h
            .pipeline
            .run(&record.id, "task-2", Some(QualityPreset::Low))
            .await
            .unwrap();
        assert!(outcome.is_success());
        assert_eq!(h.media.compress_calls(), 2);

        let record = fetch(&h.store, &record.id);
        assert!(record
            .compressed_file
            .unwrap()
            .name
            .ends_with("_low.mp4"));
    }
}
