//! Batch processing over many records.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::record::{ProcessingStatus, QualityPreset, VideoFilter};

use super::error::PipelineError;
use super::runner::VideoPipeline;
use super::types::RunOutcome;

/// Outcome of a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub results: Vec<RunOutcome>,
}

/// Selects eligible records and runs them through the pipeline.
pub struct BatchCoordinator {
    pipeline: Arc<VideoPipeline>,
    /// Records with this many failed runs are no longer picked up.
    max_retries: u32,
}

impl BatchCoordinator {
    pub fn new(pipeline: Arc<VideoPipeline>) -> Self {
        Self {
            pipeline,
            max_retries: 3,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// IDs eligible for a batch run: pending records, plus failed records
    /// that have retries left. Capped at the configured batch limit.
    pub fn candidates(&self) -> Result<Vec<String>, PipelineError> {
        let store = self.pipeline.store();
        let limit = self.pipeline.config().batch_limit;

        let mut ids = Vec::new();
        let pending = store.list(
            &VideoFilter::new()
                .with_status(ProcessingStatus::Pending.as_str())
                .with_limit(limit as i64),
        )?;
        ids.extend(pending.into_iter().map(|r| r.id));

        if ids.len() < limit {
            let failed = store.list(
                &VideoFilter::new()
                    .with_status(ProcessingStatus::Failed.as_str())
                    .with_limit(limit as i64),
            )?;
            ids.extend(
                failed
                    .into_iter()
                    .filter(|r| r.retry_count < self.max_retries)
                    .map(|r| r.id),
            );
        }

        ids.truncate(limit);
        Ok(ids)
    }

    /// Runs the given records one after another, optionally forcing a
    /// shared quality preset.
    ///
    /// Claim conflicts and missing records are folded into the results as
    /// failures rather than aborting the batch.
    pub async fn process(
        &self,
        video_ids: &[String],
        quality: Option<QualityPreset>,
        task_id_prefix: &str,
    ) -> BatchOutcome {
        let mut results = Vec::with_capacity(video_ids.len());

        for (idx, video_id) in video_ids.iter().enumerate() {
            let task_id = format!("{}-{}", task_id_prefix, idx);
            let outcome = match self.pipeline.run(video_id, &task_id, quality).await {
                Ok(outcome) => outcome,
                Err(e) => RunOutcome::Failed {
                    video_id: video_id.clone(),
                    error: e.to_string(),
                    retryable: false,
                },
            };
            results.push(outcome);
        }

        let successful = results.iter().filter(|r| r.is_success()).count();
        let outcome = BatchOutcome {
            total: results.len(),
            successful,
            failed: results.len() - successful,
            results,
        };
        info!(
            total = outcome.total,
            successful = outcome.successful,
            failed = outcome.failed,
            "Batch run finished"
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaTools;
    use crate::pipeline::PipelineConfig;
    use crate::record::{
        CreateVideoRequest, QualityPreset, SqliteVideoStore, StoredFile, VideoStore,
    };
    use crate::storage::ObjectStore;
    use crate::testing::{MemoryObjectStore, MockMediaTools};
    use chrono::Utc;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn test_request(title: &str) -> CreateVideoRequest {
        CreateVideoRequest {
            title: title.to_string(),
            description: String::new(),
            tags: vec![],
            recorded_at: Utc::now(),
            access_level: "restricted".to_string(),
            sensitive: false,
            original_file: StoredFile {
                name: format!("{}.mp4", title),
                path: PathBuf::from("originals").join(format!("{}.mp4", title)),
                size_bytes: 500_000,
            },
            target_quality: QualityPreset::Medium,
        }
    }

    struct Harness {
        coordinator: BatchCoordinator,
        store: Arc<dyn VideoStore>,
        media: Arc<MockMediaTools>,
        _temp: TempDir,
    }

    fn harness(media: MockMediaTools, batch_limit: usize) -> Harness {
        let temp = TempDir::new().unwrap();
        let store: Arc<dyn VideoStore> = Arc::new(SqliteVideoStore::in_memory().unwrap());
        let media = Arc::new(media);
        let objects: Arc<dyn ObjectStore> =
            Arc::new(MemoryObjectStore::new(temp.path().join("media")));
        let pipeline = Arc::new(VideoPipeline::new(
            PipelineConfig::default()
                .with_temp_dir(temp.path().join("work"))
                .with_batch_limit(batch_limit),
            Arc::clone(&store),
            media.clone() as Arc<dyn MediaTools>,
            objects,
        ));
        Harness {
            coordinator: BatchCoordinator::new(pipeline),
            store,
            media,
            _temp: temp,
        }
    }

    #[tokio::test]
    async fn test_batch_processes_all_pending() {
        let h = harness(MockMediaTools::healthy(), 50);
        for name in ["a", "b", "c"] {
            h.store.create(test_request(name)).unwrap();
        }

        let ids = h.coordinator.candidates().unwrap();
        assert_eq!(ids.len(), 3);

        let outcome = h.coordinator.process(&ids, None, "batch-1").await;
        assert_eq!(outcome.total, 3);
        assert_eq!(outcome.successful, 3);
        assert_eq!(outcome.failed, 0);
    }

    #[tokio::test]
    async fn test_batch_aggregates_mixed_outcomes() {
        let h = harness(MockMediaTools::healthy(), 50);
        let mut ids = Vec::new();
        for name in ["a", "b", "c", "d", "e"] {
            ids.push(h.store.create(test_request(name)).unwrap().id);
        }
        h.media.fail_compression_for(&ids[1], "encoder crashed");
        h.media.fail_compression_for(&ids[3], "encoder crashed");

        let outcome = h.coordinator.process(&ids, None, "batch-1").await;
        assert_eq!(outcome.total, 5);
        assert_eq!(outcome.successful, 3);
        assert_eq!(outcome.failed, 2);
        for (idx, result) in outcome.results.iter().enumerate() {
            assert_eq!(result.is_success(), idx != 1 && idx != 3);
        }
    }

    #[tokio::test]
    async fn test_batch_limit_caps_candidates() {
        let h = harness(MockMediaTools::healthy(), 2);
        for name in ["a", "b", "c", "d"] {
            h.store.create(test_request(name)).unwrap();
        }
        let ids = h.coordinator.candidates().unwrap();
        assert_eq!(ids.len(), 2);
    }

    #[tokio::test]
    async fn test_batch_quality_override() {
        let h = harness(MockMediaTools::healthy(), 50);
        let id = h.store.create(test_request("a")).unwrap().id;

        let outcome = h
            .coordinator
            .process(&[id.clone()], Some(QualityPreset::Mobile), "batch-1")
            .await;
        assert_eq!(outcome.successful, 1);

        let record = h.store.get(&id).unwrap().unwrap();
        assert_eq!(record.target_quality, QualityPreset::Mobile);
        assert!(record
            .compressed_file
            .unwrap()
            .name
            .ends_with("_mobile.mp4"));
    }

    #[tokio::test]
    async fn test_exhausted_failures_not_retried() {
        let h = harness(MockMediaTools::healthy(), 50);
        let record = h.store.create(test_request("a")).unwrap();

        // Burn through the retry budget.
        for i in 0..3 {
            h.store
                .begin_processing(&record.id, &format!("t-{}", i), None)
                .unwrap();
            h.store
                .complete(
                    &record.id,
                    crate::record::CompletionOutcome::Failure {
                        error: "boom".to_string(),
                    },
                )
                .unwrap();
        }

        assert_eq!(h.store.get(&record.id).unwrap().unwrap().retry_count, 3);
        assert!(h.coordinator.candidates().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_record_folded_into_results() {
        let h = harness(MockMediaTools::healthy(), 50);
        let outcome = h
            .coordinator
            .process(&["ghost".to_string()], None, "batch-1")
            .await;
        assert_eq!(outcome.total, 1);
        assert_eq!(outcome.failed, 1);
        assert!(!outcome.results[0].is_success());
    }
}
