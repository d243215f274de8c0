//! Progress reporting for pipeline runs.
//!
//! Each stage owns a fixed window of the record's overall percentage:
//! metadata 10-20, thumbnail 30-40, compression 50-90, with 100 stamped
//! at completion. Stage-local compression percentages are folded into
//! the 50-90 window.

use std::sync::Arc;
use tracing::warn;

use crate::record::VideoStore;

pub const STAGE_METADATA: &str = "extracting_metadata";
pub const STAGE_THUMBNAIL: &str = "generating_thumbnail";
pub const STAGE_COMPRESSION: &str = "compressing";

pub const METADATA_START: u8 = 10;
pub const METADATA_DONE: u8 = 20;
pub const THUMBNAIL_START: u8 = 30;
pub const THUMBNAIL_DONE: u8 = 40;
pub const COMPRESSION_START: u8 = 50;
pub const COMPRESSION_CAP: u8 = 90;

/// Maps a stage-local compression percentage (0-100) into the overall
/// 50-90 window.
pub fn compression_progress(stage_pct: f32) -> u8 {
    let clamped = stage_pct.clamp(0.0, 100.0);
    let overall = COMPRESSION_START as f32 + (clamped * 0.4).floor();
    (overall as u8).min(COMPRESSION_CAP)
}

/// Receives the same progress tuples the record does, keyed by task ID.
///
/// The task queue implements this so observers polling a task see the
/// values the record holds.
pub trait ProgressMirror: Send + Sync {
    fn progress(&self, task_id: &str, progress_pct: u8, stage: &str);
}

/// Persists progress updates, never letting a store hiccup kill a run.
#[derive(Clone)]
pub struct ProgressReporter {
    store: Arc<dyn VideoStore>,
    video_id: String,
    task_id: Option<String>,
    mirror: Option<Arc<dyn ProgressMirror>>,
}

impl ProgressReporter {
    pub fn new(store: Arc<dyn VideoStore>, video_id: impl Into<String>) -> Self {
        Self {
            store,
            video_id: video_id.into(),
            task_id: None,
            mirror: None,
        }
    }

    /// Mirrors every checkpoint into the given sink under this task ID.
    pub fn with_mirror(
        mut self,
        task_id: impl Into<String>,
        mirror: Arc<dyn ProgressMirror>,
    ) -> Self {
        self.task_id = Some(task_id.into());
        self.mirror = Some(mirror);
        self
    }

    /// Writes a progress checkpoint. Failures are logged and swallowed.
    pub fn report(&self, progress_pct: u8, stage: &str) {
        if let Err(e) = self.store.update_progress(&self.video_id, progress_pct, stage) {
            warn!(
                video_id = %self.video_id,
                progress_pct,
                stage,
                "Failed to persist progress update: {}",
                e
            );
        }
        if let (Some(task_id), Some(mirror)) = (&self.task_id, &self.mirror) {
            mirror.progress(task_id, progress_pct, stage);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{
        CreateVideoRequest, QualityPreset, SqliteVideoStore, StoredFile, VideoStore,
    };
    use chrono::Utc;
    use std::path::PathBuf;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingMirror {
        seen: Mutex<Vec<(String, u8, String)>>,
    }

    impl ProgressMirror for RecordingMirror {
        fn progress(&self, task_id: &str, progress_pct: u8, stage: &str) {
            self.seen
                .lock()
                .unwrap()
                .push((task_id.to_string(), progress_pct, stage.to_string()));
        }
    }

    fn seed(store: &Arc<dyn VideoStore>) -> String {
        store
            .create(CreateVideoRequest {
                title: "Shoulder exam".to_string(),
                description: String::new(),
                tags: vec![],
                recorded_at: Utc::now(),
                access_level: "restricted".to_string(),
                sensitive: false,
                original_file: StoredFile {
                    name: "in.mp4".to_string(),
                    path: PathBuf::from("originals/in.mp4"),
                    size_bytes: 1_000,
                },
                target_quality: QualityPreset::Medium,
            })
            .unwrap()
            .id
    }

    #[test]
    fn test_reporter_mirrors_when_task_attached() {
        let store: Arc<dyn VideoStore> = Arc::new(SqliteVideoStore::in_memory().unwrap());
        let id = seed(&store);

        let mirror = Arc::new(RecordingMirror::default());
        let reporter = ProgressReporter::new(Arc::clone(&store), &id)
            .with_mirror("task-9", mirror.clone());
        reporter.report(METADATA_DONE, STAGE_METADATA);

        // Record and mirror both saw the same tuple.
        let seen = mirror.seen.lock().unwrap();
        assert_eq!(
            seen.as_slice(),
            &[(
                "task-9".to_string(),
                METADATA_DONE,
                STAGE_METADATA.to_string()
            )]
        );
        let record = store.get(&id).unwrap().unwrap();
        assert_eq!(record.progress_pct, METADATA_DONE);
        assert_eq!(record.stage, STAGE_METADATA);
    }

    #[test]
    fn test_compression_window_mapping() {
        assert_eq!(compression_progress(0.0), 50);
        assert_eq!(compression_progress(25.0), 60);
        assert_eq!(compression_progress(50.0), 70);
        assert_eq!(compression_progress(100.0), 90);
    }

    #[test]
    fn test_compression_window_clamps() {
        assert_eq!(compression_progress(-10.0), 50);
        assert_eq!(compression_progress(150.0), 90);
    }

    #[test]
    fn test_compression_window_floors() {
        // 50 + floor(33 * 0.4) = 50 + 13
        assert_eq!(compression_progress(33.0), 63);
        // 50 + floor(99 * 0.4) = 50 + 39
        assert_eq!(compression_progress(99.0), 89);
    }
}
