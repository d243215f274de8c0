//! In-process task queue implementation.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::Semaphore;
use tokio::time::Duration;
use tracing::{info, warn};

use crate::pipeline::{PipelineError, ProgressMirror, RunOutcome, VideoPipeline};
use crate::record::QualityPreset;

use super::config::QueueConfig;
use super::error::QueueError;
use super::types::{QueueStats, TaskInfo, TaskState};

struct QueueCounters {
    active: AtomicU64,
    queued: AtomicU64,
    total_processed: AtomicU64,
    total_failed: AtomicU64,
}

impl Default for QueueCounters {
    fn default() -> Self {
        Self {
            active: AtomicU64::new(0),
            queued: AtomicU64::new(0),
            total_processed: AtomicU64::new(0),
            total_failed: AtomicU64::new(0),
        }
    }
}

/// Task registry shared with pipeline runs so progress checkpoints land
/// on the task as well as the record.
struct TaskRegistry {
    tasks: RwLock<HashMap<String, TaskInfo>>,
}

impl TaskRegistry {
    fn new() -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
        }
    }

    fn insert(&self, task: TaskInfo) {
        self.tasks
            .write()
            .unwrap()
            .insert(task.task_id.clone(), task);
    }

    fn get(&self, task_id: &str) -> Option<TaskInfo> {
        self.tasks.read().unwrap().get(task_id).cloned()
    }

    fn find_active(&self, video_id: &str) -> Option<TaskInfo> {
        self.tasks
            .read()
            .unwrap()
            .values()
            .find(|t| t.video_id == video_id && !t.state.is_terminal())
            .cloned()
    }

    fn begin_attempt(&self, task_id: &str, attempt: u32) {
        let mut map = self.tasks.write().unwrap();
        if let Some(task) = map.get_mut(task_id) {
            task.state = TaskState::Running;
            task.attempts = attempt;
            task.progress_pct = 0;
            task.stage = "queued".to_string();
            task.updated_at = Utc::now();
        }
    }

    fn set_state(&self, task_id: &str, state: TaskState) {
        let mut map = self.tasks.write().unwrap();
        if let Some(task) = map.get_mut(task_id) {
            if matches!(state, TaskState::Completed) {
                task.progress_pct = 100;
                task.stage = "finished".to_string();
            }
            task.state = state;
            task.updated_at = Utc::now();
        }
    }
}

impl ProgressMirror for TaskRegistry {
    fn progress(&self, task_id: &str, progress_pct: u8, stage: &str) {
        let mut map = self.tasks.write().unwrap();
        if let Some(task) = map.get_mut(task_id) {
            task.progress_pct = progress_pct;
            task.stage = stage.to_string();
            task.updated_at = Utc::now();
        }
    }
}

/// Bounded in-process queue that runs the pipeline in background tasks.
pub struct LocalQueue {
    config: QueueConfig,
    pipeline: Arc<VideoPipeline>,
    semaphore: Arc<Semaphore>,
    registry: Arc<TaskRegistry>,
    counters: Arc<QueueCounters>,
}

impl LocalQueue {
    /// Creates a new queue over the given pipeline.
    pub fn new(config: QueueConfig, pipeline: Arc<VideoPipeline>) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent));
        Self {
            config,
            pipeline,
            semaphore,
            registry: Arc::new(TaskRegistry::new()),
            counters: Arc::new(QueueCounters::default()),
        }
    }

    /// Submits a record for processing and returns the task ID.
    ///
    /// Processing happens in the background; poll [`Self::status`] or the
    /// record itself for progress. A video with a non-terminal task is
    /// rejected.
    pub async fn submit(
        &self,
        video_id: &str,
        quality: Option<QualityPreset>,
    ) -> Result<String, QueueError> {
        if let Some(existing) = self.registry.find_active(video_id) {
            return Err(QueueError::AlreadyQueued {
                video_id: video_id.to_string(),
                task_id: existing.task_id,
            });
        }

        let task_id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        self.registry.insert(TaskInfo {
            task_id: task_id.clone(),
            video_id: video_id.to_string(),
            state: TaskState::Queued,
            progress_pct: 0,
            stage: "queued".to_string(),
            attempts: 0,
            submitted_at: now,
            updated_at: now,
        });
        self.counters.queued.fetch_add(1, Ordering::Relaxed);

        let config = self.config.clone();
        let pipeline = Arc::clone(&self.pipeline);
        let semaphore = Arc::clone(&self.semaphore);
        let registry = Arc::clone(&self.registry);
        let counters = Arc::clone(&self.counters);
        let video_id = video_id.to_string();
        let spawned_task_id = task_id.clone();

        tokio::spawn(async move {
            let permit = match semaphore.acquire().await {
                Ok(permit) => permit,
                Err(_) => return,
            };
            counters.queued.fetch_sub(1, Ordering::Relaxed);
            counters.active.fetch_add(1, Ordering::Relaxed);

            let final_state = Self::run_with_retries(
                &config,
                &pipeline,
                &registry,
                &spawned_task_id,
                &video_id,
                quality,
            )
            .await;

            counters.active.fetch_sub(1, Ordering::Relaxed);
            match final_state {
                TaskState::Completed | TaskState::Cancelled => {
                    counters.total_processed.fetch_add(1, Ordering::Relaxed);
                }
                _ => {
                    counters.total_failed.fetch_add(1, Ordering::Relaxed);
                }
            }

            registry.set_state(&spawned_task_id, final_state);
            drop(permit);
        });

        Ok(task_id)
    }

    async fn run_with_retries(
        config: &QueueConfig,
        pipeline: &VideoPipeline,
        registry: &Arc<TaskRegistry>,
        task_id: &str,
        video_id: &str,
        quality: Option<QualityPreset>,
    ) -> TaskState {
        let mut attempt = 0;
        loop {
            attempt += 1;
            registry.begin_attempt(task_id, attempt);
            let mirror = Arc::clone(registry) as Arc<dyn ProgressMirror>;

            match pipeline
                .run_mirrored(video_id, task_id, quality, Some(mirror))
                .await
            {
                Ok(RunOutcome::Completed { .. }) => return TaskState::Completed,
                Ok(RunOutcome::Cancelled { .. }) => {
                    info!(video_id, task_id, "Task observed cancellation");
                    return TaskState::Cancelled;
                }
                Ok(RunOutcome::Failed { error, retryable, .. }) => {
                    if retryable && attempt < config.max_attempts {
                        warn!(
                            video_id,
                            task_id,
                            attempt,
                            "Attempt failed, retrying in {}s: {}",
                            config.retry_backoff_secs,
                            error
                        );
                        tokio::time::sleep(Duration::from_secs(config.retry_backoff_secs)).await;
                        continue;
                    }
                    return TaskState::Failed { error };
                }
                Err(PipelineError::AlreadyProcessing { current_status, .. }) => {
                    return TaskState::Failed {
                        error: format!(
                            "Record is not claimable: status is {}",
                            current_status
                        ),
                    };
                }
                Err(e) => return TaskState::Failed { error: e.to_string() },
            }
        }
    }

    /// Looks up a task by ID.
    pub async fn status(&self, task_id: &str) -> Result<TaskInfo, QueueError> {
        self.registry
            .get(task_id)
            .ok_or_else(|| QueueError::TaskNotFound(task_id.to_string()))
    }

    /// Returns the active task for a video, if any.
    pub async fn active_task_for(&self, video_id: &str) -> Option<TaskInfo> {
        self.registry.find_active(video_id)
    }

    /// Current queue load and lifetime counters.
    pub fn stats(&self) -> QueueStats {
        QueueStats {
            active: self.counters.active.load(Ordering::Relaxed) as usize,
            queued: self.counters.queued.load(Ordering::Relaxed) as usize,
            max_concurrent: self.config.max_concurrent,
            total_processed: self.counters.total_processed.load(Ordering::Relaxed),
            total_failed: self.counters.total_failed.load(Ordering::Relaxed),
        }
    }

    /// Waits until a task reaches a terminal state.
    ///
    /// Polling helper for callers that need a synchronous answer, mostly
    /// tests; the API surface never blocks on this.
    pub async fn wait_for(&self, task_id: &str) -> Result<TaskInfo, QueueError> {
        loop {
            let task = self.status(task_id).await?;
            if task.state.is_terminal() {
                return Ok(task);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}
