//! Configuration for the pipeline module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the video pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Working directory for per-run intermediate files.
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    /// Age after which abandoned temp files are removed, in seconds.
    #[serde(default = "default_temp_max_age")]
    pub temp_max_age_secs: u64,

    /// Maximum records a single batch run may claim.
    #[serde(default = "default_batch_limit")]
    pub batch_limit: usize,
}

fn default_temp_dir() -> PathBuf {
    std::env::temp_dir().join("clinivid-pipeline")
}

fn default_temp_max_age() -> u64 {
    24 * 3600
}

fn default_batch_limit() -> usize {
    50
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            temp_dir: default_temp_dir(),
            temp_max_age_secs: default_temp_max_age(),
            batch_limit: default_batch_limit(),
        }
    }
}

impl PipelineConfig {
    /// Sets the temp directory.
    pub fn with_temp_dir(mut self, temp_dir: PathBuf) -> Self {
        self.temp_dir = temp_dir;
        self
    }

    /// Sets the batch size cap.
    pub fn with_batch_limit(mut self, batch_limit: usize) -> Self {
        self.batch_limit = batch_limit;
        self
    }
}
