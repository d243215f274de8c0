//! Configuration for the queue module.

use serde::{Deserialize, Serialize};

/// Configuration for the local task queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Maximum pipeline runs in flight at once.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Maximum attempts per task, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before retrying a failed attempt, in seconds.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_secs: u64,
}

fn default_max_concurrent() -> usize {
    3
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_backoff() -> u64 {
    60
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            max_attempts: default_max_attempts(),
            retry_backoff_secs: default_retry_backoff(),
        }
    }
}

impl QueueConfig {
    /// Sets the concurrency cap.
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    /// Sets the retry backoff in seconds.
    pub fn with_retry_backoff(mut self, retry_backoff_secs: u64) -> Self {
        self.retry_backoff_secs = retry_backoff_secs;
        self
    }
}
