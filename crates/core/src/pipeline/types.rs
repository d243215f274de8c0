//! Types for the pipeline module.

use serde::{Deserialize, Serialize};

/// Non-fatal errors collected per stage during a run.
///
/// Probe and thumbnail failures are recorded here and the run continues;
/// only compression failures abort a run.
#[derive(Debug, Clone, Default)]
pub struct StageResults {
    pub metadata_error: Option<String>,
    pub thumbnail_error: Option<String>,
    pub compression_error: Option<String>,
}

impl StageResults {
    /// Whether any stage recorded an error.
    pub fn has_errors(&self) -> bool {
        self.metadata_error.is_some()
            || self.thumbnail_error.is_some()
            || self.compression_error.is_some()
    }

    /// Joins all stage errors into one message.
    pub fn joined_errors(&self) -> String {
        [
            self.metadata_error.as_deref(),
            self.thumbnail_error.as_deref(),
            self.compression_error.as_deref(),
        ]
        .iter()
        .flatten()
        .copied()
        .collect::<Vec<_>>()
        .join("; ")
    }
}

/// Terminal outcome of a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// All stages succeeded.
    Completed {
        video_id: String,
        elapsed_secs: f64,
    },
    /// The run finished but at least one stage failed.
    Failed {
        video_id: String,
        error: String,
        /// Whether a fresh run could plausibly succeed (infra failures).
        #[serde(default)]
        retryable: bool,
    },
    /// Cancellation was observed between stages.
    Cancelled { video_id: String },
}

impl RunOutcome {
    pub fn video_id(&self) -> &str {
        match self {
            Self::Completed { video_id, .. }
            | Self::Failed { video_id, .. }
            | Self::Cancelled { video_id } => video_id,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}
