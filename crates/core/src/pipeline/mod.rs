//! Video processing pipeline.
//!
//! Drives a claimed record through probe, thumbnail, and compression
//! stages, persisting progress and per-stage results along the way.

mod batch;
mod cleanup;
mod config;
mod error;
mod estimate;
mod progress;
mod runner;
mod types;

pub use batch::{BatchCoordinator, BatchOutcome};
pub use cleanup::cleanup_temp_files;
pub use config::PipelineConfig;
pub use error::PipelineError;
pub use estimate::{estimate_processing, ProcessingEstimate};
pub use progress::{ProgressMirror, ProgressReporter};
pub use runner::VideoPipeline;
pub use types::{RunOutcome, StageResults};
