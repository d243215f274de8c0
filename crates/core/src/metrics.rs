//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Media tooling (probes, thumbnails, compressions)
//! - Pipeline outcomes (completed, failed videos)

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Media tool metrics
// =============================================================================

/// Probe attempts total by result.
pub static PROBES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("clinivid_probes_total", "Total media probe attempts"),
        &["result"], // "ok", "error"
    )
    .unwrap()
});

/// Probe duration in seconds.
pub static PROBE_DURATION: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new("clinivid_probe_duration_seconds", "Duration of media probes")
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
    )
    .unwrap()
});

/// Thumbnail extractions total by result.
pub static THUMBNAILS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "clinivid_thumbnails_total",
            "Total thumbnail extraction attempts",
        ),
        &["result"], // "ok", "skipped", "error"
    )
    .unwrap()
});

/// Compressions total by preset and result.
pub static COMPRESSIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("clinivid_compressions_total", "Total compression runs"),
        &["preset", "result"], // result: "ok", "error"
    )
    .unwrap()
});

/// Compression duration in seconds.
pub static COMPRESSION_DURATION: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "clinivid_compression_duration_seconds",
            "Duration of compression runs",
        )
        .buckets(vec![
            1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0, 3600.0,
        ]),
    )
    .unwrap()
});

// =============================================================================
// Pipeline outcome metrics
// =============================================================================

/// Videos that reached the completed state.
pub static VIDEOS_COMPLETED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "clinivid_videos_completed_total",
        "Total videos processed successfully",
    )
    .unwrap()
});

/// Videos that reached the failed state.
pub static VIDEOS_FAILED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "clinivid_videos_failed_total",
        "Total videos whose processing failed",
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(PROBES_TOTAL.clone()),
        Box::new(PROBE_DURATION.clone()),
        Box::new(THUMBNAILS_TOTAL.clone()),
        Box::new(COMPRESSIONS_TOTAL.clone()),
        Box::new(COMPRESSION_DURATION.clone()),
        Box::new(VIDEOS_COMPLETED.clone()),
        Box::new(VIDEOS_FAILED.clone()),
    ]
}
