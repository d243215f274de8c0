//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the clinivid server:
//! - HTTP request metrics (latency, counts, errors)
//! - Record counts by status (collected dynamically)
//! - Queue load (collected dynamically)

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};

use clinivid_core::record::{ProcessingStatus, VideoFilter};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "clinivid_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("clinivid_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "clinivid_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Record Metrics (collected dynamically)
// =============================================================================

/// Videos by current status (collected dynamically).
pub static VIDEOS_BY_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new(
            "clinivid_videos_by_status",
            "Current video record count by status",
        ),
        &["status"],
    )
    .unwrap()
});

// =============================================================================
// Queue Metrics (collected dynamically)
// =============================================================================

/// Tasks currently running.
pub static QUEUE_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "clinivid_queue_active",
        "Number of pipeline runs currently active",
    )
    .unwrap()
});

/// Tasks waiting for a free slot.
pub static QUEUE_QUEUED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "clinivid_queue_queued",
        "Number of tasks waiting for a processing slot",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Records
    registry
        .register(Box::new(VIDEOS_BY_STATUS.clone()))
        .unwrap();

    // Queue
    registry.register(Box::new(QUEUE_ACTIVE.clone())).unwrap();
    registry.register(Box::new(QUEUE_QUEUED.clone())).unwrap();

    // Core metrics (media tools, pipeline outcomes)
    for metric in clinivid_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Collect dynamic metrics from current application state.
///
/// This is called before encoding metrics to update gauges with current
/// values from the record store and queue.
pub async fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let store = state.store();
    for status in [
        ProcessingStatus::Pending,
        ProcessingStatus::Uploading,
        ProcessingStatus::Processing,
        ProcessingStatus::Completed,
        ProcessingStatus::Failed,
    ] {
        let filter = VideoFilter::new().with_status(status.as_str());
        if let Ok(count) = store.count(&filter) {
            VIDEOS_BY_STATUS
                .with_label_values(&[status.as_str()])
                .set(count);
        }
    }

    let stats = state.queue().stats();
    QUEUE_ACTIVE.set(stats.active as i64);
    QUEUE_QUEUED.set(stats.queued as i64);
}

/// Normalize a path for metric labels (replace IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    let uuid_regex = regex_lite::Regex::new(
        r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}",
    )
    .unwrap();
    let numeric_regex = regex_lite::Regex::new(r"/\d+(/|$)").unwrap();

    let result = uuid_regex.replace_all(path, "{id}");
    let result = numeric_regex.replace_all(&result, "/{id}$1");
    result.to_string()
}
