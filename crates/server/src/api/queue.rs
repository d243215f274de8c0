//! Handlers for queue state and aggregate statistics.

use axum::{extract::State, Json};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use clinivid_core::queue::QueueStats;
use clinivid_core::record::{ProcessingStatus, VideoFilter};

use super::videos::ErrorResponse;
use axum::http::StatusCode;

use crate::state::AppState;

pub async fn queue_status(State(state): State<Arc<AppState>>) -> Json<QueueStats> {
    Json(state.queue().stats())
}

#[derive(Serialize)]
pub struct StatisticsResponse {
    pub total: i64,
    pub by_status: BTreeMap<String, i64>,
    pub queue: QueueStats,
}

pub async fn statistics(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatisticsResponse>, (StatusCode, Json<ErrorResponse>)> {
    let store = state.store();

    let total = store.count(&VideoFilter::new()).map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
    })?;

    let mut by_status = BTreeMap::new();
    for status in [
        ProcessingStatus::Pending,
        ProcessingStatus::Uploading,
        ProcessingStatus::Processing,
        ProcessingStatus::Completed,
        ProcessingStatus::Failed,
    ] {
        let count = store
            .count(&VideoFilter::new().with_status(status.as_str()))
            .unwrap_or(0);
        by_status.insert(status.as_str().to_string(), count);
    }

    Ok(Json(StatisticsResponse {
        total,
        by_status,
        queue: state.queue().stats(),
    }))
}
