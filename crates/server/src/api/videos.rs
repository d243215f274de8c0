//! Handlers for video record registration, querying, and processing.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use clinivid_core::media::SUPPORTED_INPUT_EXTENSIONS;
use clinivid_core::pipeline::{estimate_processing, ProcessingEstimate};
use clinivid_core::queue::{QueueError, TaskInfo};
use clinivid_core::record::{
    CreateVideoRequest, ProcessingStatus, QualityPreset, StoreError, StoredFile, VideoFilter,
    VideoRecord,
};
use clinivid_core::storage::{FileCategory, ObjectStore};

use crate::state::AppState;

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, msg: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: msg.into(),
        }),
    )
}

fn store_error(e: StoreError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &e {
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::InvalidState { .. } => StatusCode::CONFLICT,
        StoreError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, e.to_string())
}

/// A stored file as exposed over the API: served URL instead of the
/// filesystem path.
#[derive(Serialize)]
pub struct FileResponse {
    pub name: String,
    pub url: String,
    pub size_bytes: u64,
}

impl FileResponse {
    fn new(file: &StoredFile, category: FileCategory, objects: &dyn ObjectStore) -> Self {
        Self {
            name: file.name.clone(),
            url: objects.url(category, &file.name),
            size_bytes: file.size_bytes,
        }
    }
}

#[derive(Serialize)]
pub struct VideoResponse {
    pub id: String,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub recorded_at: DateTime<Utc>,
    pub access_level: String,
    pub sensitive: bool,

    pub original: FileResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compressed: Option<FileResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<FileResponse>,
    pub playback_url: String,
    pub target_quality: QualityPreset,

    pub duration_secs: Option<f64>,
    pub formatted_duration: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub video_codec: Option<String>,
    pub video_bitrate_kbps: Option<u32>,
    pub container_format: Option<String>,
    pub file_size_mb: f64,

    pub status: ProcessingStatus,
    pub progress_pct: u8,
    pub stage: String,
    pub error: Option<String>,
    pub retry_count: u32,
    pub task_id: Option<String>,
    pub processing_started_at: Option<DateTime<Utc>>,
    pub processing_completed_at: Option<DateTime<Utc>>,
    pub processing_time_secs: Option<f64>,
    pub compression_ratio: Option<f64>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn video_response(record: VideoRecord, objects: &dyn ObjectStore) -> VideoResponse {
    let original = FileResponse::new(&record.original_file, FileCategory::Originals, objects);
    let compressed = record
        .compressed_file
        .as_ref()
        .map(|f| FileResponse::new(f, FileCategory::Compressed, objects));
    let thumbnail = record
        .thumbnail
        .as_ref()
        .map(|f| FileResponse::new(f, FileCategory::Thumbnails, objects));
    let playback_url = compressed
        .as_ref()
        .map(|f| f.url.clone())
        .unwrap_or_else(|| original.url.clone());

    VideoResponse {
        id: record.id,
        title: record.title,
        description: record.description,
        tags: record.tags,
        recorded_at: record.recorded_at,
        access_level: record.access_level,
        sensitive: record.sensitive,
        original,
        compressed,
        thumbnail,
        playback_url,
        target_quality: record.target_quality,
        duration_secs: record.duration_secs,
        formatted_duration: record.duration_secs.map(clinivid_core::record::format_duration),
        width: record.width,
        height: record.height,
        video_codec: record.video_codec,
        video_bitrate_kbps: record.video_bitrate_kbps,
        container_format: record.container_format,
        file_size_mb: (record.original_file.size_bytes as f64 / (1024.0 * 1024.0) * 100.0)
            .round()
            / 100.0,
        status: record.status,
        progress_pct: record.progress_pct,
        stage: record.stage,
        error: record.error,
        retry_count: record.retry_count,
        task_id: record.task_id,
        processing_started_at: record.processing_started_at,
        processing_completed_at: record.processing_completed_at,
        processing_time_secs: record.processing_time_secs,
        compression_ratio: record.compression_ratio,
        created_at: record.created_at,
        updated_at: record.updated_at,
    }
}

// =============================================================================
// Register
// =============================================================================

#[derive(Deserialize)]
pub struct RegisterVideoRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub recorded_at: Option<DateTime<Utc>>,
    #[serde(default = "default_access_level")]
    pub access_level: String,
    #[serde(default)]
    pub sensitive: bool,
    /// Local path of the uploaded file; consumed on success.
    pub source_path: PathBuf,
    pub quality: Option<QualityPreset>,
}

fn default_access_level() -> String {
    "restricted".to_string()
}

pub async fn register_video(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterVideoRequest>,
) -> Result<(StatusCode, Json<VideoResponse>), (StatusCode, Json<ErrorResponse>)> {
    if request.title.trim().is_empty() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "title must not be empty",
        ));
    }

    let file_name = request
        .source_path
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.to_string())
        .ok_or_else(|| {
            error_response(StatusCode::BAD_REQUEST, "source_path has no file name")
        })?;

    let extension = request
        .source_path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    if !SUPPORTED_INPUT_EXTENSIONS.contains(&extension.as_str()) {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            format!("unsupported file extension: {:?}", extension),
        ));
    }

    let metadata = tokio::fs::metadata(&request.source_path).await.map_err(|_| {
        error_response(
            StatusCode::BAD_REQUEST,
            format!("source file not found: {}", request.source_path.display()),
        )
    })?;
    let max_bytes = state.sanitized_config().media.max_input_bytes;
    if metadata.len() > max_bytes {
        return Err(error_response(
            StatusCode::PAYLOAD_TOO_LARGE,
            format!(
                "file is {} bytes, maximum is {} bytes",
                metadata.len(),
                max_bytes
            ),
        ));
    }

    // Unique stored name; the record keeps pointing at this object. The
    // record exists in uploading state while the file is copied in, then
    // flips to pending once the object is in place.
    let stored_name = format!("{}_{}", Uuid::new_v4(), file_name);
    let record = state
        .store()
        .create_uploading(CreateVideoRequest {
            title: request.title,
            description: request.description,
            tags: request.tags,
            recorded_at: request.recorded_at.unwrap_or_else(Utc::now),
            access_level: request.access_level,
            sensitive: request.sensitive,
            original_file: StoredFile {
                name: stored_name.clone(),
                path: PathBuf::from(FileCategory::Originals.as_str()).join(&stored_name),
                size_bytes: metadata.len(),
            },
            target_quality: request.quality.unwrap_or_default(),
        })
        .map_err(store_error)?;

    if let Err(e) = state
        .objects()
        .put_file(FileCategory::Originals, &stored_name, &request.source_path)
        .await
    {
        // The upload never landed, so the record must not linger.
        if let Err(del) = state.store().delete(&record.id) {
            warn!(video_id = %record.id, "Failed to remove record after upload error: {}", del);
        }
        return Err(error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("failed to store upload: {}", e),
        ));
    }

    let record = state.store().finish_upload(&record.id).map_err(store_error)?;

    Ok((
        StatusCode::CREATED,
        Json(video_response(record, state.objects().as_ref())),
    ))
}

// =============================================================================
// List / get / delete
// =============================================================================

#[derive(Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Serialize)]
pub struct VideoListResponse {
    pub videos: Vec<VideoResponse>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

pub async fn list_videos(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<VideoListResponse>, (StatusCode, Json<ErrorResponse>)> {
    let mut filter = VideoFilter::new();
    if let Some(status) = &query.status {
        if ProcessingStatus::parse(status).is_none() {
            return Err(error_response(
                StatusCode::BAD_REQUEST,
                format!("unknown status: {:?}", status),
            ));
        }
        filter = filter.with_status(status.clone());
    }
    let limit = query.limit.unwrap_or(100).clamp(1, 1000);
    let offset = query.offset.unwrap_or(0).max(0);
    filter = filter.with_limit(limit).with_offset(offset);

    let total = state.store().count(&filter).map_err(store_error)?;
    let videos = state
        .store()
        .list(&filter)
        .map_err(store_error)?
        .into_iter()
        .map(|r| video_response(r, state.objects().as_ref()))
        .collect();

    Ok(Json(VideoListResponse {
        videos,
        total,
        limit,
        offset,
    }))
}

pub async fn get_video(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<VideoResponse>, (StatusCode, Json<ErrorResponse>)> {
    let record = state
        .store()
        .get(&id)
        .map_err(store_error)?
        .ok_or_else(|| {
            error_response(StatusCode::NOT_FOUND, format!("video not found: {}", id))
        })?;
    Ok(Json(video_response(record, state.objects().as_ref())))
}

pub async fn delete_video(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, (StatusCode, Json<ErrorResponse>)> {
    let record = state.store().delete(&id).map_err(store_error)?;

    // Best effort: a failed file removal leaves an orphan object but the
    // record is already gone.
    let objects = state.objects();
    let files = [
        Some((FileCategory::Originals, record.original_file.name.clone())),
        record
            .compressed_file
            .map(|f| (FileCategory::Compressed, f.name)),
        record.thumbnail.map(|f| (FileCategory::Thumbnails, f.name)),
    ];
    for (category, name) in files.into_iter().flatten() {
        if let Err(e) = objects.delete(category, &name).await {
            warn!(video_id = %id, "Failed to delete {} object {}: {}", category, name, e);
        }
    }

    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Processing
// =============================================================================

#[derive(Deserialize)]
pub struct ProcessQuery {
    pub quality: Option<QualityPreset>,
}

#[derive(Serialize)]
pub struct ProcessResponse {
    pub video_id: String,
    pub task_id: String,
    pub status: String,
}

pub async fn process_video(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<ProcessQuery>,
) -> Result<(StatusCode, Json<ProcessResponse>), (StatusCode, Json<ErrorResponse>)> {
    let record = state
        .store()
        .get(&id)
        .map_err(store_error)?
        .ok_or_else(|| {
            error_response(StatusCode::NOT_FOUND, format!("video not found: {}", id))
        })?;

    if !record.status.can_begin_processing() {
        return Err(error_response(
            StatusCode::CONFLICT,
            format!(
                "cannot process video in status {}",
                record.status.as_str()
            ),
        ));
    }

    let task_id = state
        .queue()
        .submit(&id, query.quality)
        .await
        .map_err(|e| match e {
            QueueError::AlreadyQueued { .. } => {
                error_response(StatusCode::CONFLICT, e.to_string())
            }
            QueueError::TaskNotFound(_) => {
                error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        })?;

    Ok((
        StatusCode::ACCEPTED,
        Json(ProcessResponse {
            video_id: id,
            task_id,
            status: "queued".to_string(),
        }),
    ))
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub video_id: String,
    pub status: ProcessingStatus,
    pub progress_pct: u8,
    pub stage: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub retry_count: u32,
    pub task_id: Option<String>,
    pub processing_started_at: Option<DateTime<Utc>>,
    pub processing_completed_at: Option<DateTime<Utc>>,
    pub processing_time_secs: Option<f64>,
    pub formatted_processing_time: Option<String>,
    pub original: FileResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compressed: Option<FileResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<FileResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<TaskInfo>,
}

pub async fn video_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<StatusResponse>, (StatusCode, Json<ErrorResponse>)> {
    let record = state
        .store()
        .get(&id)
        .map_err(store_error)?
        .ok_or_else(|| {
            error_response(StatusCode::NOT_FOUND, format!("video not found: {}", id))
        })?;

    let mut task = state.queue().active_task_for(&id).await;
    if task.is_none() {
        if let Some(task_id) = &record.task_id {
            task = state.queue().status(task_id).await.ok();
        }
    }

    let objects = state.objects();
    Ok(Json(StatusResponse {
        video_id: record.id,
        status: record.status,
        progress_pct: record.progress_pct,
        stage: record.stage,
        error: record.error,
        retry_count: record.retry_count,
        task_id: record.task_id,
        processing_started_at: record.processing_started_at,
        processing_completed_at: record.processing_completed_at,
        processing_time_secs: record.processing_time_secs,
        formatted_processing_time: record
            .processing_time_secs
            .map(clinivid_core::record::format_duration),
        original: FileResponse::new(&record.original_file, FileCategory::Originals, objects.as_ref()),
        compressed: record
            .compressed_file
            .as_ref()
            .map(|f| FileResponse::new(f, FileCategory::Compressed, objects.as_ref())),
        thumbnail: record
            .thumbnail
            .as_ref()
            .map(|f| FileResponse::new(f, FileCategory::Thumbnails, objects.as_ref())),
        task,
    }))
}

pub async fn cancel_video(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<VideoResponse>, (StatusCode, Json<ErrorResponse>)> {
    let record = state.store().cancel(&id).map_err(store_error)?;
    Ok(Json(video_response(record, state.objects().as_ref())))
}

pub async fn estimate_video(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<ProcessQuery>,
) -> Result<Json<ProcessingEstimate>, (StatusCode, Json<ErrorResponse>)> {
    let record = state
        .store()
        .get(&id)
        .map_err(store_error)?
        .ok_or_else(|| {
            error_response(StatusCode::NOT_FOUND, format!("video not found: {}", id))
        })?;

    let duration = record.duration_secs.ok_or_else(|| {
        error_response(
            StatusCode::CONFLICT,
            "duration unknown, metadata has not been extracted yet",
        )
    })?;

    let preset = query.quality.unwrap_or(record.target_quality);
    Ok(Json(estimate_processing(
        duration,
        record.original_file.size_bytes,
        preset,
    )))
}

// =============================================================================
// Batch
// =============================================================================

#[derive(Serialize)]
pub struct BatchSubmission {
    pub video_id: String,
    pub task_id: String,
}

#[derive(Serialize)]
pub struct BatchResponse {
    pub submitted: Vec<BatchSubmission>,
    pub skipped: Vec<String>,
    pub total: usize,
}

/// Queues every pending record, plus failed records with retries left.
pub async fn process_batch(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ProcessQuery>,
) -> Result<(StatusCode, Json<BatchResponse>), (StatusCode, Json<ErrorResponse>)> {
    let candidates = state.coordinator().candidates().map_err(|e| {
        error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;

    let mut submitted = Vec::new();
    let mut skipped = Vec::new();
    for video_id in candidates {
        match state.queue().submit(&video_id, query.quality).await {
            Ok(task_id) => submitted.push(BatchSubmission { video_id, task_id }),
            Err(QueueError::AlreadyQueued { .. }) => skipped.push(video_id),
            Err(e) => {
                warn!(video_id = %video_id, "Batch submission failed: {}", e);
                skipped.push(video_id);
            }
        }
    }

    let total = submitted.len() + skipped.len();
    Ok((
        StatusCode::ACCEPTED,
        Json(BatchResponse {
            submitted,
            skipped,
            total,
        }),
    ))
}
