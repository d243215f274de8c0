//! SQLite-backed video record store.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::store::{CompletionOutcome, CreateVideoRequest, StoreError, VideoFilter, VideoStore};
use super::types::{
    CompressionMetadata, OriginalMetadata, ProcessingMetadata, ProcessingStatus, QualityPreset,
    StoredFile, VideoRecord,
};

const COLUMNS: &str = "id, created_at, updated_at, title, description, tags, recorded_at, \
     access_level, sensitive, original_file, compressed_file, thumbnail, target_quality, \
     duration_secs, width, height, video_codec, video_bitrate_kbps, container_format, \
     status, progress_pct, stage, error, retry_count, task_id, processing_started_at, \
     processing_completed_at, processing_time_secs, compression_ratio, processing_metadata";

/// SQLite-backed video store.
pub struct SqliteVideoStore {
    conn: Mutex<Connection>,
}

impl SqliteVideoStore {
    /// Create a new store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|e| StoreError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn =
            Connection::open_in_memory().map_err(|e| StoreError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS videos (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                tags TEXT NOT NULL DEFAULT '[]',
                recorded_at TEXT NOT NULL,
                access_level TEXT NOT NULL DEFAULT '',
                sensitive INTEGER NOT NULL DEFAULT 0,
                original_file TEXT NOT NULL,
                compressed_file TEXT,
                thumbnail TEXT,
                target_quality TEXT NOT NULL DEFAULT 'medium',
                duration_secs REAL,
                width INTEGER,
                height INTEGER,
                video_codec TEXT,
                video_bitrate_kbps INTEGER,
                container_format TEXT,
                status TEXT NOT NULL DEFAULT 'pending',
                progress_pct INTEGER NOT NULL DEFAULT 0,
                stage TEXT NOT NULL DEFAULT '',
                error TEXT,
                retry_count INTEGER NOT NULL DEFAULT 0,
                task_id TEXT,
                processing_started_at TEXT,
                processing_completed_at TEXT,
                processing_time_secs REAL,
                compression_ratio REAL,
                processing_metadata TEXT NOT NULL DEFAULT '{}'
            );

            CREATE INDEX IF NOT EXISTS idx_videos_status ON videos(status);
            CREATE INDEX IF NOT EXISTS idx_videos_created_at ON videos(created_at);
            "#,
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn build_where_clause(filter: &VideoFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref status) = filter.status {
            conditions.push("status = ?");
            params.push(Box::new(status.clone()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<VideoRecord> {
        let parse_ts = |s: String| {
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now())
        };
        let parse_opt_ts = |s: Option<String>| {
            s.and_then(|s| {
                DateTime::parse_from_rfc3339(&s)
                    .map(|dt| dt.with_timezone(&Utc))
                    .ok()
            })
        };

        let tags_json: String = row.get(5)?;
        let original_file_json: String = row.get(9)?;
        let compressed_file_json: Option<String> = row.get(10)?;
        let thumbnail_json: Option<String> = row.get(11)?;
        let target_quality_str: String = row.get(12)?;
        let status_str: String = row.get(19)?;
        let metadata_json: String = row.get(29)?;

        let original_file: StoredFile =
            serde_json::from_str(&original_file_json).unwrap_or(StoredFile {
                name: String::new(),
                path: Default::default(),
                size_bytes: 0,
            });

        Ok(VideoRecord {
            id: row.get(0)?,
            created_at: parse_ts(row.get(1)?),
            updated_at: parse_ts(row.get(2)?),
            title: row.get(3)?,
            description: row.get(4)?,
            tags: serde_json::from_str(&tags_json).unwrap_or_default(),
            recorded_at: parse_ts(row.get(6)?),
            access_level: row.get(7)?,
            sensitive: row.get::<_, i64>(8)? != 0,
            original_file,
            compressed_file: compressed_file_json.and_then(|j| serde_json::from_str(&j).ok()),
            thumbnail: thumbnail_json.and_then(|j| serde_json::from_str(&j).ok()),
            target_quality: QualityPreset::parse(&target_quality_str)
                .unwrap_or(QualityPreset::Medium),
            duration_secs: row.get(13)?,
            width: row.get(14)?,
            height: row.get(15)?,
            video_codec: row.get(16)?,
            video_bitrate_kbps: row.get(17)?,
            container_format: row.get(18)?,
            status: ProcessingStatus::parse(&status_str).unwrap_or(ProcessingStatus::Pending),
            progress_pct: row.get::<_, i64>(20)?.clamp(0, 100) as u8,
            stage: row.get(21)?,
            error: row.get(22)?,
            retry_count: row.get(23)?,
            task_id: row.get(24)?,
            processing_started_at: parse_opt_ts(row.get(25)?),
            processing_completed_at: parse_opt_ts(row.get(26)?),
            processing_time_secs: row.get(27)?,
            compression_ratio: row.get(28)?,
            processing_metadata: serde_json::from_str::<ProcessingMetadata>(&metadata_json)
                .unwrap_or_default(),
        })
    }

    fn fetch(conn: &Connection, id: &str) -> Result<VideoRecord, StoreError> {
        let sql = format!("SELECT {} FROM videos WHERE id = ?", COLUMNS);
        conn.query_row(&sql, params![id], Self::row_to_record)
            .optional()
            .map_err(|e| StoreError::Database(e.to_string()))?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn fetch_metadata(conn: &Connection, id: &str) -> Result<ProcessingMetadata, StoreError> {
        let json: String = conn
            .query_row(
                "SELECT processing_metadata FROM videos WHERE id = ?",
                params![id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| StoreError::Database(e.to_string()))?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        Ok(serde_json::from_str(&json).unwrap_or_default())
    }

    fn to_json<T: serde::Serialize>(value: &T) -> Result<String, StoreError> {
        serde_json::to_string(value).map_err(|e| StoreError::Database(e.to_string()))
    }

    fn insert(
        &self,
        request: CreateVideoRequest,
        status: ProcessingStatus,
    ) -> Result<VideoRecord, StoreError> {
        let conn = self.conn.lock().unwrap();

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO videos (id, created_at, updated_at, title, description, tags, \
             recorded_at, access_level, sensitive, original_file, target_quality, status) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                id,
                now.to_rfc3339(),
                now.to_rfc3339(),
                request.title,
                request.description,
                Self::to_json(&request.tags)?,
                request.recorded_at.to_rfc3339(),
                request.access_level,
                request.sensitive as i64,
                Self::to_json(&request.original_file)?,
                request.target_quality.as_str(),
                status.as_str(),
            ],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Self::fetch(&conn, &id)
    }
}

impl VideoStore for SqliteVideoStore {
    fn create(&self, request: CreateVideoRequest) -> Result<VideoRecord, StoreError> {
        self.insert(request, ProcessingStatus::Pending)
    }

    fn create_uploading(&self, request: CreateVideoRequest) -> Result<VideoRecord, StoreError> {
        self.insert(request, ProcessingStatus::Uploading)
    }

    fn finish_upload(&self, id: &str) -> Result<VideoRecord, StoreError> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();

        let updated = conn
            .execute(
                "UPDATE videos SET status = 'pending', updated_at = ? \
                 WHERE id = ? AND status = 'uploading'",
                params![now.to_rfc3339(), id],
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        if updated == 0 {
            let current = Self::fetch(&conn, id)?;
            return Err(StoreError::InvalidState {
                video_id: id.to_string(),
                current_status: current.status.as_str().to_string(),
                operation: "finish upload".to_string(),
            });
        }

        Self::fetch(&conn, id)
    }

    fn get(&self, id: &str) -> Result<Option<VideoRecord>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let sql = format!("SELECT {} FROM videos WHERE id = ?", COLUMNS);
        conn.query_row(&sql, params![id], Self::row_to_record)
            .optional()
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn list(&self, filter: &VideoFilter) -> Result<Vec<VideoRecord>, StoreError> {
        let conn = self.conn.lock().unwrap();

        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!(
            "SELECT {} FROM videos {} ORDER BY created_at DESC LIMIT ? OFFSET ?",
            COLUMNS, where_clause
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let mut all_params: Vec<Box<dyn rusqlite::ToSql>> = params;
        all_params.push(Box::new(filter.limit));
        all_params.push(Box::new(filter.offset));
        let param_refs: Vec<&dyn rusqlite::ToSql> = all_params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), Self::row_to_record)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let mut records = Vec::new();
        for row_result in rows {
            records.push(row_result.map_err(|e| StoreError::Database(e.to_string()))?);
        }
        Ok(records)
    }

    fn count(&self, filter: &VideoFilter) -> Result<i64, StoreError> {
        let conn = self.conn.lock().unwrap();

        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM videos {}", where_clause);
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn begin_processing(
        &self,
        id: &str,
        task_id: &str,
        quality: Option<QualityPreset>,
    ) -> Result<VideoRecord, StoreError> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();

        // Conditional update: only one caller can win the transition out of
        // pending/failed, which is what keeps concurrent runs off a record.
        let updated = if let Some(quality) = quality {
            conn.execute(
                "UPDATE videos SET status = 'processing', progress_pct = 0, stage = 'queued', \
                 error = NULL, task_id = ?, target_quality = ?, processing_started_at = ?, \
                 processing_completed_at = NULL, processing_time_secs = NULL, updated_at = ? \
                 WHERE id = ? AND status IN ('pending', 'failed')",
                params![task_id, quality.as_str(), now.to_rfc3339(), now.to_rfc3339(), id],
            )
        } else {
            conn.execute(
                "UPDATE videos SET status = 'processing', progress_pct = 0, stage = 'queued', \
                 error = NULL, task_id = ?, processing_started_at = ?, \
                 processing_completed_at = NULL, processing_time_secs = NULL, updated_at = ? \
                 WHERE id = ? AND status IN ('pending', 'failed')",
                params![task_id, now.to_rfc3339(), now.to_rfc3339(), id],
            )
        }
        .map_err(|e| StoreError::Database(e.to_string()))?;

        if updated == 0 {
            let current = Self::fetch(&conn, id)?;
            return Err(StoreError::InvalidState {
                video_id: id.to_string(),
                current_status: current.status.as_str().to_string(),
                operation: "begin processing".to_string(),
            });
        }

        Self::fetch(&conn, id)
    }

    fn update_progress(
        &self,
        id: &str,
        progress_pct: u8,
        stage: &str,
    ) -> Result<VideoRecord, StoreError> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();
        let pct = progress_pct.min(100) as i64;

        let updated = conn
            .execute(
                "UPDATE videos SET progress_pct = ?, stage = ?, updated_at = ? WHERE id = ?",
                params![pct, stage, now.to_rfc3339(), id],
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        if updated == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Self::fetch(&conn, id)
    }

    fn set_original_metadata(
        &self,
        id: &str,
        metadata: &OriginalMetadata,
    ) -> Result<VideoRecord, StoreError> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();

        let mut processing_metadata = Self::fetch_metadata(&conn, id)?;
        processing_metadata.original = Some(metadata.clone());

        conn.execute(
            "UPDATE videos SET duration_secs = ?, width = ?, height = ?, video_codec = ?, \
             video_bitrate_kbps = ?, container_format = ?, processing_metadata = ?, \
             updated_at = ? WHERE id = ?",
            params![
                metadata.duration_secs,
                metadata.width,
                metadata.height,
                metadata.video_codec,
                metadata.video_bitrate_kbps,
                metadata.container_format,
                Self::to_json(&processing_metadata)?,
                now.to_rfc3339(),
                id,
            ],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Self::fetch(&conn, id)
    }

    fn set_thumbnail(&self, id: &str, file: StoredFile) -> Result<VideoRecord, StoreError> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();

        let updated = conn
            .execute(
                "UPDATE videos SET thumbnail = ?, updated_at = ? WHERE id = ?",
                params![Self::to_json(&file)?, now.to_rfc3339(), id],
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        if updated == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Self::fetch(&conn, id)
    }

    fn set_compression_result(
        &self,
        id: &str,
        file: StoredFile,
        metadata: &CompressionMetadata,
    ) -> Result<VideoRecord, StoreError> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();

        let mut processing_metadata = Self::fetch_metadata(&conn, id)?;
        processing_metadata.compression = Some(metadata.clone());

        conn.execute(
            "UPDATE videos SET compressed_file = ?, compression_ratio = ?, \
             processing_metadata = ?, updated_at = ? WHERE id = ?",
            params![
                Self::to_json(&file)?,
                metadata.compression_ratio,
                Self::to_json(&processing_metadata)?,
                now.to_rfc3339(),
                id,
            ],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Self::fetch(&conn, id)
    }

    fn complete(&self, id: &str, outcome: CompletionOutcome) -> Result<VideoRecord, StoreError> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();

        let current = Self::fetch(&conn, id)?;
        let elapsed_secs = current
            .processing_started_at
            .map(|started| (now - started).num_milliseconds() as f64 / 1000.0);

        match outcome {
            CompletionOutcome::Success => {
                conn.execute(
                    "UPDATE videos SET status = 'completed', progress_pct = 100, \
                     stage = 'finished', error = NULL, processing_completed_at = ?, \
                     processing_time_secs = ?, updated_at = ? WHERE id = ?",
                    params![now.to_rfc3339(), elapsed_secs, now.to_rfc3339(), id],
                )
            }
            CompletionOutcome::Failure { error } => {
                conn.execute(
                    "UPDATE videos SET status = 'failed', error = ?, retry_count = retry_count + 1, \
                     processing_completed_at = ?, processing_time_secs = ?, updated_at = ? \
                     WHERE id = ?",
                    params![error, now.to_rfc3339(), elapsed_secs, now.to_rfc3339(), id],
                )
            }
        }
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Self::fetch(&conn, id)
    }

    fn cancel(&self, id: &str) -> Result<VideoRecord, StoreError> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();

        let updated = conn
            .execute(
                "UPDATE videos SET status = 'failed', error = 'Processing cancelled by user', \
                 processing_completed_at = ?, updated_at = ? \
                 WHERE id = ? AND status = 'processing'",
                params![now.to_rfc3339(), now.to_rfc3339(), id],
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        if updated == 0 {
            let current = Self::fetch(&conn, id)?;
            return Err(StoreError::InvalidState {
                video_id: id.to_string(),
                current_status: current.status.as_str().to_string(),
                operation: "cancel".to_string(),
            });
        }
        Self::fetch(&conn, id)
    }

    fn delete(&self, id: &str) -> Result<VideoRecord, StoreError> {
        let conn = self.conn.lock().unwrap();

        let record = Self::fetch(&conn, id)?;
        conn.execute("DELETE FROM videos WHERE id = ?", params![id])
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(record)
    }
}
