//! Common test utilities for API testing with mock media tools.
//!
//! Provides an in-process server over a real temp-dir object store and an
//! in-memory record store, with media tooling mocked so no ffmpeg binary
//! is needed.

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use clinivid_core::media::MediaTools;
use clinivid_core::pipeline::{BatchCoordinator, PipelineConfig, VideoPipeline};
use clinivid_core::queue::{LocalQueue, QueueConfig};
use clinivid_core::record::{SqliteVideoStore, VideoStore};
use clinivid_core::storage::{FsObjectStore, ObjectStore, StorageConfig};
use clinivid_core::testing::MockMediaTools;
use clinivid_core::Config;

use clinivid_server::api::create_router;
use clinivid_server::state::AppState;

/// Test fixture wrapping an in-process server.
pub struct TestFixture {
    pub router: Router,
    pub state: Arc<AppState>,
    pub media: Arc<MockMediaTools>,
    pub temp_dir: TempDir,
}

/// Response from a test request.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    pub async fn new() -> Self {
        Self::with_media(MockMediaTools::healthy()).await
    }

    pub async fn with_media(media: MockMediaTools) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let media = Arc::new(media);

        let storage_config = StorageConfig::with_root(temp_dir.path().join("media"));
        let pipeline_config =
            PipelineConfig::default().with_temp_dir(temp_dir.path().join("work"));
        let queue_config = QueueConfig::default().with_retry_backoff(0);

        let config = Config {
            storage: storage_config.clone(),
            pipeline: pipeline_config.clone(),
            queue: queue_config.clone(),
            ..Default::default()
        };

        let store: Arc<dyn VideoStore> =
            Arc::new(SqliteVideoStore::in_memory().expect("Failed to create store"));
        let objects: Arc<dyn ObjectStore> = Arc::new(FsObjectStore::new(storage_config));
        objects.validate().await.expect("Failed to validate store");

        let pipeline = Arc::new(VideoPipeline::new(
            pipeline_config,
            Arc::clone(&store),
            Arc::clone(&media) as Arc<dyn MediaTools>,
            Arc::clone(&objects),
        ));
        let queue = Arc::new(LocalQueue::new(queue_config, Arc::clone(&pipeline)));
        let coordinator = BatchCoordinator::new(pipeline);

        let state = Arc::new(AppState::new(config, store, objects, queue, coordinator));
        let router = create_router(Arc::clone(&state));

        Self {
            router,
            state,
            media,
            temp_dir,
        }
    }

    /// Writes a dummy upload file and returns its path.
    pub fn write_upload(&self, name: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        std::fs::write(&path, b"not really a video, but nobody probes it")
            .expect("Failed to write upload");
        path
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.request(Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request(Method::POST, path, Some(body)).await
    }

    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.request(Method::POST, path, None).await
    }

    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request(Method::DELETE, path, None).await
    }

    async fn request(&self, method: Method, path: &str, body: Option<Value>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(path);
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(serde_json::to_vec(&json).unwrap())
            }
            None => Body::empty(),
        };
        let request = builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Request failed");

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read body")
            .to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::String(
                String::from_utf8_lossy(&bytes).to_string(),
            ))
        };

        TestResponse { status, body }
    }

    /// Registers a record through the API and returns its ID.
    pub async fn register(&self, title: &str, file_name: &str) -> String {
        let source = self.write_upload(file_name);
        let response = self
            .post(
                "/api/v1/videos",
                serde_json::json!({
                    "title": title,
                    "source_path": source,
                }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);
        response.body["id"].as_str().unwrap().to_string()
    }

    /// Waits until the task reaches a terminal state.
    pub async fn wait_for_task(&self, task_id: &str) {
        self.state
            .queue()
            .wait_for(task_id)
            .await
            .expect("Task vanished");
    }
}
