//! API integration tests over an in-process router.

mod common;

use axum::http::StatusCode;
use serde_json::json;

use clinivid_core::testing::MockMediaTools;
use common::TestFixture;

#[tokio::test]
async fn test_health() {
    let fixture = TestFixture::new().await;
    let response = fixture.get("/api/v1/health").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
    assert!(response.body["version"].is_string());
}

#[tokio::test]
async fn test_config_is_sanitized() {
    let fixture = TestFixture::new().await;
    let response = fixture.get("/api/v1/config").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["server"]["port"], 8080);
    assert!(response.body["media"]["ffmpeg_path"].is_string());
    assert!(response.body["storage"]["base_url"].is_string());
}

#[tokio::test]
async fn test_register_and_get_video() {
    let fixture = TestFixture::new().await;
    let source = fixture.write_upload("session.mp4");

    let response = fixture
        .post(
            "/api/v1/videos",
            json!({
                "title": "Gait assessment",
                "description": "Post-op follow-up",
                "tags": ["gait", "orthopedics"],
                "sensitive": true,
                "source_path": source,
            }),
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);
    assert_eq!(response.body["title"], "Gait assessment");
    assert_eq!(response.body["status"], "pending");
    assert_eq!(response.body["target_quality"], "medium");
    assert_eq!(response.body["sensitive"], true);
    let url = response.body["original"]["url"].as_str().unwrap();
    assert!(url.starts_with("/media/originals/"));
    // The upload was consumed by the store.
    assert!(!source.exists());

    let id = response.body["id"].as_str().unwrap();
    let response = fixture.get(&format!("/api/v1/videos/{}", id)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["id"], id);
    assert_eq!(response.body["tags"][0], "gait");
}

#[tokio::test]
async fn test_register_rejects_empty_title() {
    let fixture = TestFixture::new().await;
    let source = fixture.write_upload("a.mp4");
    let response = fixture
        .post(
            "/api/v1/videos",
            json!({ "title": "  ", "source_path": source }),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_register_rejects_unsupported_extension() {
    let fixture = TestFixture::new().await;
    let source = fixture.write_upload("report.pdf");
    let response = fixture
        .post(
            "/api/v1/videos",
            json!({ "title": "Report", "source_path": source }),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.body["error"]
        .as_str()
        .unwrap()
        .contains("unsupported"));
}

#[tokio::test]
async fn test_register_rejects_missing_source() {
    let fixture = TestFixture::new().await;
    let response = fixture
        .post(
            "/api/v1/videos",
            json!({
                "title": "Ghost",
                "source_path": fixture.temp_dir.path().join("nope.mp4"),
            }),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_videos_with_filters() {
    let fixture = TestFixture::new().await;
    fixture.register("First", "a.mp4").await;
    fixture.register("Second", "b.mp4").await;

    let response = fixture.get("/api/v1/videos").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["total"], 2);
    assert_eq!(response.body["videos"].as_array().unwrap().len(), 2);

    let response = fixture.get("/api/v1/videos?status=pending&limit=1").await;
    assert_eq!(response.body["total"], 2);
    assert_eq!(response.body["videos"].as_array().unwrap().len(), 1);
    assert_eq!(response.body["limit"], 1);

    let response = fixture.get("/api/v1/videos?status=completed").await;
    assert_eq!(response.body["total"], 0);
}

#[tokio::test]
async fn test_list_rejects_unknown_status() {
    let fixture = TestFixture::new().await;
    let response = fixture.get("/api/v1/videos?status=exploded").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_unknown_video() {
    let fixture = TestFixture::new().await;
    let response = fixture.get("/api/v1/videos/missing").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_process_video_to_completion() {
    let fixture = TestFixture::new().await;
    let id = fixture.register("Knee arthroscopy", "knee.mp4").await;

    let response = fixture
        .post_empty(&format!("/api/v1/videos/{}/process", id))
        .await;
    assert_eq!(response.status, StatusCode::ACCEPTED, "{:?}", response.body);
    let task_id = response.body["task_id"].as_str().unwrap().to_string();

    fixture.wait_for_task(&task_id).await;

    let response = fixture
        .get(&format!("/api/v1/videos/{}/status", id))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "completed");
    assert_eq!(response.body["progress_pct"], 100);
    assert_eq!(response.body["task"]["state"], "completed");

    let response = fixture.get(&format!("/api/v1/videos/{}", id)).await;
    assert_eq!(response.body["status"], "completed");
    assert!(response.body["compressed"]["url"]
        .as_str()
        .unwrap()
        .starts_with("/media/compressed/"));
    assert!(response.body["thumbnail"]["url"]
        .as_str()
        .unwrap()
        .starts_with("/media/thumbnails/"));
    assert_eq!(response.body["playback_url"], response.body["compressed"]["url"]);
    assert!(response.body["duration_secs"].as_f64().unwrap() > 0.0);
}

#[tokio::test]
async fn test_status_document_after_completion() {
    let fixture = TestFixture::new().await;
    let id = fixture.register("Hip replacement", "hip.mp4").await;

    let response = fixture
        .post_empty(&format!("/api/v1/videos/{}/process", id))
        .await;
    let task_id = response.body["task_id"].as_str().unwrap().to_string();
    fixture.wait_for_task(&task_id).await;

    let response = fixture
        .get(&format!("/api/v1/videos/{}/status", id))
        .await;
    assert_eq!(response.status, StatusCode::OK, "{:?}", response.body);
    let body = &response.body;
    assert_eq!(body["video_id"], id);
    assert_eq!(body["status"], "completed");
    assert_eq!(body["progress_pct"], 100);
    assert_eq!(body["stage"], "finished");
    assert_eq!(body["retry_count"], 0);
    assert_eq!(body["task_id"], task_id);
    assert!(body["processing_started_at"].is_string());
    assert!(body["processing_completed_at"].is_string());
    assert!(body["processing_time_secs"].as_f64().unwrap() >= 0.0);
    assert!(body["formatted_processing_time"].is_string());
    assert!(body["original"]["url"]
        .as_str()
        .unwrap()
        .starts_with("/media/originals/"));
    assert!(body["compressed"]["url"]
        .as_str()
        .unwrap()
        .starts_with("/media/compressed/"));
    assert!(body["thumbnail"]["url"]
        .as_str()
        .unwrap()
        .starts_with("/media/thumbnails/"));
    assert_eq!(body["task"]["state"], "completed");
    assert_eq!(body["task"]["progress_pct"], 100);
}

#[tokio::test]
async fn test_process_with_quality_override() {
    let fixture = TestFixture::new().await;
    let id = fixture.register("Shoulder exam", "shoulder.mp4").await;

    let response = fixture
        .post_empty(&format!("/api/v1/videos/{}/process?quality=mobile", id))
        .await;
    assert_eq!(response.status, StatusCode::ACCEPTED);
    let task_id = response.body["task_id"].as_str().unwrap().to_string();
    fixture.wait_for_task(&task_id).await;

    let response = fixture.get(&format!("/api/v1/videos/{}", id)).await;
    assert_eq!(response.body["target_quality"], "mobile");
    assert!(response.body["compressed"]["name"]
        .as_str()
        .unwrap()
        .ends_with("_mobile.mp4"));
}

#[tokio::test]
async fn test_process_unknown_video() {
    let fixture = TestFixture::new().await;
    let response = fixture.post_empty("/api/v1/videos/ghost/process").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_process_completed_video_conflicts() {
    let fixture = TestFixture::new().await;
    let id = fixture.register("Done", "done.mp4").await;

    let response = fixture
        .post_empty(&format!("/api/v1/videos/{}/process", id))
        .await;
    let task_id = response.body["task_id"].as_str().unwrap().to_string();
    fixture.wait_for_task(&task_id).await;

    let response = fixture
        .post_empty(&format!("/api/v1/videos/{}/process", id))
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_failed_video_can_be_reprocessed() {
    let media = MockMediaTools::healthy();
    media.fail_compression("encoder exploded");
    let fixture = TestFixture::with_media(media).await;
    let id = fixture.register("Flaky", "flaky.mp4").await;

    let response = fixture
        .post_empty(&format!("/api/v1/videos/{}/process", id))
        .await;
    let task_id = response.body["task_id"].as_str().unwrap().to_string();
    fixture.wait_for_task(&task_id).await;

    let response = fixture.get(&format!("/api/v1/videos/{}", id)).await;
    assert_eq!(response.body["status"], "failed");
    assert!(response.body["error"]
        .as_str()
        .unwrap()
        .contains("Compression failed"));
    assert_eq!(response.body["retry_count"], 1);

    // The injected error fired once; the retry succeeds.
    let response = fixture
        .post_empty(&format!("/api/v1/videos/{}/process", id))
        .await;
    assert_eq!(response.status, StatusCode::ACCEPTED);
    let task_id = response.body["task_id"].as_str().unwrap().to_string();
    fixture.wait_for_task(&task_id).await;

    let response = fixture.get(&format!("/api/v1/videos/{}", id)).await;
    assert_eq!(response.body["status"], "completed");
}

#[tokio::test]
async fn test_cancel_pending_video_conflicts() {
    let fixture = TestFixture::new().await;
    let id = fixture.register("Waiting", "wait.mp4").await;

    let response = fixture
        .post_empty(&format!("/api/v1/videos/{}/cancel", id))
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_cancel_unknown_video() {
    let fixture = TestFixture::new().await;
    let response = fixture.post_empty("/api/v1/videos/ghost/cancel").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_estimate_requires_metadata() {
    let fixture = TestFixture::new().await;
    let id = fixture.register("Fresh", "fresh.mp4").await;

    let response = fixture
        .get(&format!("/api/v1/videos/{}/estimate", id))
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_estimate_after_processing() {
    let fixture = TestFixture::new().await;
    let id = fixture.register("Measured", "measured.mp4").await;

    let response = fixture
        .post_empty(&format!("/api/v1/videos/{}/process", id))
        .await;
    let task_id = response.body["task_id"].as_str().unwrap().to_string();
    fixture.wait_for_task(&task_id).await;

    // Default mock report is 120s; medium scales by 1.0.
    let response = fixture
        .get(&format!("/api/v1/videos/{}/estimate", id))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["preset"], "medium");
    assert!((response.body["estimated_secs"].as_f64().unwrap() - 120.0).abs() < 0.001);

    let response = fixture
        .get(&format!("/api/v1/videos/{}/estimate?quality=original", id))
        .await;
    assert_eq!(response.body["preset"], "original");
    assert!((response.body["estimated_secs"].as_f64().unwrap() - 12.0).abs() < 0.001);
}

#[tokio::test]
async fn test_delete_video_removes_record_and_files() {
    let fixture = TestFixture::new().await;
    let id = fixture.register("Short lived", "gone.mp4").await;

    let response = fixture.get(&format!("/api/v1/videos/{}", id)).await;
    let original_name = response.body["original"]["name"].as_str().unwrap().to_string();
    let original_path = fixture
        .temp_dir
        .path()
        .join("media/originals")
        .join(&original_name);
    assert!(original_path.exists());

    let response = fixture.delete(&format!("/api/v1/videos/{}", id)).await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);
    assert!(!original_path.exists());

    let response = fixture.get(&format!("/api/v1/videos/{}", id)).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_unknown_video() {
    let fixture = TestFixture::new().await;
    let response = fixture.delete("/api/v1/videos/ghost").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_process_batch() {
    let fixture = TestFixture::new().await;
    fixture.register("Batch A", "a.mp4").await;
    fixture.register("Batch B", "b.mp4").await;

    let response = fixture.post_empty("/api/v1/videos/process-batch").await;
    assert_eq!(response.status, StatusCode::ACCEPTED, "{:?}", response.body);
    let submitted = response.body["submitted"].as_array().unwrap();
    assert_eq!(submitted.len(), 2);
    assert_eq!(response.body["total"], 2);

    for entry in submitted {
        let task_id = entry["task_id"].as_str().unwrap().to_string();
        fixture.wait_for_task(&task_id).await;
    }

    let response = fixture.get("/api/v1/statistics").await;
    assert_eq!(response.body["by_status"]["completed"], 2);
}

#[tokio::test]
async fn test_queue_status() {
    let fixture = TestFixture::new().await;
    let response = fixture.get("/api/v1/queue/status").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["max_concurrent"], 3);
    assert_eq!(response.body["active"], 0);
}

#[tokio::test]
async fn test_statistics_counts_by_status() {
    let fixture = TestFixture::new().await;
    fixture.register("One", "one.mp4").await;

    let response = fixture.get("/api/v1/statistics").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["total"], 1);
    assert_eq!(response.body["by_status"]["pending"], 1);
    assert_eq!(response.body["by_status"]["completed"], 0);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let fixture = TestFixture::new().await;
    fixture.register("Counted", "counted.mp4").await;

    let response = fixture.get("/metrics").await;
    assert_eq!(response.status, StatusCode::OK);
    let text = response.body.as_str().unwrap();
    assert!(text.contains("clinivid_videos_by_status"));
    assert!(text.contains("clinivid_queue_active"));
}
