use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::{handlers, middleware, queue, videos};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Video records
        .route(
            "/videos",
            get(videos::list_videos).post(videos::register_video),
        )
        .route("/videos/process-batch", post(videos::process_batch))
        .route(
            "/videos/{id}",
            get(videos::get_video).delete(videos::delete_video),
        )
        .route("/videos/{id}/process", post(videos::process_video))
        .route("/videos/{id}/status", get(videos::video_status))
        .route("/videos/{id}/cancel", post(videos::cancel_video))
        .route("/videos/{id}/estimate", get(videos::estimate_video))
        // Queue and aggregates
        .route("/queue/status", get(queue::queue_status))
        .route("/statistics", get(queue::statistics));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .layer(axum_middleware::from_fn(middleware::metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
