use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clinivid_core::media::{FfmpegTools, MediaTools};
use clinivid_core::pipeline::{cleanup_temp_files, BatchCoordinator, VideoPipeline};
use clinivid_core::queue::LocalQueue;
use clinivid_core::record::{SqliteVideoStore, VideoStore};
use clinivid_core::storage::{FsObjectStore, ObjectStore};
use clinivid_core::{load_config, validate_config};

use clinivid_server::api::create_router;
use clinivid_server::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// How often stale working directories are swept.
const TEMP_SWEEP_INTERVAL_SECS: u64 = 3600;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("CLINIVID_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    // Config hash identifies the running configuration in logs without
    // leaking its contents.
    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!(
        version = VERSION,
        config_hash = &config_hash[..16],
        "Configuration loaded"
    );
    info!("Database path: {:?}", config.database.path);
    info!("Media root: {:?}", config.storage.root_dir);

    // Create SQLite video store
    let store: Arc<dyn VideoStore> = Arc::new(
        SqliteVideoStore::new(&config.database.path).context("Failed to create video store")?,
    );
    info!("Video store initialized");

    // Create object store and ensure category directories exist
    let objects: Arc<dyn ObjectStore> = Arc::new(FsObjectStore::new(config.storage.clone()));
    objects
        .validate()
        .await
        .context("Object store validation failed")?;
    info!("Object store initialized ({})", objects.name());

    // Create media tools; a missing ffmpeg is reported but not fatal so
    // the API stays up for registration and querying.
    let media: Arc<dyn MediaTools> = Arc::new(FfmpegTools::new(config.media.clone()));
    match media.validate().await {
        Ok(()) => info!("Media tools validated ({})", media.name()),
        Err(e) => warn!("Media tools degraded: {}", e),
    }

    // Create pipeline and queue
    let pipeline = Arc::new(VideoPipeline::new(
        config.pipeline.clone(),
        Arc::clone(&store),
        media,
        Arc::clone(&objects),
    ));
    let queue = Arc::new(LocalQueue::new(config.queue.clone(), Arc::clone(&pipeline)));
    let coordinator = BatchCoordinator::new(Arc::clone(&pipeline))
        .with_max_retries(config.queue.max_attempts);
    info!(
        max_concurrent = config.queue.max_concurrent,
        "Processing queue initialized"
    );

    // Sweep stale working directories left behind by interrupted runs.
    let temp_dir = config.pipeline.temp_dir.clone();
    let temp_max_age = config.pipeline.temp_max_age_secs;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(TEMP_SWEEP_INTERVAL_SECS));
        loop {
            interval.tick().await;
            match cleanup_temp_files(&temp_dir, temp_max_age).await {
                Ok(0) => {}
                Ok(removed) => info!(removed, "Removed stale temp entries"),
                Err(e) => warn!("Temp cleanup failed: {}", e),
            }
        }
    });

    // Create app state
    let state = Arc::new(AppState::new(
        config.clone(),
        store,
        objects,
        queue,
        coordinator,
    ));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shut down");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
