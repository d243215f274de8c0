use std::sync::Arc;

use clinivid_core::pipeline::BatchCoordinator;
use clinivid_core::queue::LocalQueue;
use clinivid_core::record::VideoStore;
use clinivid_core::storage::ObjectStore;
use clinivid_core::{Config, SanitizedConfig};

/// Shared application state
pub struct AppState {
    config: Config,
    store: Arc<dyn VideoStore>,
    objects: Arc<dyn ObjectStore>,
    queue: Arc<LocalQueue>,
    coordinator: BatchCoordinator,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn VideoStore>,
        objects: Arc<dyn ObjectStore>,
        queue: Arc<LocalQueue>,
        coordinator: BatchCoordinator,
    ) -> Self {
        Self {
            config,
            store,
            objects,
            queue,
            coordinator,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn store(&self) -> &Arc<dyn VideoStore> {
        &self.store
    }

    pub fn objects(&self) -> &Arc<dyn ObjectStore> {
        &self.objects
    }

    pub fn queue(&self) -> &Arc<LocalQueue> {
        &self.queue
    }

    pub fn coordinator(&self) -> &BatchCoordinator {
        &self.coordinator
    }
}
