pub mod config;
pub mod media;
pub mod metrics;
pub mod pipeline;
pub mod queue;
pub mod record;
pub mod storage;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
