use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Queue concurrency and attempt caps are non-zero
/// - Media timeout and input size cap are non-zero
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.queue.max_concurrent == 0 {
        return Err(ConfigError::ValidationError(
            "queue.max_concurrent cannot be 0".to_string(),
        ));
    }

    if config.queue.max_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "queue.max_attempts cannot be 0".to_string(),
        ));
    }

    if config.media.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "media.timeout_secs cannot be 0".to_string(),
        ));
    }

    if config.media.max_input_bytes == 0 {
        return Err(ConfigError::ValidationError(
            "media.max_input_bytes cannot be 0".to_string(),
        ));
    }

    if config.pipeline.batch_limit == 0 {
        return Err(ConfigError::ValidationError(
            "pipeline.batch_limit cannot be 0".to_string(),
        ));
    }

    Ok(())
}
