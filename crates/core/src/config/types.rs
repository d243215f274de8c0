use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::media::MediaConfig;
use crate::pipeline::PipelineConfig;
use crate::queue::QueueConfig;
use crate::storage::StorageConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    "0.0.0.0".parse().unwrap()
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("clinivid.db")
}

/// Sanitized config for API responses
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub media: SanitizedMediaConfig,
    pub storage: SanitizedStorageConfig,
    pub queue: QueueConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedMediaConfig {
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
    pub timeout_secs: u64,
    pub max_input_bytes: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedStorageConfig {
    pub root_dir: PathBuf,
    pub base_url: String,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            database: config.database.clone(),
            media: SanitizedMediaConfig {
                ffmpeg_path: config.media.ffmpeg_path.clone(),
                ffprobe_path: config.media.ffprobe_path.clone(),
                timeout_secs: config.media.timeout_secs,
                max_input_bytes: config.media.max_input_bytes,
            },
            storage: SanitizedStorageConfig {
                root_dir: config.storage.root_dir.clone(),
                base_url: config.storage.base_url.clone(),
            },
            queue: config.queue.clone(),
        }
    }
}
