//! Configuration for Chunkstream
//!
//! Settings are read from a TOML file, then environment variables, then CLI
//! flags (applied by the server binary). Every section has defaults so that
//! an empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::constants::{
    DEFAULT_AUDIO_DIR, DEFAULT_FILE_EXTENSION, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_CHUNK_BYTES,
    DEFAULT_POLL_INTERVAL_MS, DEFAULT_STATE_FILE,
};
use crate::{log_info, log_warn};

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// Config file path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
    /// Config file is not valid TOML for this schema
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    /// A setting holds an unusable value
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Available storage backend types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    /// JSON state snapshot and output files on disk
    Disk,
    /// Process memory only; nothing survives a restart
    Memory,
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,

    /// Storage configuration
    pub storage: StorageConfig,

    /// Chunk ordering configuration
    pub ingest: IngestConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTP server bind address
    pub http_addr: SocketAddr,

    /// Directory served under `/static` (client UI), if any
    pub static_dir: Option<PathBuf>,

    /// Maximum request body accepted for one chunk upload
    pub max_chunk_bytes: usize,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Storage backend type
    pub storage_type: StorageType,

    /// Base directory for the state snapshot and stream outputs
    pub data_dir: PathBuf,

    /// State snapshot file, relative to `data_dir` unless absolute
    pub state_file: PathBuf,

    /// Stream output directory, relative to `data_dir` unless absolute
    pub audio_dir: PathBuf,

    /// Extension of stream output files
    pub file_extension: String,
}

/// Chunk ordering configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Polls allowed while waiting for a predecessor chunk
    pub max_attempts: u32,

    /// Delay between polls, in milliseconds
    pub poll_interval_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            static_dir: None,
            max_chunk_bytes: DEFAULT_MAX_CHUNK_BYTES,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_type: StorageType::Disk,
            data_dir: PathBuf::from("."),
            state_file: PathBuf::from(DEFAULT_STATE_FILE),
            audio_dir: PathBuf::from(DEFAULT_AUDIO_DIR),
            file_extension: DEFAULT_FILE_EXTENSION.to_string(),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

impl StorageConfig {
    /// Resolved path of the state snapshot
    pub fn state_path(&self) -> PathBuf {
        self.data_dir.join(&self.state_file)
    }

    /// Resolved directory of the stream outputs
    pub fn audio_path(&self) -> PathBuf {
        self.data_dir.join(&self.audio_dir)
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&contents)?)
    }

    /// Apply `CHUNKSTREAM_*` environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(addr) = var("CHUNKSTREAM_HTTP_ADDR") {
            self.server.http_addr = addr
                .parse()
                .map_err(|e| ConfigError::Invalid(format!("Invalid HTTP address {addr:?}: {e}")))?;
        }

        if let Some(data_dir) = var("CHUNKSTREAM_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(data_dir);
        }

        if let Some(level) = var("CHUNKSTREAM_LOG_LEVEL") {
            self.logging.level = level;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ingest.max_attempts == 0 {
            return Err(ConfigError::Invalid("ingest.max_attempts must be at least 1".into()));
        }

        if self.ingest.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("ingest.poll_interval_ms must be at least 1".into()));
        }

        if self.server.max_chunk_bytes == 0 {
            return Err(ConfigError::Invalid("server.max_chunk_bytes must be at least 1".into()));
        }

        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => return Err(ConfigError::Invalid(format!("Invalid log level {other:?}"))),
        }

        Ok(())
    }
}

/// Load configuration from file
pub fn load_config(path: &str) -> Result<Config, ConfigError> {
    let config = Config::from_file(path)?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from file or use defaults
pub fn load_config_or_default(path: Option<&str>) -> Config {
    match path {
        Some(path) => match load_config(path) {
            Ok(config) => {
                log_info!("Loaded configuration from: {}", path);
                config
            }
            Err(e) => {
                log_warn!("Failed to load config from {}: {}. Using defaults.", path, e);
                Config::default()
            }
        },
        None => {
            log_info!("No config file specified, using defaults");
            Config::default()
        }
    }
}
