//! Application Factory
//!
//! Builds the [`AppState`] for the storage backend selected in the
//! configuration, bootstrapping on-disk directories where needed.

use std::sync::Arc;
use thiserror::Error;

use crate::core::app_state::AppState;
use crate::core::config::{Config, ConfigError, StorageType};
use crate::ingest::{ChunkIngestionCoordinator, IngestPolicy};
use crate::storage::{FileChunkAppender, JsonFileStateStore, MemoryChunkAppender, MemoryStateStore};
use crate::log_info;

/// AppState factory errors
#[derive(Debug, Error)]
pub enum AppStateFactoryError {
    /// Storage directories could not be prepared
    #[error("Storage initialization failed for {path}: {source}")]
    StorageInitializationFailed {
        /// Directory being created
        path: std::path::PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(#[from] ConfigError),
}

/// AppState with the on-disk backends
pub type DiskAppState = AppState<JsonFileStateStore, FileChunkAppender>;

/// AppState with the in-memory backends
pub type MemoryAppState = AppState<MemoryStateStore, MemoryChunkAppender>;

/// Enum to hold different AppState configurations
pub enum ConfiguredAppState {
    /// JSON snapshot and output files on disk
    Disk {
        /// The application state with disk storage
        app_state: DiskAppState,
    },
    /// In-memory storage
    Memory {
        /// The application state with memory storage
        app_state: MemoryAppState,
    },
}

impl ConfiguredAppState {
    /// Get the configuration the state was built from
    pub fn config(&self) -> &Config {
        match self {
            ConfiguredAppState::Disk { app_state } => &app_state.config,
            ConfiguredAppState::Memory { app_state } => &app_state.config,
        }
    }

    /// Get the HTTP address from config
    pub fn http_addr(&self) -> std::net::SocketAddr {
        self.config().server.http_addr
    }
}

/// Create AppState based on configuration
pub fn create_app_state(config: Config) -> Result<ConfiguredAppState, AppStateFactoryError> {
    config.validate()?;
    log_info!("Creating AppState with storage type: {:?}", config.storage.storage_type);

    let policy = IngestPolicy::from(&config.ingest);

    match config.storage.storage_type {
        StorageType::Disk => {
            let state_path = config.storage.state_path();
            let audio_path = config.storage.audio_path();

            for dir in [Some(audio_path.as_path()), state_path.parent()].into_iter().flatten() {
                if dir.as_os_str().is_empty() {
                    continue;
                }
                if !dir.exists() {
                    std::fs::create_dir_all(dir).map_err(|source| {
                        AppStateFactoryError::StorageInitializationFailed {
                            path: dir.to_path_buf(),
                            source,
                        }
                    })?;
                    log_info!("Created directory: {:?}", dir);
                }
            }

            let store = Arc::new(JsonFileStateStore::new(state_path));
            let appender = Arc::new(FileChunkAppender::with_extension(
                audio_path,
                config.storage.file_extension.clone(),
            ));
            log_info!(
                "Disk storage ready (state {:?}, outputs {:?})",
                store.path(),
                appender.dir()
            );

            let coordinator = Arc::new(ChunkIngestionCoordinator::new(store, appender, policy));
            Ok(ConfiguredAppState::Disk { app_state: AppState::new(coordinator, config) })
        }
        StorageType::Memory => {
            log_info!("Initializing in-memory storage; progress is lost on restart");
            let coordinator = Arc::new(ChunkIngestionCoordinator::new(
                Arc::new(MemoryStateStore::new()),
                Arc::new(MemoryChunkAppender::new()),
                policy,
            ));
            Ok(ConfiguredAppState::Memory { app_state: AppState::new(coordinator, config) })
        }
    }
}
