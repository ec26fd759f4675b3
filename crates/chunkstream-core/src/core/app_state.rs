//! Application state
//!
//! Central state shared by every request handler: the configured ingestion
//! coordinator and the configuration it was built from.

use std::sync::Arc;
use std::time::Instant;

use crate::core::config::Config;
use crate::ingest::ChunkIngestionCoordinator;
use crate::storage::{ChunkAppender, StateStore};

/// Central application state holding all services and components
pub struct AppState<S: StateStore, A: ChunkAppender> {
    /// Chunk ordering coordinator
    pub coordinator: Arc<ChunkIngestionCoordinator<S, A>>,

    /// Application configuration
    pub config: Config,

    /// Process start time, for uptime reporting
    pub started_at: Instant,
}

// Manual Clone implementation: only the Arc is cloned, S and A need not be Clone
impl<S: StateStore, A: ChunkAppender> Clone for AppState<S, A> {
    fn clone(&self) -> Self {
        Self {
            coordinator: self.coordinator.clone(),
            config: self.config.clone(),
            started_at: self.started_at,
        }
    }
}

impl<S: StateStore, A: ChunkAppender> AppState<S, A> {
    /// Create a new AppState around an already configured coordinator
    pub fn new(coordinator: Arc<ChunkIngestionCoordinator<S, A>>, config: Config) -> Self {
        Self {
            coordinator,
            config,
            started_at: Instant::now(),
        }
    }
}
