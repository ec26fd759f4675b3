//! # Chunkstream Core
//!
//! Core types and ordering logic for Chunkstream.
//! Chunks of a recording arrive over independent requests and are appended,
//! strictly in index order, to one output file per stream. The durable
//! per-stream progress record lives in a [`storage::StateStore`] and the
//! admission decisions are made by [`ingest::ChunkIngestionCoordinator`].

#![warn(missing_docs)]

/// Application core: configuration, logging, application state
pub mod core;

/// Type definitions: stream identifiers, stream state, errors
pub mod types;

/// System constants
pub mod constants;

/// Durable stream state and chunk output backends
pub mod storage;

/// Chunk admission and ordering
pub mod ingest;

/// System utilities and metrics
pub mod system;

// Re-export commonly used items
pub use types::{ChunkIndex, IngestError, StreamId, StreamRecord, StreamState};
pub use storage::{ChunkAppender, StateStore};
pub use ingest::{Admission, ChunkIngestionCoordinator, IngestPolicy};

/// Crate version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Logging macros expand to `$crate::tracing::*`
#[doc(hidden)]
pub use tracing;
