//! # Chunkstream Server
//!
//! HTTP front end for Chunkstream: receives chunk uploads and hands them to
//! the ingestion coordinator from `chunkstream-core`.

#![warn(missing_docs)]

/// HTTP API handlers and routing
pub mod api;

/// Log subscriber setup
pub mod logging;

// Re-export core functionality
pub use chunkstream_core::*;
