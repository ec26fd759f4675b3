//! HTTP API module for Chunkstream server
//!
//! ## Endpoints
//! - `POST /chunk` - upload one chunk (multipart: `audio`, `chunk_index`, `stream_id`)
//! - `GET /api/streams/{id}` - last applied chunk index of a stream
//! - `GET /health` - health check
//! - `GET /info` - service info and capabilities
//! - `GET /metrics` - Prometheus metrics
//! - `GET /static/*` - client UI files, when a static directory is configured

/// HTTP request handlers
pub mod api_handlers;

/// HTTP server implementation
pub mod api_server;

// Re-export commonly used items
pub use api_server::{create_router, start_api_server, ServerError};
