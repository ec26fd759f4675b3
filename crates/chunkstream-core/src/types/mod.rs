//! Type definitions for streams, chunks and errors

/// Stream identifiers
pub mod ids;

/// Stream progress records and the state snapshot
pub mod stream;

/// Error types
pub mod error;

pub use ids::{InvalidStreamId, StreamId};
pub use stream::{ChunkIndex, StreamRecord, StreamState};
pub use error::{IngestError, StoreError};
