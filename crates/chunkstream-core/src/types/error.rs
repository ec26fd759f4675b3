//! Error types for Chunkstream
//!
//! Only terminal conditions cross the ingestion boundary. Waiting for a
//! predecessor chunk is resolved inside the coordinator, and an unreadable
//! state snapshot is treated as empty state rather than reported.

use std::path::PathBuf;
use thiserror::Error;
use crate::types::{ChunkIndex, StreamId};

/// Failures persisting the state snapshot
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure while writing or replacing the snapshot
    #[error("state snapshot I/O failed for {path}: {source}")]
    Io {
        /// Path being written
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
    /// Snapshot could not be encoded
    #[error("failed to encode state snapshot: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Terminal outcomes of a chunk ingestion request
#[derive(Debug, Error)]
pub enum IngestError {
    /// Chunk index > 0 for a stream whose chunk 0 was never recorded
    #[error("Stream {stream_id} not initialized")]
    UnknownStream {
        /// Stream the chunk was addressed to
        stream_id: StreamId,
    },
    /// Predecessor chunk did not arrive within the wait budget
    #[error("Timeout waiting for chunk {awaiting} of stream {stream_id} (last applied {last_applied})")]
    PredecessorTimeout {
        /// Stream the chunk was addressed to
        stream_id: StreamId,
        /// Index of the chunk that was refused
        chunk_index: ChunkIndex,
        /// Index of the predecessor that never arrived
        awaiting: ChunkIndex,
        /// Last applied index observed before giving up
        last_applied: ChunkIndex,
    },
    /// Writing the chunk payload failed
    #[error("failed to append chunk {chunk_index} to stream {stream_id}: {source}")]
    Append {
        /// Stream the chunk was addressed to
        stream_id: StreamId,
        /// Index of the chunk being written
        chunk_index: ChunkIndex,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
    /// Persisting the updated state snapshot failed
    #[error(transparent)]
    State(#[from] StoreError),
    /// A blocking storage task panicked or was cancelled
    #[error("storage task failed: {0}")]
    Task(String),
}

impl IngestError {
    /// Short machine-readable reason code
    pub fn reason(&self) -> &'static str {
        match self {
            IngestError::UnknownStream { .. } => "unknown_stream",
            IngestError::PredecessorTimeout { .. } => "timeout",
            IngestError::Append { .. } | IngestError::State(_) | IngestError::Task(_) => "storage",
        }
    }

    /// Whether the failure is attributable to the client request rather than the server
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            IngestError::UnknownStream { .. } | IngestError::PredecessorTimeout { .. }
        )
    }
}
