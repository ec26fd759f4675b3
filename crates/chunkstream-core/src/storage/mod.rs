//! Storage layer for Chunkstream
//!
//! Two collaborators back the ingestion coordinator:
//! - a [`StateStore`] holding the durable "last applied chunk" snapshot
//! - a [`ChunkAppender`] writing chunk payloads to the per-stream output

use crate::types::{StoreError, StreamId, StreamState};

/// Durable stream state snapshot (JSON file)
pub mod state_file;

/// In-memory stream state snapshot
pub mod state_memory;

/// Per-stream output files
pub mod chunk_file;

/// In-memory per-stream output
pub mod chunk_memory;

pub use state_file::JsonFileStateStore;
pub use state_memory::MemoryStateStore;
pub use chunk_file::{FileChunkAppender, FileHandle};
pub use chunk_memory::{MemoryChunkAppender, MemoryHandle};

/// Crash-consistent store of the per-stream progress snapshot.
///
/// The whole snapshot is read and rewritten on every change; there is no
/// incremental API. Callers that mutate the snapshot are responsible for
/// serializing their load-modify-save cycles.
pub trait StateStore: Send + Sync + 'static {
    /// Read the current snapshot.
    ///
    /// A missing, unreadable or corrupt snapshot yields an empty state.
    fn load(&self) -> StreamState;

    /// Replace the snapshot.
    ///
    /// A concurrent `load` observes either the previous or the new snapshot
    /// in full.
    fn save(&self, state: &StreamState) -> Result<(), StoreError>;
}

/// Writer for per-stream chunk payloads.
///
/// Every write is durable before the call returns.
pub trait ChunkAppender: Send + Sync + 'static {
    /// Open output handle
    type Handle: Send + 'static;

    /// Create the stream's output, discarding any previous content
    fn create_or_truncate(&self, stream_id: &StreamId) -> std::io::Result<Self::Handle>;

    /// Open the stream's output for appending
    fn open_append(&self, stream_id: &StreamId) -> std::io::Result<Self::Handle>;

    /// Append bytes to the output
    fn append(&self, handle: &mut Self::Handle, bytes: &[u8]) -> std::io::Result<()>;

    /// Restore the output to the length it had when the handle was opened
    fn rewind(&self, handle: &mut Self::Handle) -> std::io::Result<()>;
}
