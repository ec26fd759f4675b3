//! In-memory per-stream output, used by the `memory` storage mode and tests

use dashmap::DashMap;
use std::io;

use crate::storage::ChunkAppender;
use crate::types::StreamId;

/// Chunk payloads collected per stream in memory
#[derive(Debug, Default)]
pub struct MemoryChunkAppender {
    outputs: DashMap<StreamId, Vec<u8>>,
}

/// Open in-memory output for one stream
#[derive(Debug)]
pub struct MemoryHandle {
    stream_id: StreamId,
    origin_len: usize,
}

impl MemoryChunkAppender {
    /// Create an empty appender
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes written so far for a stream
    pub fn contents(&self, stream_id: &StreamId) -> Option<Vec<u8>> {
        self.outputs.get(stream_id).map(|bytes| bytes.clone())
    }
}

impl ChunkAppender for MemoryChunkAppender {
    type Handle = MemoryHandle;

    fn create_or_truncate(&self, stream_id: &StreamId) -> io::Result<MemoryHandle> {
        self.outputs.insert(stream_id.clone(), Vec::new());
        Ok(MemoryHandle { stream_id: stream_id.clone(), origin_len: 0 })
    }

    fn open_append(&self, stream_id: &StreamId) -> io::Result<MemoryHandle> {
        let origin_len = self.outputs.entry(stream_id.clone()).or_default().len();
        Ok(MemoryHandle { stream_id: stream_id.clone(), origin_len })
    }

    fn append(&self, handle: &mut MemoryHandle, bytes: &[u8]) -> io::Result<()> {
        self.outputs
            .entry(handle.stream_id.clone())
            .or_default()
            .extend_from_slice(bytes);
        Ok(())
    }

    fn rewind(&self, handle: &mut MemoryHandle) -> io::Result<()> {
        if let Some(mut bytes) = self.outputs.get_mut(&handle.stream_id) {
            bytes.truncate(handle.origin_len);
        }
        Ok(())
    }
}
