//! Stream progress records and the persisted state snapshot

use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use crate::types::StreamId;

/// Zero-based position of a chunk within its stream
pub type ChunkIndex = u64;

/// Progress of a single stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamRecord {
    /// Stream identifier
    pub stream_id: StreamId,
    /// Index of the most recent chunk durably appended
    pub last_applied_index: ChunkIndex,
}

/// Snapshot of every stream's progress.
///
/// Serialized as a flat JSON object, `{"<stream_id>": <last_applied_index>}`.
/// The map is ordered so that rewritten snapshots are byte-stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamState {
    streams: BTreeMap<StreamId, ChunkIndex>,
}

impl StreamState {
    /// Create an empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Last applied index for a stream, `None` if the stream was never initialized
    pub fn last_applied(&self, stream_id: &StreamId) -> Option<ChunkIndex> {
        self.streams.get(stream_id).copied()
    }

    /// Record for a stream
    pub fn record(&self, stream_id: &StreamId) -> Option<StreamRecord> {
        self.last_applied(stream_id).map(|last_applied_index| StreamRecord {
            stream_id: stream_id.clone(),
            last_applied_index,
        })
    }

    /// Set the last applied index for a stream, returning the previous value
    pub fn set_last_applied(&mut self, stream_id: StreamId, index: ChunkIndex) -> Option<ChunkIndex> {
        self.streams.insert(stream_id, index)
    }

    /// Drop a stream's record, returning its last applied index
    pub fn remove(&mut self, stream_id: &StreamId) -> Option<ChunkIndex> {
        self.streams.remove(stream_id)
    }

    /// Whether the stream has a record
    pub fn contains(&self, stream_id: &StreamId) -> bool {
        self.streams.contains_key(stream_id)
    }

    /// Number of streams tracked
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    /// Whether no stream is tracked
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Iterate over all records
    pub fn records(&self) -> impl Iterator<Item = StreamRecord> + '_ {
        self.streams.iter().map(|(stream_id, &last_applied_index)| StreamRecord {
            stream_id: stream_id.clone(),
            last_applied_index,
        })
    }
}
