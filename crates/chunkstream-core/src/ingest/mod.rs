//! Chunk admission and ordering
//!
//! The coordinator decides, per request, whether a chunk is appended now,
//! waits for its predecessor, is acknowledged as a duplicate, or is refused.
//! Every decision is made against freshly loaded durable state.

/// Per-stream locks and commit signals
pub mod slots;

/// Admission state machine
pub mod coordinator;

pub use coordinator::{Admission, ChunkIngestionCoordinator, Decision, IngestPolicy};
