//! Per-stream serialization
//!
//! A slot pairs the mutex that serializes read-decide-append-commit for one
//! stream with a signal fired after each commit, so that requests waiting on
//! a predecessor re-check state as soon as it may have changed.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard, Notify};

use crate::types::StreamId;

/// Lock and commit signal for one stream
#[derive(Debug, Default)]
pub struct StreamSlot {
    lock: Mutex<()>,
    committed: Notify,
}

impl StreamSlot {
    /// Acquire exclusive access to the stream
    pub async fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().await
    }

    /// Future resolving at the next commit for this stream.
    ///
    /// Registration happens when the future is created, so it must be created
    /// before the state check it is meant to follow.
    pub fn committed(&self) -> tokio::sync::futures::Notified<'_> {
        self.committed.notified()
    }

    /// Wake every request waiting on this stream
    pub fn notify_committed(&self) {
        self.committed.notify_waiters();
    }
}

/// Slots for every stream seen by this process.
///
/// Slots are never removed; abandoned streams keep their (empty) slot.
#[derive(Debug, Default)]
pub struct StreamSlots {
    slots: DashMap<StreamId, Arc<StreamSlot>>,
}

impl StreamSlots {
    /// Create an empty slot table
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot for a stream, created on first use
    pub fn slot(&self, stream_id: &StreamId) -> Arc<StreamSlot> {
        if let Some(slot) = self.slots.get(stream_id) {
            return slot.clone();
        }
        self.slots.entry(stream_id.clone()).or_default().clone()
    }

    /// Number of streams with a slot
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no slot was created yet
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn same_stream_shares_slot() {
        let slots = StreamSlots::new();
        let a = StreamId::new("a").unwrap();
        let b = StreamId::new("b").unwrap();
        assert!(Arc::ptr_eq(&slots.slot(&a), &slots.slot(&a)));
        assert!(!Arc::ptr_eq(&slots.slot(&a), &slots.slot(&b)));
        assert_eq!(slots.len(), 2);
    }

    #[tokio::test]
    async fn waiter_registered_before_commit_is_woken() {
        let slot = Arc::new(StreamSlot::default());
        let waiter = slot.committed();
        slot.notify_committed();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("registered waiter should be woken");
    }
}
