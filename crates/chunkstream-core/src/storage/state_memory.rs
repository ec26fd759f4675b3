//! In-memory stream state
//!
//! Same contract as the file backend without durability. Used by the
//! `memory` storage mode and by tests.

use parking_lot::RwLock;

use crate::storage::StateStore;
use crate::types::{StoreError, StreamState};

/// Stream state held in process memory
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    snapshot: RwLock<StreamState>,
}

impl MemoryStateStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with an existing snapshot
    pub fn with_state(state: StreamState) -> Self {
        Self { snapshot: RwLock::new(state) }
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> StreamState {
        self.snapshot.read().clone()
    }

    fn save(&self, state: &StreamState) -> Result<(), StoreError> {
        *self.snapshot.write() = state.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StreamId;

    #[test]
    fn save_replaces_whole_snapshot() {
        let s1 = StreamId::new("s1").unwrap();
        let s2 = StreamId::new("s2").unwrap();

        let mut seed = StreamState::new();
        seed.set_last_applied(s1.clone(), 3);
        let store = MemoryStateStore::with_state(seed);
        assert_eq!(store.load().last_applied(&s1), Some(3));

        let mut next = StreamState::new();
        next.set_last_applied(s2.clone(), 0);
        store.save(&next).unwrap();

        let loaded = store.load();
        assert_eq!(loaded.last_applied(&s1), None);
        assert_eq!(loaded.last_applied(&s2), Some(0));
    }
}
