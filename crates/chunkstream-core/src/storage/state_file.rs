//! JSON file backed stream state
//!
//! The snapshot is a single JSON object rewritten wholesale on every save.
//! Saves go through a temporary file in the same directory followed by a
//! rename, so readers never observe a partially written snapshot.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::storage::StateStore;
use crate::types::{StoreError, StreamState};
use crate::{log_debug, log_trace, log_warn};

/// Stream state persisted as a JSON snapshot on disk
#[derive(Debug, Clone)]
pub struct JsonFileStateStore {
    path: PathBuf,
}

impl JsonFileStateStore {
    /// Create a store backed by the snapshot at `path`.
    ///
    /// Nothing is touched on disk until the first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the snapshot
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(path: &Path, source: io::Error) -> StoreError {
        StoreError::Io { path: path.to_path_buf(), source }
    }

    fn write_replace(&self, payload: &[u8]) -> Result<(), StoreError> {
        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf);
        if let Some(parent) = &parent {
            fs::create_dir_all(parent).map_err(|e| Self::io_error(parent, e))?;
        }

        let temp_path = self
            .path
            .with_extension(format!("{}.tmp", Uuid::new_v4().simple()));

        let written = File::create(&temp_path).and_then(|mut file| {
            file.write_all(payload)?;
            file.sync_all()
        });
        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path);
            return Err(Self::io_error(&temp_path, e));
        }

        if let Err(e) = fs::rename(&temp_path, &self.path) {
            let _ = fs::remove_file(&temp_path);
            return Err(Self::io_error(&self.path, e));
        }

        // Make the rename itself durable
        #[cfg(unix)]
        if let Some(parent) = &parent {
            File::open(parent)
                .and_then(|dir| dir.sync_all())
                .map_err(|e| Self::io_error(parent, e))?;
        }

        Ok(())
    }
}

impl StateStore for JsonFileStateStore {
    fn load(&self) -> StreamState {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log_debug!("No state file found at {:?}, starting fresh", self.path);
                return StreamState::new();
            }
            Err(e) => {
                log_warn!("Failed to read state file {:?}: {}. Starting fresh", self.path, e);
                return StreamState::new();
            }
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            log_debug!("State file {:?} is empty, starting fresh", self.path);
            return StreamState::new();
        }

        match serde_json::from_slice::<StreamState>(&bytes) {
            Ok(state) => {
                log_trace!("Loaded state for {} streams", state.len());
                state
            }
            Err(e) => {
                log_warn!("State file {:?} is corrupt: {}. Starting fresh", self.path, e);
                StreamState::new()
            }
        }
    }

    fn save(&self, state: &StreamState) -> Result<(), StoreError> {
        let payload = serde_json::to_vec(state)?;
        self.write_replace(&payload)?;
        log_debug!("Saved state for {} streams to {:?}", state.len(), self.path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StreamId;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn sid(s: &str) -> StreamId {
        StreamId::new(s).unwrap()
    }

    #[test]
    fn missing_snapshot_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStateStore::new(dir.path().join("chunk_state.json"));
        assert!(store.load().is_empty());
        assert!(!store.path().exists());
    }

    #[test]
    fn saved_snapshot_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chunk_state.json");

        let mut state = StreamState::new();
        state.set_last_applied(sid("s1"), 4);
        state.set_last_applied(sid("s2"), 0);
        JsonFileStateStore::new(&path).save(&state).unwrap();

        // A fresh instance stands in for a restarted process
        let reopened = JsonFileStateStore::new(&path);
        assert_eq!(reopened.load(), state);
        assert_eq!(fs::read_to_string(&path).unwrap(), r#"{"s1":4,"s2":0}"#);
    }

    #[test]
    fn corrupt_or_empty_snapshot_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chunk_state.json");
        let store = JsonFileStateStore::new(&path);

        fs::write(&path, b"{\"s1\": 3,").unwrap();
        assert!(store.load().is_empty());

        fs::write(&path, b"").unwrap();
        assert!(store.load().is_empty());

        fs::write(&path, b"[1, 2, 3]").unwrap();
        assert!(store.load().is_empty());
    }

    #[test]
    fn save_creates_parent_dirs_and_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state").join("chunk_state.json");
        let store = JsonFileStateStore::new(&path);

        let mut state = StreamState::new();
        for i in 0..5 {
            state.set_last_applied(sid("s1"), i);
            store.save(&state).unwrap();
        }

        let entries: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("chunk_state.json")]);
        assert_eq!(store.load().last_applied(&sid("s1")), Some(4));
    }

    #[test]
    fn concurrent_reader_never_sees_partial_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonFileStateStore::new(dir.path().join("chunk_state.json")));

        let mut state = StreamState::new();
        state.set_last_applied(sid("s1"), 0);
        store.save(&state).unwrap();

        let done = Arc::new(AtomicBool::new(false));
        let reader = {
            let store = store.clone();
            let done = done.clone();
            std::thread::spawn(move || {
                let mut last_seen = 0;
                while !done.load(Ordering::Acquire) {
                    let loaded = store.load();
                    // An empty load would mean a torn read was treated as corruption
                    let seen = loaded.last_applied(&sid("s1")).expect("snapshot must be complete");
                    assert!(seen >= last_seen, "snapshot went backwards");
                    last_seen = seen;
                }
            })
        };

        for i in 1..200 {
            state.set_last_applied(sid("s1"), i);
            store.save(&state).unwrap();
        }
        done.store(true, Ordering::Release);
        reader.join().unwrap();
    }
}
