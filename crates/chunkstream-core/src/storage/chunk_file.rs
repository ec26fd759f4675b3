//! Per-stream output files
//!
//! Each stream is written to `<dir>/<stream_id>.<extension>`. Chunk 0
//! truncates the file, every later chunk is appended. Writes are flushed to
//! disk before they are reported as done.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::constants::DEFAULT_FILE_EXTENSION;
use crate::storage::ChunkAppender;
use crate::types::StreamId;
use crate::log_debug;

/// Writes chunk payloads to one file per stream
#[derive(Debug, Clone)]
pub struct FileChunkAppender {
    dir: PathBuf,
    extension: String,
}

/// Open output file for one stream
#[derive(Debug)]
pub struct FileHandle {
    file: File,
    path: PathBuf,
    origin_len: u64,
}

impl FileHandle {
    /// Path of the output file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FileChunkAppender {
    /// Create an appender writing into `dir` with the default extension
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_extension(dir, DEFAULT_FILE_EXTENSION)
    }

    /// Create an appender writing into `dir` with a custom extension
    pub fn with_extension(dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            extension: extension.into(),
        }
    }

    /// Directory holding the output files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Output file for a stream
    pub fn output_path(&self, stream_id: &StreamId) -> PathBuf {
        if self.extension.is_empty() {
            self.dir.join(stream_id.as_str())
        } else {
            self.dir.join(format!("{}.{}", stream_id, self.extension))
        }
    }
}

impl ChunkAppender for FileChunkAppender {
    type Handle = FileHandle;

    fn create_or_truncate(&self, stream_id: &StreamId) -> io::Result<FileHandle> {
        fs::create_dir_all(&self.dir)?;
        let path = self.output_path(stream_id);
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        log_debug!("Created output {:?} (truncated)", path);
        Ok(FileHandle { file, path, origin_len: 0 })
    }

    fn open_append(&self, stream_id: &StreamId) -> io::Result<FileHandle> {
        fs::create_dir_all(&self.dir)?;
        let path = self.output_path(stream_id);
        let file = OpenOptions::new().append(true).create(true).open(&path)?;
        let origin_len = file.metadata()?.len();
        Ok(FileHandle { file, path, origin_len })
    }

    fn append(&self, handle: &mut FileHandle, bytes: &[u8]) -> io::Result<()> {
        handle.file.write_all(bytes)?;
        handle.file.sync_data()?;
        log_debug!("Wrote {} bytes to {:?}", bytes.len(), handle.path);
        Ok(())
    }

    fn rewind(&self, handle: &mut FileHandle) -> io::Result<()> {
        handle.file.set_len(handle.origin_len)?;
        handle.file.sync_all()
    }
}
