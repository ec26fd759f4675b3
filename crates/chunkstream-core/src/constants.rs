// Constants for Chunkstream

/// Default snapshot file holding the last applied chunk index per stream
pub const DEFAULT_STATE_FILE: &str = "chunk_state.json";

/// Default directory (relative to the data dir) for per-stream output files
pub const DEFAULT_AUDIO_DIR: &str = "audio_files";

/// Default extension for per-stream output files
pub const DEFAULT_FILE_EXTENSION: &str = "webm";

/// Number of polls allowed while waiting for a predecessor chunk
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Delay between polls while waiting for a predecessor chunk (milliseconds)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;

/// Maximum accepted request body for a single chunk upload (16MB)
pub const DEFAULT_MAX_CHUNK_BYTES: usize = 16 * 1024 * 1024;

/// Maximum length of a stream identifier
pub const MAX_STREAM_ID_LENGTH: usize = 128;
