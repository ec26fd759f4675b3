//! Chunk admission state machine
//!
//! Each request is classified against the durable state snapshot:
//!
//! | Condition                                   | Decision          |
//! |---------------------------------------------|-------------------|
//! | `chunk_index == 0`                          | `ApplyFirst`      |
//! | no record for the stream                    | `UnknownStream`   |
//! | `last_applied == chunk_index - 1`           | `ApplyNext`       |
//! | `last_applied >= chunk_index`               | `AlreadyApplied`  |
//! | otherwise                                   | `Wait`            |
//!
//! `Wait` releases the stream, sleeps until the next commit for that stream
//! or the poll interval (whichever comes first), then reloads state and
//! classifies again. Once the wait budget is spent the request fails with
//! [`IngestError::PredecessorTimeout`].
//!
//! Classification, append and commit for one stream run under that stream's
//! lock, and snapshot commits are serialized process-wide because all streams
//! share one snapshot.

use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::constants::{DEFAULT_MAX_ATTEMPTS, DEFAULT_POLL_INTERVAL_MS};
use crate::core::config::IngestConfig;
use crate::ingest::slots::{StreamSlot, StreamSlots};
use crate::storage::{ChunkAppender, StateStore};
use crate::system::metrics::{Metrics, Timer};
use crate::types::{ChunkIndex, IngestError, StreamId, StreamState};
use crate::{log_debug, log_error, log_info, log_warn};

/// Wait policy for chunks that arrive ahead of their predecessor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestPolicy {
    /// Number of polls before giving up
    pub max_attempts: u32,
    /// Delay between polls
    pub poll_interval: Duration,
}

impl IngestPolicy {
    /// Total time a chunk may wait for its predecessor
    pub fn wait_budget(&self) -> Duration {
        self.poll_interval.saturating_mul(self.max_attempts)
    }
}

impl Default for IngestPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

impl From<&IngestConfig> for IngestPolicy {
    fn from(config: &IngestConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        }
    }
}

/// Successful outcome of a chunk request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Chunk 0 started (or restarted) the stream
    AppliedFirst,
    /// Chunk was appended; carries the new last applied index
    AppliedNext(ChunkIndex),
    /// Chunk had already been applied; nothing was written
    AlreadyApplied {
        /// Last applied index at the time of the request
        last_applied: ChunkIndex,
    },
}

impl Admission {
    /// Last applied index after the request
    pub fn last_applied_index(&self) -> ChunkIndex {
        match *self {
            Admission::AppliedFirst => 0,
            Admission::AppliedNext(index) => index,
            Admission::AlreadyApplied { last_applied } => last_applied,
        }
    }

    /// Whether the request wrote the payload
    pub fn was_written(&self) -> bool {
        !matches!(self, Admission::AlreadyApplied { .. })
    }
}

/// Classification of a chunk against one state snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Start the stream with this chunk
    ApplyFirst,
    /// Append this chunk as the next one
    ApplyNext,
    /// Chunk is at or below the last applied index
    AlreadyApplied(ChunkIndex),
    /// Predecessor not applied yet; carries the last applied index
    Wait(ChunkIndex),
    /// Stream has no record
    UnknownStream,
}

impl Decision {
    /// Classify `chunk_index` for `stream_id` against `state`
    pub fn classify(state: &StreamState, stream_id: &StreamId, chunk_index: ChunkIndex) -> Self {
        if chunk_index == 0 {
            return Decision::ApplyFirst;
        }
        match state.last_applied(stream_id) {
            None => Decision::UnknownStream,
            Some(last) if last == chunk_index - 1 => Decision::ApplyNext,
            Some(last) if last >= chunk_index => Decision::AlreadyApplied(last),
            Some(last) => Decision::Wait(last),
        }
    }
}

/// Admits chunks exactly once and in order.
///
/// Holds no copy of the stream state between requests; every decision
/// reloads the snapshot from the [`StateStore`].
pub struct ChunkIngestionCoordinator<S: StateStore, A: ChunkAppender> {
    store: Arc<S>,
    appender: Arc<A>,
    policy: IngestPolicy,
    slots: StreamSlots,
    commit_lock: Arc<Mutex<()>>,
}

/// Run blocking storage work on the blocking pool
async fn blocking<T, F>(work: F) -> Result<T, IngestError>
where
    F: FnOnce() -> Result<T, IngestError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| IngestError::Task(e.to_string()))?
}

impl<S: StateStore, A: ChunkAppender> ChunkIngestionCoordinator<S, A> {
    /// Create a coordinator over a state store and an appender
    pub fn new(store: Arc<S>, appender: Arc<A>, policy: IngestPolicy) -> Self {
        Self {
            store,
            appender,
            policy,
            slots: StreamSlots::new(),
            commit_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Wait policy in use
    pub fn policy(&self) -> IngestPolicy {
        self.policy
    }

    /// Underlying state store
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Underlying appender
    pub fn appender(&self) -> &Arc<A> {
        &self.appender
    }

    /// Durable last applied index of a stream
    pub async fn status(&self, stream_id: &StreamId) -> Result<Option<ChunkIndex>, IngestError> {
        Ok(self.load().await?.last_applied(stream_id))
    }

    /// Admit one chunk.
    ///
    /// Returns once the chunk is durably appended, found already applied, or
    /// refused. Only the calling task waits; the stream is not held while
    /// waiting for a predecessor.
    pub async fn ingest(
        &self,
        stream_id: &StreamId,
        chunk_index: ChunkIndex,
        payload: Bytes,
    ) -> Result<Admission, IngestError> {
        log_info!("Received chunk {} for stream {} ({} bytes)", chunk_index, stream_id, payload.len());

        let result = self.admit(stream_id, chunk_index, payload).await;

        let metrics = &Metrics::global().ingest;
        match &result {
            Ok(Admission::AppliedFirst) => metrics.applied_first.inc(),
            Ok(Admission::AppliedNext(_)) => metrics.applied_next.inc(),
            Ok(Admission::AlreadyApplied { .. }) => metrics.duplicates.inc(),
            Err(IngestError::UnknownStream { .. }) => metrics.unknown_stream.inc(),
            Err(IngestError::PredecessorTimeout { .. }) => metrics.timeouts.inc(),
            Err(e) => {
                log_error!("Chunk {} for stream {} failed: {}", chunk_index, stream_id, e);
                metrics.storage_failures.inc();
            }
        }
        result
    }

    async fn admit(
        &self,
        stream_id: &StreamId,
        chunk_index: ChunkIndex,
        payload: Bytes,
    ) -> Result<Admission, IngestError> {
        let slot = self.slots.slot(stream_id);
        let deadline = Instant::now() + self.policy.wait_budget();
        let mut wait_timer: Option<Timer> = None;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            // Registered before the check so a commit in between still wakes us
            let committed = slot.committed();

            let last_applied = {
                let _guard = slot.lock().await;
                let state = self.load().await?;

                match Decision::classify(&state, stream_id, chunk_index) {
                    Decision::ApplyFirst => {
                        if let Some(previous) = state.last_applied(stream_id) {
                            log_warn!(
                                "Chunk 0 resent for stream {} (last applied {}), restarting stream",
                                stream_id,
                                previous
                            );
                            // The record goes before the output is truncated, so a
                            // failure past this point leaves the stream unknown
                            // rather than claiming chunks the output no longer holds
                            self.forget(stream_id).await?;
                            Metrics::global().ingest.resets.inc();
                        } else {
                            log_info!("First chunk for stream {}, creating new output", stream_id);
                        }
                        self.apply(&slot, stream_id, 0, payload).await?;
                        return Ok(Admission::AppliedFirst);
                    }
                    Decision::ApplyNext => {
                        log_debug!("Previous chunk confirmed, writing chunk {}", chunk_index);
                        self.apply(&slot, stream_id, chunk_index, payload).await?;
                        if let Some(timer) = wait_timer.take() {
                            timer.finish();
                        }
                        return Ok(Admission::AppliedNext(chunk_index));
                    }
                    Decision::AlreadyApplied(last_applied) => {
                        log_info!(
                            "Chunk {} of stream {} already applied (last applied {})",
                            chunk_index,
                            stream_id,
                            last_applied
                        );
                        return Ok(Admission::AlreadyApplied { last_applied });
                    }
                    Decision::UnknownStream => {
                        log_warn!("No state found for stream {}", stream_id);
                        return Err(IngestError::UnknownStream { stream_id: stream_id.clone() });
                    }
                    Decision::Wait(last_applied) => last_applied,
                }
            };

            let now = Instant::now();
            if now >= deadline {
                if let Some(timer) = wait_timer.take() {
                    timer.finish();
                }
                log_warn!(
                    "Timeout waiting for chunk {} of stream {} after {} attempts",
                    chunk_index - 1,
                    stream_id,
                    attempt
                );
                return Err(IngestError::PredecessorTimeout {
                    stream_id: stream_id.clone(),
                    chunk_index,
                    awaiting: chunk_index - 1,
                    last_applied,
                });
            }

            log_debug!(
                "Attempt {}: waiting for chunk {} of stream {} (last applied {})",
                attempt,
                chunk_index - 1,
                stream_id,
                last_applied
            );
            if wait_timer.is_none() {
                wait_timer = Some(Timer::start(&Metrics::global().ingest.wait_duration));
            }
            let pause = self.policy.poll_interval.min(deadline - now);
            let _ = tokio::time::timeout(pause, committed).await;
        }
    }

    /// Write the payload, then record `chunk_index` as the stream's last
    /// applied index. Caller holds the stream lock.
    async fn apply(
        &self,
        slot: &StreamSlot,
        stream_id: &StreamId,
        chunk_index: ChunkIndex,
        payload: Bytes,
    ) -> Result<(), IngestError> {
        let appender = self.appender.clone();
        let id = stream_id.clone();
        let len = payload.len() as u64;
        let handle = blocking(move || {
            let opened = if chunk_index == 0 {
                appender.create_or_truncate(&id)
            } else {
                appender.open_append(&id)
            };
            let append_error = |source: std::io::Error| IngestError::Append {
                stream_id: id.clone(),
                chunk_index,
                source,
            };
            let mut handle = opened.map_err(append_error)?;
            if let Err(source) = appender.append(&mut handle, &payload) {
                // A partial write must not survive into the retry
                if let Err(e) = appender.rewind(&mut handle) {
                    log_error!("Could not undo partial append for stream {}: {}", id, e);
                }
                return Err(append_error(source));
            }
            Ok(handle)
        })
        .await?;

        if let Err(e) = self.commit(stream_id, chunk_index).await {
            let appender = self.appender.clone();
            let rewound = blocking(move || {
                let mut handle = handle;
                appender
                    .rewind(&mut handle)
                    .map_err(|e| IngestError::Task(format!("rewind failed: {e}")))
            })
            .await;
            if let Err(rewind_err) = rewound {
                log_error!("Could not undo append for stream {}: {}", stream_id, rewind_err);
            }
            return Err(e);
        }

        Metrics::global().ingest.bytes_appended.inc_by(len);
        slot.notify_committed();
        log_info!("Applied chunk {} for stream {}", chunk_index, stream_id);
        Ok(())
    }

    /// Record `chunk_index` as the stream's last applied index
    async fn commit(&self, stream_id: &StreamId, chunk_index: ChunkIndex) -> Result<(), IngestError> {
        self.update_state(stream_id, move |state, id| {
            state.set_last_applied(id, chunk_index);
        })
        .await
    }

    /// Drop the stream's record from the snapshot
    async fn forget(&self, stream_id: &StreamId) -> Result<(), IngestError> {
        self.update_state(stream_id, |state, id| {
            state.remove(&id);
        })
        .await
    }

    /// Load-change-save of the shared snapshot
    async fn update_state<F>(&self, stream_id: &StreamId, change: F) -> Result<(), IngestError>
    where
        F: FnOnce(&mut StreamState, StreamId) + Send + 'static,
    {
        let store = self.store.clone();
        let lock = self.commit_lock.clone();
        let id = stream_id.clone();
        blocking(move || {
            let _guard = lock.lock();
            let mut state = store.load();
            change(&mut state, id);
            store.save(&state).map_err(IngestError::from)
        })
        .await
    }

    async fn load(&self) -> Result<StreamState, IngestError> {
        let store = self.store.clone();
        blocking(move || Ok(store.load())).await
    }
}
