//! Metrics collection for chunk ingestion
//!
//! Counters live in a crate-owned Prometheus registry so that the server can
//! expose them without touching the process-global default registry.

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, IntCounter, Registry};
use std::time::Instant;

/// Metrics registry owned by Chunkstream
static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

/// Ingestion outcome counters
pub struct IngestMetrics {
    /// Chunks accepted as the first chunk of a stream
    pub applied_first: IntCounter,
    /// Chunks appended as the next chunk of a stream
    pub applied_next: IntCounter,
    /// Chunks acknowledged without I/O because they were already applied
    pub duplicates: IntCounter,
    /// Chunk 0 received for a stream that already had progress
    pub resets: IntCounter,
    /// Chunks refused because their stream was never initialized
    pub unknown_stream: IntCounter,
    /// Chunks refused after the predecessor wait budget ran out
    pub timeouts: IntCounter,
    /// Requests that failed on append or state persistence
    pub storage_failures: IntCounter,
    /// Payload bytes appended to stream outputs
    pub bytes_appended: IntCounter,
    /// Time spent waiting for predecessor chunks, in seconds
    pub wait_duration: Histogram,
}

/// Centralized metrics collection
pub struct Metrics {
    /// Chunk ingestion metrics
    pub ingest: IngestMetrics,
}

fn counter(name: &str, help: &str) -> prometheus::Result<IntCounter> {
    let counter = IntCounter::new(name, help)?;
    REGISTRY.register(Box::new(counter.clone()))?;
    Ok(counter)
}

impl IngestMetrics {
    fn new() -> prometheus::Result<Self> {
        let wait_duration = Histogram::with_opts(
            HistogramOpts::new(
                "chunkstream_predecessor_wait_seconds",
                "Time chunks spent waiting for their predecessor",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
        )?;
        REGISTRY.register(Box::new(wait_duration.clone()))?;

        Ok(Self {
            applied_first: counter(
                "chunkstream_chunks_applied_first_total",
                "Total number of first chunks applied",
            )?,
            applied_next: counter(
                "chunkstream_chunks_applied_next_total",
                "Total number of subsequent chunks appended",
            )?,
            duplicates: counter(
                "chunkstream_chunks_duplicate_total",
                "Total number of already-applied chunks acknowledged",
            )?,
            resets: counter(
                "chunkstream_stream_resets_total",
                "Total number of streams restarted by a repeated chunk 0",
            )?,
            unknown_stream: counter(
                "chunkstream_chunks_unknown_stream_total",
                "Total number of chunks refused for uninitialized streams",
            )?,
            timeouts: counter(
                "chunkstream_chunks_timeout_total",
                "Total number of chunks refused after waiting for their predecessor",
            )?,
            storage_failures: counter(
                "chunkstream_storage_failures_total",
                "Total number of chunk requests failed by storage errors",
            )?,
            bytes_appended: counter(
                "chunkstream_bytes_appended_total",
                "Total payload bytes appended to stream outputs",
            )?,
            wait_duration,
        })
    }
}

impl Metrics {
    /// Create and register all metrics
    fn new() -> prometheus::Result<Self> {
        Ok(Self { ingest: IngestMetrics::new()? })
    }

    /// Get the global metrics instance
    pub fn global() -> &'static Metrics {
        static INSTANCE: Lazy<Metrics> = Lazy::new(|| {
            Metrics::new().expect("Failed to initialize metrics")
        });
        &INSTANCE
    }
}

/// Timer recording its elapsed time into a histogram when finished
pub struct Timer {
    start: Instant,
    histogram: Histogram,
}

impl Timer {
    /// Start a new timer
    pub fn start(histogram: &Histogram) -> Self {
        Self { start: Instant::now(), histogram: histogram.clone() }
    }

    /// Record the elapsed time and consume the timer
    pub fn finish(self) {
        self.histogram.observe(self.start.elapsed().as_secs_f64());
    }
}

/// Register all metrics up front so that they show up before first use
pub fn init_registry() {
    let _ = Metrics::global();
}

/// Prometheus text exposition of all registered metrics
pub fn collect_metrics() -> String {
    let encoder = prometheus::TextEncoder::new();
    encoder.encode_to_string(&REGISTRY.gather()).unwrap_or_default()
}
