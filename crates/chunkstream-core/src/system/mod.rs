//! System utilities and metrics

/// Metrics collection
pub mod metrics;

pub use metrics::{collect_metrics, init_registry, Metrics};
