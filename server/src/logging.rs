//! Process-wide log subscriber
//!
//! The subscriber is installed before the configuration is read so that
//! config loading warnings reach the output. It starts at `RUST_LOG`, or
//! `info` when that is unset; once the configuration is known its
//! `logging.level` replaces the startup filter unless `RUST_LOG` pinned it.

use thiserror::Error;
use tracing_subscriber::{fmt, prelude::*, reload, EnvFilter, Registry};

/// Filter used until the configured level is known
const STARTUP_LEVEL: &str = "info";

/// Logging setup errors
#[derive(Debug, Error)]
pub enum LoggingError {
    /// A global subscriber was already installed
    #[error("failed to install log subscriber: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
    /// The installed subscriber is gone
    #[error("failed to apply log level: {0}")]
    Reload(#[from] reload::Error),
}

/// Handle for replacing the startup filter
pub struct LogFilterHandle {
    handle: reload::Handle<EnvFilter, Registry>,
    pinned: bool,
}

impl LogFilterHandle {
    /// Switch to the configured level. Returns `false` when `RUST_LOG` was
    /// set at startup and the filter is left alone.
    pub fn apply_level(&self, level: &str) -> Result<bool, LoggingError> {
        if self.pinned {
            return Ok(false);
        }
        self.handle.reload(EnvFilter::new(level))?;
        Ok(true)
    }
}

/// Reloadable filter layer; `env_filter` is the `RUST_LOG` filter, if any
pub fn filter_layer(
    env_filter: Option<EnvFilter>,
) -> (reload::Layer<EnvFilter, Registry>, LogFilterHandle) {
    let pinned = env_filter.is_some();
    let (layer, handle) =
        reload::Layer::new(env_filter.unwrap_or_else(|| EnvFilter::new(STARTUP_LEVEL)));
    (layer, LogFilterHandle { handle, pinned })
}

/// Install the global subscriber
pub fn init_logging() -> Result<LogFilterHandle, LoggingError> {
    let (filter, handle) = filter_layer(EnvFilter::try_from_default_env().ok());
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .try_init()?;
    Ok(handle)
}
