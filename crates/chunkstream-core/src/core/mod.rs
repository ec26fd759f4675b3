//! Core application logic and configuration

/// Cross-crate logging macros
pub mod logging;

/// Application configuration
pub mod config;

/// Application state management
pub mod app_state;

/// Factory pattern for app creation
pub mod factory;

// Re-export commonly used items
pub use config::{Config, load_config_or_default};
pub use app_state::AppState;
pub use factory::{ConfiguredAppState, create_app_state};
