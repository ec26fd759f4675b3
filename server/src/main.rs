//! Chunkstream Server
//!
//! Receives recorder chunks over HTTP and appends them, in order, to one
//! output file per stream.

use clap::{Arg, ArgMatches, Command};
use tokio::signal;

use chunkstream_core::core::config::{self, Config, ConfigError, StorageType};
use chunkstream_core::core::factory::create_app_state;
use chunkstream_core::system::init_registry;
use chunkstream_core::{log_error, log_info, log_warn};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: jemallocator::Jemalloc = jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let matches = Command::new("chunkstream-server")
        .version(chunkstream_core::VERSION)
        .about("Ordered chunk ingestion server")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
        )
        .arg(
            Arg::new("http-addr")
                .long("http-addr")
                .value_name("ADDR")
                .help("HTTP server bind address")
        )
        .arg(
            Arg::new("data-dir")
                .long("data-dir")
                .value_name("DIR")
                .help("Directory holding the state snapshot and stream outputs")
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level (trace, debug, info, warn, error)")
        )
        .arg(
            Arg::new("storage-type")
                .long("storage-type")
                .value_name("TYPE")
                .help("Storage backend type (disk, memory)")
        )
        .get_matches();

    // Initialize logging first so that config loading warnings are visible
    let log_filter = chunkstream_server::logging::init_logging()?;

    // Load configuration: file, then environment, then CLI
    let config_path = matches.get_one::<String>("config").map(|s| s.as_str());
    let mut config = config::load_config_or_default(config_path);
    config.apply_env_overrides()?;
    apply_cli_overrides(&mut config, &matches)?;
    config.validate()?;

    // RUST_LOG wins over the configured level
    log_filter.apply_level(&config.logging.level)?;

    log_info!("Starting Chunkstream v{}", chunkstream_core::VERSION);

    init_registry();

    // Create AppState using factory pattern
    let configured_app_state = create_app_state(config)?;
    log_info!("AppState created successfully");

    // Start the HTTP server
    let api_handle = tokio::spawn(async move {
        if let Err(e) = chunkstream_server::api::start_api_server(configured_app_state).await {
            log_error!("HTTP server failed: {}", e);
        }
    });

    // Wait for shutdown signal
    tokio::select! {
        _ = shutdown_signal() => {
            log_warn!("Received shutdown signal");
        }
        _ = api_handle => {
            log_warn!("HTTP server terminated unexpectedly");
        }
    }

    log_info!("Shutdown complete");
    Ok(())
}

/// Apply command line argument overrides to configuration
fn apply_cli_overrides(config: &mut Config, matches: &ArgMatches) -> Result<(), ConfigError> {
    if let Some(addr) = matches.get_one::<String>("http-addr") {
        config.server.http_addr = addr
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("Invalid HTTP address: {}", e)))?;
    }

    if let Some(data_dir) = matches.get_one::<String>("data-dir") {
        config.storage.data_dir = data_dir.into();
    }

    if let Some(level) = matches.get_one::<String>("log-level") {
        config.logging.level = level.clone();
    }

    if let Some(storage_type) = matches.get_one::<String>("storage-type") {
        config.storage.storage_type = match storage_type.as_str() {
            "disk" => StorageType::Disk,
            "memory" => StorageType::Memory,
            _ => {
                return Err(ConfigError::Invalid(format!(
                    "Invalid storage type: {}. Valid options: disk, memory",
                    storage_type
                )))
            }
        };
    }

    Ok(())
}

/// Resolves on Ctrl+C or, on unix, SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log_error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                log_error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => log_info!("Received Ctrl+C signal"),
        _ = terminate => log_info!("Received terminate signal"),
    }
}
