//! HTTP server implementation for the Chunkstream API

use axum::{
    extract::DefaultBodyLimit,
    http::{header::CONTENT_TYPE, Method},
    routing::{get, post},
    Router,
};
use std::{net::SocketAddr, sync::Arc};
use thiserror::Error;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use super::api_handlers;
use chunkstream_core::{
    core::{factory::ConfiguredAppState, AppState},
    log_info, ChunkAppender, StateStore,
};

/// HTTP server errors
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listener could not be bound
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Requested address
        addr: SocketAddr,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
    /// The server stopped with an I/O error
    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Creates the main application router with all routes and middleware
pub fn create_router<S: StateStore, A: ChunkAppender>(app_state: Arc<AppState<S, A>>) -> Router {
    // Browsers upload straight from the recorder page
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .allow_origin(Any)
        .allow_credentials(false);

    let max_chunk_bytes = app_state.config.server.max_chunk_bytes;
    let static_dir = app_state.config.server.static_dir.clone();

    let router = Router::new()
        // Root route
        .route("/", get(api_handlers::root_handler))

        // Chunk ingestion
        .route("/chunk", post(api_handlers::receive_chunk::<S, A>))
        .route("/api/streams/{id}", get(api_handlers::stream_status::<S, A>))

        // System routes
        .route("/health", get(api_handlers::health_check::<S, A>))
        .route("/info", get(api_handlers::system_info::<S, A>))
        .route("/metrics", get(api_handlers::metrics_handler));

    let router = match static_dir {
        Some(dir) => {
            log_info!("Serving static files from {:?} under /static", dir);
            router.nest_service("/static", ServeDir::new(dir))
        }
        None => router,
    };

    router
        .layer(DefaultBodyLimit::max(max_chunk_bytes))
        // Apply middleware to ALL routes
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(app_state)
}

/// Internal function to start the server with the configured router
async fn serve_api_server_with_app(addr: SocketAddr, app: Router) -> Result<(), ServerError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;

    log_info!("Server listening on http://{}", addr);
    log_info!("Chunk uploads accepted at http://{}/chunk", addr);
    log_info!("Health check available at http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Start the HTTP server with the configured AppState
pub async fn start_api_server(configured_app_state: ConfiguredAppState) -> Result<(), ServerError> {
    let http_addr = configured_app_state.http_addr();

    log_info!("Starting Chunkstream API server on {}", http_addr);

    // Match once on storage type to get concrete AppState, then start server
    match configured_app_state {
        ConfiguredAppState::Disk { app_state } => {
            log_info!("Starting server with disk storage backend");
            let app = create_router(Arc::new(app_state));
            serve_api_server_with_app(http_addr, app).await
        }
        ConfiguredAppState::Memory { app_state } => {
            log_info!("Starting server with in-memory storage backend");
            let app = create_router(Arc::new(app_state));
            serve_api_server_with_app(http_addr, app).await
        }
    }
}
