//! HTTP request handlers for the Chunkstream API
//!
//! Every handler is generic over the storage backends so that the same router
//! serves both the disk and the in-memory configuration.

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Json, Response},
};
use bytes::Bytes;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

use chunkstream_core::{
    core::AppState,
    log_debug, log_error, log_warn,
    system::collect_metrics,
    types::InvalidStreamId,
    ChunkAppender, ChunkIndex, IngestError, StateStore, StreamId,
};

// Response types
/// Standard API response wrapper for read endpoints
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    /// Whether the operation was successful
    pub success: bool,
    /// Response data (if successful)
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Create a successful API response with data
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
        }
    }
}

/// Error body returned for every failed request
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Whether the operation was successful (always false)
    pub success: bool,
    /// Error message
    pub error: String,
    /// Machine-readable details, always carrying a `reason` code
    pub details: Option<Value>,
}

impl ErrorResponse {
    /// Create an error response tagged with a reason code
    pub fn with_reason(error: String, reason: &str) -> Self {
        Self {
            success: false,
            error,
            details: Some(json!({ "reason": reason })),
        }
    }
}

/// Body of a successful chunk upload
#[derive(Debug, Serialize)]
pub struct ChunkResponse {
    /// Always `"success"`
    pub status: &'static str,
}

/// Durable progress of one stream
#[derive(Debug, Serialize)]
pub struct StreamStatus {
    /// Stream identifier
    pub stream_id: StreamId,
    /// Index of the last chunk durably appended
    pub last_applied_index: ChunkIndex,
}

/// System health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Current system status
    pub status: String,
    /// Seconds since the server started
    pub uptime: String,
    /// Server version
    pub version: String,
    /// Time the check was served
    pub timestamp: String,
}

/// System information and capabilities
#[derive(Debug, Serialize)]
pub struct InfoResponse {
    /// Service name
    pub name: String,
    /// Service version
    pub version: String,
    /// List of supported capabilities
    pub capabilities: Vec<String>,
    /// Storage backend in use
    pub storage: String,
}

/// A request failure ready to be rendered as JSON
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    reason: &'static str,
    message: String,
}

impl ApiError {
    /// Malformed upload: missing field, bad index, unreadable body
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            reason: "invalid_request",
            message: message.into(),
        }
    }

    /// Resource does not exist
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            reason: "not_found",
            message: message.into(),
        }
    }

    /// HTTP status of the response
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Reason code reported under `details.reason`
    pub fn reason(&self) -> &'static str {
        self.reason
    }
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        let status = if err.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self {
            status,
            reason: err.reason(),
            message: err.to_string(),
        }
    }
}

impl From<InvalidStreamId> for ApiError {
    fn from(err: InvalidStreamId) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            reason: "invalid_stream_id",
            message: err.to_string(),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        // Oversized bodies keep their 413 from the body limit
        let status = match err.status() {
            StatusCode::PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        };
        Self {
            status,
            reason: "invalid_request",
            message: err.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            log_error!("Request failed ({}): {}", self.reason, self.message);
        } else {
            log_warn!("Request rejected ({}): {}", self.reason, self.message);
        }
        (self.status, Json(ErrorResponse::with_reason(self.message, self.reason))).into_response()
    }
}

/// Fields of one `POST /chunk` form
#[derive(Debug)]
struct ChunkUpload {
    stream_id: StreamId,
    chunk_index: ChunkIndex,
    audio: Bytes,
}

async fn read_chunk_upload(mut multipart: Multipart) -> Result<ChunkUpload, ApiError> {
    let mut stream_id = None;
    let mut chunk_index = None;
    let mut audio = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("audio") => audio = Some(field.bytes().await?),
            Some("chunk_index") => {
                let text = field.text().await?;
                let index = text.trim().parse::<ChunkIndex>().map_err(|_| {
                    ApiError::invalid_request(format!(
                        "chunk_index must be a non-negative integer, got {text:?}"
                    ))
                })?;
                chunk_index = Some(index);
            }
            Some("stream_id") => stream_id = Some(field.text().await?),
            other => log_debug!("Ignoring unexpected form field {:?}", other),
        }
    }

    let stream_id = stream_id.ok_or_else(|| ApiError::invalid_request("missing field: stream_id"))?;
    let chunk_index =
        chunk_index.ok_or_else(|| ApiError::invalid_request("missing field: chunk_index"))?;
    let audio = audio.ok_or_else(|| ApiError::invalid_request("missing field: audio"))?;

    Ok(ChunkUpload {
        stream_id: StreamId::new(stream_id)?,
        chunk_index,
        audio,
    })
}

/// Receive one chunk and append it in order
pub async fn receive_chunk<S: StateStore, A: ChunkAppender>(
    State(app_state): State<Arc<AppState<S, A>>>,
    multipart: Multipart,
) -> Result<Json<ChunkResponse>, ApiError> {
    let upload = read_chunk_upload(multipart).await?;

    let admission = app_state
        .coordinator
        .ingest(&upload.stream_id, upload.chunk_index, upload.audio)
        .await?;
    log_debug!(
        "Chunk {} for stream {} admitted: {:?}",
        upload.chunk_index,
        upload.stream_id,
        admission
    );

    Ok(Json(ChunkResponse { status: "success" }))
}

/// Report the durable progress of a stream
pub async fn stream_status<S: StateStore, A: ChunkAppender>(
    State(app_state): State<Arc<AppState<S, A>>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<StreamStatus>>, ApiError> {
    let stream_id = StreamId::new(id)?;

    match app_state.coordinator.status(&stream_id).await? {
        Some(last_applied_index) => Ok(Json(ApiResponse::success(StreamStatus {
            stream_id,
            last_applied_index,
        }))),
        None => Err(ApiError::not_found(format!("stream {stream_id} not found"))),
    }
}

/// Health check endpoint
pub async fn health_check<S: StateStore, A: ChunkAppender>(
    State(app_state): State<Arc<AppState<S, A>>>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        uptime: format!("{}s", app_state.started_at.elapsed().as_secs()),
        version: chunkstream_core::VERSION.to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// System information endpoint
pub async fn system_info<S: StateStore, A: ChunkAppender>(
    State(app_state): State<Arc<AppState<S, A>>>,
) -> Json<InfoResponse> {
    Json(InfoResponse {
        name: "Chunkstream".to_string(),
        version: chunkstream_core::VERSION.to_string(),
        capabilities: vec![
            "ordered_chunk_ingestion".to_string(),
            "duplicate_suppression".to_string(),
            "crash_consistent_state".to_string(),
        ],
        storage: format!("{:?}", app_state.config.storage.storage_type).to_lowercase(),
    })
}

/// Prometheus text exposition
pub async fn metrics_handler() -> impl IntoResponse {
    (
        [(CONTENT_TYPE, "text/plain; version=0.0.4")],
        collect_metrics(),
    )
}

/// Root endpoint with API overview
pub async fn root_handler() -> Json<Value> {
    Json(json!({
        "name": "Chunkstream",
        "version": chunkstream_core::VERSION,
        "description": "Ordered chunk ingestion over HTTP",
        "endpoints": {
            "chunk": "POST /chunk (multipart: audio, chunk_index, stream_id)",
            "stream_status": "GET /api/streams/{id}",
            "health": "GET /health",
            "info": "GET /info",
            "metrics": "GET /metrics"
        }
    }))
}
