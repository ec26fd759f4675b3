//! End-to-end tests of the HTTP API against in-memory and on-disk backends

use axum::{
    body::{to_bytes, Body},
    http::{header::CONTENT_TYPE, Request, StatusCode},
    Router,
};
use serde_json::Value;
use std::{sync::Arc, time::Duration};
use tower::ServiceExt;

use chunkstream_core::{
    core::{
        config::{Config, StorageType},
        factory::{create_app_state, ConfiguredAppState},
        AppState,
    },
    storage::{MemoryChunkAppender, MemoryStateStore},
    ChunkIngestionCoordinator, IngestPolicy, StreamId,
};
use chunkstream_server::api::create_router;

const BOUNDARY: &str = "chunkstream-test-boundary";

struct MemoryServer {
    router: Router,
    appender: Arc<MemoryChunkAppender>,
}

fn memory_server(policy: IngestPolicy) -> MemoryServer {
    let appender = Arc::new(MemoryChunkAppender::new());
    let coordinator = Arc::new(ChunkIngestionCoordinator::new(
        Arc::new(MemoryStateStore::new()),
        appender.clone(),
        policy,
    ));
    let mut config = Config::default();
    config.storage.storage_type = StorageType::Memory;
    let router = create_router(Arc::new(AppState::new(coordinator, config)));
    MemoryServer { router, appender }
}

fn fast_policy() -> IngestPolicy {
    IngestPolicy {
        max_attempts: 3,
        poll_interval: Duration::from_millis(20),
    }
}

fn multipart_body(fields: &[(&str, &str)], audio: Option<&[u8]>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some(audio) = audio {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"audio\"; filename=\"chunk.webm\"\r\nContent-Type: audio/webm\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(audio);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn chunk_request(stream_id: &str, chunk_index: &str, audio: &[u8]) -> Request<Body> {
    upload_request(multipart_body(
        &[("stream_id", stream_id), ("chunk_index", chunk_index)],
        Some(audio),
    ))
}

fn upload_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/chunk")
        .header(CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

fn reason(body: &Value) -> &str {
    body["details"]["reason"].as_str().unwrap_or_default()
}

fn sid(id: &str) -> StreamId {
    StreamId::new(id).unwrap()
}

#[tokio::test]
async fn chunks_in_order_are_appended() {
    let server = memory_server(fast_policy());

    for (index, payload) in ["0", "1", "2"].iter().zip([b"aa", b"bb", b"cc"]) {
        let (status, body) = send(&server.router, chunk_request("s1", index, payload)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
    }

    assert_eq!(server.appender.contents(&sid("s1")).unwrap(), b"aabbcc");

    let (status, body) = send(&server.router, get("/api/streams/s1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["stream_id"], "s1");
    assert_eq!(body["data"]["last_applied_index"], 2);
}

#[tokio::test]
async fn duplicate_chunk_is_acknowledged_without_writing() {
    let server = memory_server(fast_policy());
    send(&server.router, chunk_request("s1", "0", b"aa")).await;
    send(&server.router, chunk_request("s1", "1", b"bb")).await;

    let (status, body) = send(&server.router, chunk_request("s1", "1", b"XX")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(server.appender.contents(&sid("s1")).unwrap(), b"aabb");
}

#[tokio::test]
async fn unknown_stream_is_rejected() {
    let server = memory_server(fast_policy());

    let (status, body) = send(&server.router, chunk_request("s2", "1", b"bb")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(reason(&body), "unknown_stream");

    let (status, _) = send(&server.router, get("/api/streams/s2")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn missing_predecessor_times_out() {
    let server = memory_server(fast_policy());
    send(&server.router, chunk_request("s1", "0", b"aa")).await;

    let (status, body) = send(&server.router, chunk_request("s1", "3", b"dd")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(reason(&body), "timeout");
    assert_eq!(server.appender.contents(&sid("s1")).unwrap(), b"aa");
}

#[tokio::test]
async fn early_chunk_waits_for_its_predecessor() {
    let server = memory_server(IngestPolicy {
        max_attempts: 50,
        poll_interval: Duration::from_millis(20),
    });
    send(&server.router, chunk_request("s1", "0", b"aa")).await;

    let early = {
        let router = server.router.clone();
        tokio::spawn(async move { send(&router, chunk_request("s1", "2", b"cc")).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let (status, _) = send(&server.router, chunk_request("s1", "1", b"bb")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = early.await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(server.appender.contents(&sid("s1")).unwrap(), b"aabbcc");
}

#[tokio::test]
async fn malformed_uploads_are_rejected() {
    let server = memory_server(fast_policy());

    let (status, body) = send(&server.router, chunk_request("../etc", "0", b"aa")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(reason(&body), "invalid_stream_id");

    let (status, body) = send(&server.router, chunk_request("s1", "-1", b"aa")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(reason(&body), "invalid_request");

    let no_audio = multipart_body(&[("stream_id", "s1"), ("chunk_index", "0")], None);
    let (status, body) = send(&server.router, upload_request(no_audio)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(reason(&body), "invalid_request");

    let no_stream = multipart_body(&[("chunk_index", "0")], Some(b"aa"));
    let (status, body) = send(&server.router, upload_request(no_stream)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(reason(&body), "invalid_request");

    assert!(server.appender.contents(&sid("s1")).is_none());
}

#[tokio::test]
async fn system_routes_respond() {
    let server = memory_server(fast_policy());

    let (status, body) = send(&server.router, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = send(&server.router, get("/info")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Chunkstream");
    assert_eq!(body["storage"], "memory");

    let (status, body) = send(&server.router, get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["endpoints"]["chunk"].is_string());

    send(&server.router, chunk_request("m1", "0", b"aa")).await;
    let response = server.router.clone().oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let text = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8_lossy(&text);
    assert!(text.contains("chunkstream_chunks_applied_first_total"));
}

#[tokio::test]
async fn disk_backend_persists_output_and_state() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.storage.data_dir = dir.path().to_path_buf();
    config.ingest.poll_interval_ms = 20;

    let app_state = match create_app_state(config).unwrap() {
        ConfiguredAppState::Disk { app_state } => app_state,
        ConfiguredAppState::Memory { .. } => panic!("expected disk backend"),
    };
    let router = create_router(Arc::new(app_state));

    send(&router, chunk_request("rec-1", "0", b"head")).await;
    let (status, _) = send(&router, chunk_request("rec-1", "1", b"tail")).await;
    assert_eq!(status, StatusCode::OK);

    let output = std::fs::read(dir.path().join("audio_files/rec-1.webm")).unwrap();
    assert_eq!(output, b"headtail");

    let snapshot: Value =
        serde_json::from_slice(&std::fs::read(dir.path().join("chunk_state.json")).unwrap())
            .unwrap();
    assert_eq!(snapshot, serde_json::json!({ "rec-1": 1 }));
}

#[tokio::test]
async fn static_files_are_served_when_configured() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), "<h1>recorder</h1>").unwrap();

    let mut config = Config::default();
    config.storage.storage_type = StorageType::Memory;
    config.server.static_dir = Some(dir.path().to_path_buf());

    let app_state = match create_app_state(config).unwrap() {
        ConfiguredAppState::Memory { app_state } => app_state,
        ConfiguredAppState::Disk { .. } => panic!("expected memory backend"),
    };
    let router = create_router(Arc::new(app_state));

    let response = router.oneshot(get("/static/index.html")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"<h1>recorder</h1>");
}
