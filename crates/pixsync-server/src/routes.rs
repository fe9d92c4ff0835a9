//! Router assembly.

use crate::handlers::{broadcast, collections, health, upload, ws};
use crate::state::AppState;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Path prefix of locally stored blobs.
pub const STATIC_PREFIX: &str = "/static";

/// Build the application router.
pub fn router(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    let static_dir = state.static_dir.clone();
    let mut app = Router::new()
        .route("/api/collections/{channel}", get(collections::list_records))
        .route(
            "/api/collections/{channel}/latest",
            get(collections::latest_records),
        )
        .route("/urls/{channel}", get(collections::list_urls))
        .route("/upload/{channel}", post(upload::upload))
        .route("/api/broadcast", post(broadcast::broadcast))
        .route("/health", get(health::health))
        .route("/ws", get(ws::subscribe_all))
        .route("/ws/{channel}", get(ws::subscribe_channel))
        .with_state(state);

    if let Some(dir) = static_dir {
        app = app.nest_service(STATIC_PREFIX, ServeDir::new(dir));
    }

    app.layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use bytes::Bytes;
    use pixsync_core::{Channel, ChangeEvent};
    use pixsync_db::{Database, MetadataIndex, SqliteIndex};
    use pixsync_ingest::Coordinator;
    use axum_test::TestServer;
    use pixsync_notify::{spawn_relay, ChannelSink, Notifier};
    use pixsync_storage::{BlobStore, Locator, ObjectBlobStore, StorageError, StorageResult};
    use serde_json::Value;
    use std::time::Duration;
    use tower::ServiceExt;

    const BOUNDARY: &str = "pixsync-test-boundary";

    /// Blob store that is down.
    struct OfflineStore;

    #[async_trait]
    impl BlobStore for OfflineStore {
        async fn put(&self, _key: &str, _data: Bytes) -> StorageResult<Locator> {
            Err(StorageError::UploadFailed("bucket unreachable".to_string()))
        }

        async fn get(&self, key: &str) -> StorageResult<Bytes> {
            Err(StorageError::NotFound(key.to_string()))
        }

        async fn list(&self, _prefix: &str) -> StorageResult<Vec<String>> {
            Err(StorageError::BackendError("bucket unreachable".to_string()))
        }

        fn locator(&self, key: &str) -> Locator {
            Locator::new(key)
        }
    }

    struct Harness {
        app: Router,
        index: Arc<SqliteIndex>,
        notifier: Notifier,
        coordinator: Coordinator,
    }

    fn harness_with(store: Arc<dyn BlobStore>) -> Harness {
        harness_configured(store, |state| state)
    }

    fn harness_configured(
        store: Arc<dyn BlobStore>,
        configure: impl FnOnce(AppState) -> AppState,
    ) -> Harness {
        let index = Arc::new(SqliteIndex::new(Database::open_in_memory().unwrap()));
        let notifier = Notifier::new();
        let coordinator = Coordinator::new(store.clone(), index.clone())
            .with_channels(vec![Channel::Original, Channel::AIService]);
        let state = configure(AppState::new(
            index.clone(),
            store,
            coordinator.clone(),
            notifier.clone(),
        ));

        Harness {
            app: router(Arc::new(state), 1024 * 1024),
            index,
            notifier,
            coordinator,
        }
    }

    fn harness() -> Harness {
        harness_with(Arc::new(ObjectBlobStore::in_memory("http://localhost:8000/static")))
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, value)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn multipart_upload(uri: &str, filename: &str, data: &[u8]) -> Request<Body> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_empty_collection_is_empty_list() {
        let h = harness();
        let (status, body) = send(&h.app, get("/api/collections/Original")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_unknown_channel_is_bad_request() {
        let h = harness();
        let (status, body) = send(&h.app, get("/api/collections/Gallery")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("Gallery"));
    }

    #[tokio::test]
    async fn test_listing_is_newest_first_with_limit() {
        let h = harness();
        for name in ["a.png", "b.png", "c.png"] {
            h.coordinator
                .ingest_bytes(Channel::Original, name, Bytes::from_static(b"x"))
                .await
                .unwrap();
        }

        let (_, all) = send(&h.app, get("/api/collections/Original")).await;
        assert_eq!(all.as_array().unwrap().len(), 3);
        assert_eq!(all[0]["name"], "c.png");

        let (_, limited) = send(&h.app, get("/api/collections/Original?limit=2")).await;
        assert_eq!(limited.as_array().unwrap().len(), 2);

        let (_, latest) = send(&h.app, get("/api/collections/Original/latest?limit=1")).await;
        assert_eq!(latest.as_array().unwrap().len(), 1);
        assert_eq!(latest[0]["id"], "Original_c_png");

        let (_, urls) = send(&h.app, get("/urls/Original")).await;
        assert_eq!(urls[0], "http://localhost:8000/static/Original/c.png");
    }

    #[tokio::test]
    async fn test_upload_creates_record() {
        let h = harness();
        let (status, body) = send(
            &h.app,
            multipart_upload("/upload/Original", "photo1.png", b"pixels"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], "Original_photo1_png");
        assert_eq!(body["url"], "http://localhost:8000/static/Original/photo1.png");

        let records = h.index.query(Channel::Original, None).await.unwrap();
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn test_upload_to_disabled_channel_is_rejected() {
        let h = harness();
        let (status, _) = send(
            &h.app,
            multipart_upload("/upload/Photobooth", "p.png", b"x"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_upload_store_failure_is_server_error() {
        let h = harness_with(Arc::new(OfflineStore));
        let (status, body) = send(
            &h.app,
            multipart_upload("/upload/Original", "photo1.png", b"pixels"),
        )
        .await;

        assert!(status.is_server_error());
        assert!(body["error"].is_string());
        assert!(h.index.query(Channel::Original, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_broadcast_reaches_all_subscribers() {
        let h = harness();
        let (sink, mut rx) = ChannelSink::bounded(4);
        h.notifier.register(Arc::new(sink), Some(Channel::Photobooth)).await;

        let record = h
            .coordinator
            .ingest_bytes(Channel::AIService, "ai.png", Bytes::from_static(b"x"))
            .await
            .unwrap();
        let event = ChangeEvent::new(pixsync_core::ChangeKind::DocumentAdded, record);

        let request = Request::builder()
            .method("POST")
            .uri("/api/broadcast")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&event).unwrap()))
            .unwrap();
        let (status, body) = send(&h.app, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["delivered"], 1);
        let frame: Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(frame["collection"], "AIService");
    }

    #[tokio::test]
    async fn test_broadcast_rejects_malformed_body() {
        let h = harness();
        let request = Request::builder()
            .method("POST")
            .uri("/api/broadcast")
            .header("content-type", "application/json")
            .body(Body::from("{\"not\": \"an event\"}"))
            .unwrap();
        let (status, _) = send(&h.app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_health_reports_each_channel() {
        let h = harness();
        let (status, body) = send(&h.app, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["Original"]["index"], "ok");
        assert_eq!(body["AIService"]["storage"], "ok");
        assert!(body.get("Photobooth").is_none());

        let down = harness_with(Arc::new(OfflineStore));
        let (status, body) = send(&down.app, get("/health")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["Original"]["storage"], "error");
    }

    #[tokio::test]
    async fn test_local_blob_locator_is_served() {
        let dir = tempfile::tempdir().unwrap();
        let store = ObjectBlobStore::local(dir.path(), "http://localhost:8000/static").unwrap();
        let root = dir.path().to_path_buf();
        let h = harness_configured(Arc::new(store), move |state| state.with_static_dir(root));

        let record = h
            .coordinator
            .ingest_bytes(Channel::Original, "photo1.png", Bytes::from_static(b"pixels"))
            .await
            .unwrap();
        let path = record.url.strip_prefix("http://localhost:8000").unwrap();
        assert_eq!(path, "/static/Original/photo1.png");

        let response = h.app.clone().oneshot(get(path)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"pixels");

        let response = h.app.clone().oneshot(get("/static/Original/missing.png")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_static_files_are_not_mounted_by_default() {
        let h = harness();
        let response = h.app.clone().oneshot(get("/static/Original/a.png")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    async fn wait_for_subscribers(notifier: &Notifier, expected: usize) {
        for _ in 0..200 {
            if notifier.subscriber_count().await == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {expected} subscribers");
    }

    #[tokio::test]
    async fn test_websocket_receives_only_its_channel() {
        let h = harness();
        let relay = spawn_relay(h.index.as_ref(), h.notifier.clone());
        let server = TestServer::builder()
            .http_transport()
            .build(h.app.clone())
            .unwrap();

        let mut socket = server.get_websocket("/ws/Original").await.into_websocket().await;
        wait_for_subscribers(&h.notifier, 1).await;

        h.coordinator
            .ingest_bytes(Channel::AIService, "other.png", Bytes::from_static(b"x"))
            .await
            .unwrap();
        h.coordinator
            .ingest_bytes(Channel::Original, "photo1.png", Bytes::from_static(b"x"))
            .await
            .unwrap();

        let frame: Value = serde_json::from_str(&socket.receive_text().await).unwrap();
        assert_eq!(frame["type"], "document_added");
        assert_eq!(frame["collection"], "Original");
        assert_eq!(frame["data"]["name"], "photo1.png");

        socket.close().await;
        wait_for_subscribers(&h.notifier, 0).await;
        relay.abort();
    }

    #[tokio::test]
    async fn test_websocket_unknown_channel_is_rejected() {
        let h = harness();
        let server = TestServer::builder()
            .http_transport()
            .build(h.app.clone())
            .unwrap();

        server
            .get_websocket("/ws/Gallery")
            .expect_failure()
            .await
            .assert_status_bad_request();
        assert_eq!(h.notifier.subscriber_count().await, 0);
    }
}
