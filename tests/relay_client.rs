//! Device-side relay client against scripted HTTP servers
//!
//! Run: `cargo test --test relay_client`

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::Router;

use veri_cam::config::RelayClientConfig;
use veri_cam::{Frame, RelayClient, RelayError};

/// Headers and body of the last request a stub relay saw
#[derive(Default)]
struct Seen {
    headers: Option<HeaderMap>,
    body: Option<Bytes>,
}

/// Start a stub relay answering every `/analyze` with `status` and `body`.
async fn start_stub(status: StatusCode, body: &'static str) -> (SocketAddr, Arc<Mutex<Seen>>) {
    let seen = Arc::new(Mutex::new(Seen::default()));
    let recorder = Arc::clone(&seen);

    let app = Router::new().route(
        "/analyze",
        post(move |headers: HeaderMap, payload: Bytes| {
            let recorder = Arc::clone(&recorder);
            async move {
                let mut seen = recorder.lock().unwrap();
                seen.headers = Some(headers);
                seen.body = Some(payload);
                (status, body)
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, seen)
}

fn client(addr: SocketAddr, api_key: Option<&str>) -> RelayClient {
    RelayClient::new(RelayClientConfig {
        endpoint: format!("http://{}/analyze", addr),
        api_key: api_key.map(str::to_string),
        ..Default::default()
    })
    .unwrap()
}

fn frame() -> Frame {
    Frame::new(vec![0xFF, 0xD8, 0x01, 0x02, 0xFF, 0xD9])
}

#[tokio::test(flavor = "multi_thread")]
async fn returns_description_and_sends_expected_headers() {
    let (addr, seen) = start_stub(StatusCode::OK, r#"{"description": "uma caneca"}"#).await;

    let description = client(addr, Some("s3cret")).send(&frame()).await.unwrap();
    assert_eq!(description.as_str(), "uma caneca");

    let seen = seen.lock().unwrap();
    let headers = seen.headers.as_ref().unwrap();
    assert_eq!(headers["content-type"], "application/octet-stream");
    assert_eq!(headers["accept"], "application/json");
    assert_eq!(headers["x-api-key"], "s3cret");
    assert_eq!(
        seen.body.as_deref(),
        Some(&[0xFF, 0xD8, 0x01, 0x02, 0xFF, 0xD9][..])
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn no_key_header_without_credential() {
    let (addr, seen) = start_stub(StatusCode::OK, r#"{"description": "vazio"}"#).await;

    client(addr, None).send(&frame()).await.unwrap();
    assert!(!seen
        .lock()
        .unwrap()
        .headers
        .as_ref()
        .unwrap()
        .contains_key("x-api-key"));

    // An empty credential counts as no credential
    client(addr, Some("")).send(&frame()).await.unwrap();
    assert!(!seen
        .lock()
        .unwrap()
        .headers
        .as_ref()
        .unwrap()
        .contains_key("x-api-key"));
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_object_is_malformed() {
    let (addr, _) = start_stub(StatusCode::OK, "{}").await;

    match client(addr, None).send(&frame()).await {
        Err(RelayError::MalformedResponse(raw)) => assert_eq!(raw, "{}"),
        other => panic!("expected MalformedResponse, got {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn error_status_is_service_error_without_parsing_body() {
    let (addr, _) = start_stub(StatusCode::INTERNAL_SERVER_ERROR, "<html>boom</html>").await;

    match client(addr, None).send(&frame()).await {
        Err(RelayError::ServiceError(status)) => assert_eq!(status, 500),
        other => panic!("expected ServiceError, got {:?}", other),
    }

    let (addr, _) = start_stub(StatusCode::UNAUTHORIZED, r#"{"detail": "Invalid API key"}"#).await;
    assert!(matches!(
        client(addr, Some("wrong")).send(&frame()).await,
        Err(RelayError::ServiceError(401))
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn closed_port_is_unreachable() {
    // Bind then drop to get a port nothing listens on
    let addr = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };

    assert!(matches!(
        client(addr, None).send(&frame()).await,
        Err(RelayError::Unreachable(_))
    ));
}
