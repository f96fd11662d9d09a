//! Inference service tests against a real listener
//!
//! Run: `cargo test --test inference`

use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use image::{ImageFormat, RgbImage};
use reqwest::multipart::{Form, Part};
use serde_json::{json, Value};

use veri_cam::server::{infer, Classifier, ClassifierError, Detection, InferState};

// ── Shared helpers ───────────────────────────────────────────────────

/// Returns fixed detections and records the image geometry it was given
#[derive(Clone, Default)]
struct StubClassifier {
    calls: Arc<AtomicUsize>,
    last_width: Arc<AtomicUsize>,
    fail: bool,
}

#[async_trait::async_trait]
impl Classifier for StubClassifier {
    async fn predict(&self, image: &RgbImage) -> Result<Vec<Detection>, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.last_width
            .store(image.width() as usize, Ordering::SeqCst);
        if self.fail {
            return Err(ClassifierError::Failed {
                status: "exit status: 1".into(),
                stderr: "model crashed".into(),
            });
        }
        Ok(vec![
            Detection {
                label: "cup".into(),
                confidence: 0.9,
            },
            Detection {
                label: "person".into(),
                confidence: 0.2,
            },
        ])
    }
}

async fn start_infer(classifier: StubClassifier) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = InferState::new(classifier, 0.35);
    tokio::spawn(async move {
        axum::serve(listener, infer::router(state)).await.unwrap();
    });
    addr
}

fn jpeg(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_pixel(width, height, image::Rgb([200, 120, 40]));
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, ImageFormat::Jpeg).unwrap();
    out.into_inner()
}

async fn post_form(addr: SocketAddr, form: Form) -> (reqwest::StatusCode, Value) {
    let response = reqwest::Client::new()
        .post(format!("http://{}/infer", addr))
        .multipart(form)
        .send()
        .await
        .unwrap();
    let status = response.status();
    (status, response.json().await.unwrap())
}

fn image_part(bytes: Vec<u8>, mime: &str) -> Part {
    Part::bytes(bytes)
        .file_name("frame.jpg")
        .mime_str(mime)
        .unwrap()
}

// ── Tests ────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn detections_below_threshold_are_dropped() {
    let classifier = StubClassifier::default();
    let addr = start_infer(classifier.clone()).await;

    let form = Form::new().part("image", image_part(jpeg(64, 48), "image/jpeg"));
    let (status, body) = post_form(addr, form).await;

    assert_eq!(status, 200);
    assert_eq!(
        body,
        json!({ "objects": [{ "label": "cup", "confidence": 0.9 }] })
    );
    assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);
    assert_eq!(classifier.last_width.load(Ordering::SeqCst), 64);
}

#[tokio::test(flavor = "multi_thread")]
async fn image_jpg_content_type_is_accepted() {
    let addr = start_infer(StubClassifier::default()).await;

    let form = Form::new()
        .text("note", "ignored")
        .part("image", image_part(jpeg(16, 16), "image/jpg"));
    let (status, body) = post_form(addr, form).await;
    assert_eq!(status, 200);
    assert_eq!(body["objects"].as_array().unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn non_jpeg_content_type_is_rejected() {
    let classifier = StubClassifier::default();
    let addr = start_infer(classifier.clone()).await;

    let form = Form::new().part("image", image_part(jpeg(16, 16), "image/png"));
    let (status, body) = post_form(addr, form).await;

    assert_eq!(status, 400);
    assert_eq!(
        body,
        json!({ "detail": "Use JPEG (content-type image/jpeg)" })
    );
    assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn undecodable_jpeg_is_rejected() {
    let classifier = StubClassifier::default();
    let addr = start_infer(classifier.clone()).await;

    let form = Form::new().part("image", image_part(b"not a jpeg".to_vec(), "image/jpeg"));
    let (status, body) = post_form(addr, form).await;

    assert_eq!(status, 400);
    assert!(body["detail"].as_str().unwrap().starts_with("Invalid JPEG"));
    assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_image_field_is_rejected() {
    let addr = start_infer(StubClassifier::default()).await;

    let form = Form::new().text("other", "value");
    let (status, body) = post_form(addr, form).await;
    assert_eq!(status, 400);
    assert!(body["detail"].as_str().unwrap().contains("image"));
}

#[tokio::test(flavor = "multi_thread")]
async fn non_multipart_request_is_rejected() {
    let addr = start_infer(StubClassifier::default()).await;

    let response = reqwest::Client::new()
        .post(format!("http://{}/infer", addr))
        .header("content-type", "image/jpeg")
        .body(jpeg(8, 8))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert!(body["detail"].is_string());
}

#[tokio::test(flavor = "multi_thread")]
async fn classifier_failure_is_internal_error() {
    let addr = start_infer(StubClassifier {
        fail: true,
        ..Default::default()
    })
    .await;

    let form = Form::new().part("image", image_part(jpeg(8, 8), "image/jpeg"));
    let (status, body) = post_form(addr, form).await;
    assert_eq!(status, 500);
    assert!(body["detail"].as_str().unwrap().contains("model crashed"));
}
