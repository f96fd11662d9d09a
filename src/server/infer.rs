//! Object-detection service: `POST /infer` (multipart JPEG) → labelled detections
//!
//! Response body: `{"objects": [{"label": "cup", "confidence": 0.91}, ...]}`,
//! keeping only detections at or above the configured threshold, in the order
//! the classifier produced them.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::multipart::{Field, Multipart, MultipartError, MultipartRejection};
use axum::extract::State;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use bytes::Bytes;
use image::{ImageFormat, RgbImage};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use super::error::ApiError;
use super::healthz;
use crate::config::InferConfig;
use crate::protocol::{HEALTH_PATH, INFER_IMAGE_FIELD, INFER_PATH};

const JPEG_ONLY: &str = "Use JPEG (content-type image/jpeg)";

/// One labelled detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    pub confidence: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("failed to run detector: {0}")]
    Io(#[from] std::io::Error),

    #[error("detector exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("detector output is not a detection list: {0}")]
    Output(#[from] serde_json::Error),
}

/// Object detector behind `/infer`
#[async_trait::async_trait]
pub trait Classifier: Send + Sync {
    /// All detections for the image, unfiltered
    async fn predict(&self, image: &RgbImage) -> Result<Vec<Detection>, ClassifierError>;
}

/// Keep detections with `confidence >= threshold`, preserving order
pub fn filter_detections(detections: Vec<Detection>, threshold: f64) -> Vec<Detection> {
    detections
        .into_iter()
        .filter(|d| d.confidence >= threshold)
        .collect()
}

/// Shared state for the inference handlers
#[derive(Clone)]
pub struct InferState {
    classifier: Arc<dyn Classifier>,
    threshold: f64,
}

impl InferState {
    pub fn new(classifier: impl Classifier + 'static, threshold: f64) -> Self {
        Self {
            classifier: Arc::new(classifier),
            threshold,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

/// Build the inference router
pub fn router(state: InferState) -> Router {
    Router::new()
        .route(INFER_PATH, post(infer))
        .route(HEALTH_PATH, get(healthz))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

/// Bind and serve the inference service until the process exits
pub async fn serve(config: InferConfig, classifier: impl Classifier + 'static) -> Result<()> {
    let bind = config.bind;
    let app = router(InferState::new(classifier, config.confidence_threshold));

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .context(format!("Failed to bind to {}", bind))?;

    info!(
        model = %config.model_path.display(),
        threshold = config.confidence_threshold,
        "Inference service listening on http://{}",
        bind
    );

    axum::serve(listener, app)
        .await
        .context("Inference server error")?;
    Ok(())
}

/// POST /infer: detect objects in one JPEG
async fn infer(
    State(state): State<Arc<InferState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Value>, ApiError> {
    let mut multipart = multipart.map_err(|rejection| ApiError::Rejected {
        status: rejection.status(),
        detail: rejection.body_text(),
    })?;

    let jpeg = read_image_field(&mut multipart).await?;
    debug!(bytes = jpeg.len(), "Decoding image");

    let image = tokio::task::spawn_blocking(move || decode_rgb(&jpeg))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;

    let detections = state.classifier.predict(&image).await?;
    let total = detections.len();
    let objects = filter_detections(detections, state.threshold);

    info!(
        width = image.width(),
        height = image.height(),
        detected = total,
        kept = objects.len(),
        "Inference done"
    );
    Ok(Json(json!({ "objects": objects })))
}

/// Bytes of the `image` field; other fields are skipped
async fn read_image_field(multipart: &mut Multipart) -> Result<Bytes, ApiError> {
    let multipart_error = |e: MultipartError| ApiError::Rejected {
        status: e.status(),
        detail: e.body_text(),
    };

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(INFER_IMAGE_FIELD) {
            continue;
        }
        if !is_jpeg(&field) {
            return Err(ApiError::BadRequest(JPEG_ONLY.into()));
        }
        return field.bytes().await.map_err(multipart_error);
    }

    Err(ApiError::BadRequest(format!(
        "Missing multipart field '{}'",
        INFER_IMAGE_FIELD
    )))
}

fn is_jpeg(field: &Field<'_>) -> bool {
    field
        .content_type()
        .and_then(|ct| ct.split(';').next())
        .map(|ct| {
            let ct = ct.trim();
            ct.eq_ignore_ascii_case("image/jpeg") || ct.eq_ignore_ascii_case("image/jpg")
        })
        .unwrap_or(false)
}

fn decode_rgb(jpeg: &[u8]) -> Result<RgbImage, ApiError> {
    image::load_from_memory_with_format(jpeg, ImageFormat::Jpeg)
        .map(|image| image.to_rgb8())
        .map_err(|e| ApiError::BadRequest(format!("Invalid JPEG: {}", e)))
}
