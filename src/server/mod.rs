//! HTTP services
//!
//! - `relay`: accepts device frames on `/analyze` and asks a vision provider
//!   for a description
//! - `infer`: reference object-detection service on `/infer`
//!
//! Both expose `GET /healthz` and report failures as `{"detail": "..."}`.

pub mod classifier;
mod error;
pub mod infer;
pub mod provider;
pub mod relay;

use axum::response::Json;
use serde_json::{json, Value};

pub use classifier::CommandClassifier;
pub use error::ApiError;
pub use infer::{filter_detections, Classifier, ClassifierError, Detection, InferState};
pub use provider::{extract_description, OpenAiProvider, ProviderError, VisionProvider, VisionRequest};
pub use relay::RelayState;

/// GET /healthz
async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
