//! Relay service: device frames in, vision descriptions out
//!
//! - `POST /analyze`: raw image body, optional `X-Api-Key` → `{"description"}`
//! - `GET /healthz`: `{"status": "ok"}`
//!
//! Configuration and the provider client are built once at startup and shared
//! read-only across requests.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::HeaderMap;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use base64::Engine as _;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::error::ApiError;
use super::healthz;
use super::provider::{extract_description, VisionProvider, VisionRequest};
use crate::config::RelayServiceConfig;
use crate::protocol::{
    ANALYZE_PATH, API_KEY_HEADER, DEFAULT_MAX_BODY_BYTES, DEFAULT_MAX_OUTPUT_TOKENS,
    DEFAULT_VISION_INSTRUCTION, HEALTH_PATH,
};

/// Shared state for the relay handlers
#[derive(Clone)]
pub struct RelayState {
    provider: Arc<dyn VisionProvider>,
    shared_secret: Option<String>,
    instruction: String,
    max_output_tokens: u32,
    max_body_bytes: usize,
}

impl RelayState {
    /// State with default instruction/limits and no shared secret
    pub fn new(provider: impl VisionProvider + 'static) -> Self {
        Self {
            provider: Arc::new(provider),
            shared_secret: None,
            instruction: DEFAULT_VISION_INSTRUCTION.to_string(),
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    pub fn from_config(config: &RelayServiceConfig, provider: impl VisionProvider + 'static) -> Self {
        Self::new(provider)
            .with_shared_secret(config.shared_secret.clone())
            .with_instruction(config.provider.instruction.clone())
            .with_max_output_tokens(config.provider.max_output_tokens)
            .with_max_body_bytes(config.max_body_bytes)
    }

    /// Require a matching `X-Api-Key`; `None` or empty disables the check
    pub fn with_shared_secret(mut self, secret: Option<String>) -> Self {
        self.shared_secret = secret.filter(|s| !s.is_empty());
        self
    }

    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }

    pub fn with_max_output_tokens(mut self, tokens: u32) -> Self {
        self.max_output_tokens = tokens;
        self
    }

    pub fn with_max_body_bytes(mut self, bytes: usize) -> Self {
        self.max_body_bytes = bytes;
        self
    }

    fn authorize(&self, headers: &HeaderMap) -> Result<(), ApiError> {
        let Some(expected) = &self.shared_secret else {
            return Ok(());
        };
        let provided = headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if provided != expected {
            return Err(ApiError::Unauthorized);
        }
        Ok(())
    }
}

/// Build the relay router
pub fn router(state: RelayState) -> Router {
    let body_limit = state.max_body_bytes;
    Router::new()
        .route(ANALYZE_PATH, post(analyze))
        .route(HEALTH_PATH, get(healthz))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

/// Bind and serve the relay until the process exits
pub async fn serve(config: RelayServiceConfig, provider: impl VisionProvider + 'static) -> Result<()> {
    let bind = config.bind;
    let app = router(RelayState::from_config(&config, provider));

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .context(format!("Failed to bind to {}", bind))?;

    info!(
        auth = config.shared_secret.is_some(),
        model = %config.provider.model,
        "Relay listening on http://{}",
        bind
    );

    axum::serve(listener, app).await.context("Relay server error")?;
    Ok(())
}

/// POST /analyze: describe one image
async fn analyze(
    State(state): State<Arc<RelayState>>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<Value>, ApiError> {
    state.authorize(&headers)?;

    let image = body.map_err(|rejection| ApiError::Rejected {
        status: rejection.status(),
        detail: rejection.body_text(),
    })?;
    if image.is_empty() {
        return Err(ApiError::BadRequest("Missing image data".into()));
    }

    info!(bytes = image.len(), "Analyzing image");
    let request = VisionRequest {
        instruction: state.instruction.clone(),
        image_base64: base64::engine::general_purpose::STANDARD.encode(&image),
        max_output_tokens: state.max_output_tokens,
    };

    let response = state.provider.describe(request).await?;
    let description =
        extract_description(&response).ok_or(ApiError::MalformedProviderResponse)?;

    info!(chars = description.chars().count(), "Description ready");
    Ok(Json(json!({ "description": description })))
}
