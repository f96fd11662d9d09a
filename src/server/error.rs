//! HTTP error responses for the relay and inference services
//!
//! Every rejected request gets a JSON body `{"detail": "..."}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use super::infer::ClassifierError;
use super::provider::ProviderError;

/// Request failures, mapped to 4xx for client input and 5xx for upstream/parsing
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid API key")]
    Unauthorized,

    #[error("{0}")]
    BadRequest(String),

    /// Extractor rejection (oversized body, unreadable body, ...)
    #[error("{detail}")]
    Rejected { status: StatusCode, detail: String },

    #[error("Vision provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Malformed response from vision model")]
    MalformedProviderResponse,

    #[error("Inference failed: {0}")]
    Inference(#[from] ClassifierError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Rejected { status, .. } => *status,
            ApiError::Provider(_) => StatusCode::BAD_GATEWAY,
            ApiError::MalformedProviderResponse
            | ApiError::Inference(_)
            | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = self.to_string();

        if status.is_server_error() {
            tracing::error!(status = %status, detail = %detail, "Request failed");
        } else {
            tracing::warn!(status = %status, detail = %detail, "Request rejected");
        }

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}
