//! Vision provider: turns an image into a natural-language description
//!
//! The relay only depends on `VisionProvider`. `OpenAiProvider` talks to the
//! OpenAI Responses API; tests plug in recording stubs.

use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::ProviderConfig;
use crate::error::display_chain;

/// One single-turn multimodal request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisionRequest {
    pub instruction: String,
    /// JPEG bytes, base64 encoded
    pub image_base64: String,
    pub max_output_tokens: u32,
}

/// Upstream call failures (network, auth, quota, ...)
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("{}", display_chain(.0))]
    Transport(#[from] reqwest::Error),

    #[error("provider returned {status}: {message}")]
    Status { status: u16, message: String },
}

/// Opaque vision model behind the relay
#[async_trait::async_trait]
pub trait VisionProvider: Send + Sync {
    /// Submit the request and return the provider's raw JSON response.
    ///
    /// Shape validation is left to the caller so an unexpected response can
    /// be told apart from a failed call.
    async fn describe(&self, request: VisionRequest) -> Result<Value, ProviderError>;
}

/// First text part of the first output message, trimmed.
///
/// Responses API layout: `output[].content[].text`. Output items without
/// content (e.g. reasoning) and content parts without text are skipped.
pub fn extract_description(response: &Value) -> Option<String> {
    response
        .get("output")?
        .as_array()?
        .iter()
        .filter_map(|item| item.get("content").and_then(Value::as_array))
        .flatten()
        .find_map(|part| part.get("text").and_then(Value::as_str))
        .map(|text| text.trim().to_string())
}

/// OpenAI Responses API client
#[derive(Clone)]
pub struct OpenAiProvider {
    http: Client,
    config: ProviderConfig,
}

impl OpenAiProvider {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { http, config })
    }

    fn request_body(&self, request: &VisionRequest) -> Value {
        json!({
            "model": self.config.model,
            "input": [{
                "role": "user",
                "content": [
                    { "type": "input_text", "text": request.instruction },
                    {
                        "type": "input_image",
                        "image_url": format!("data:image/jpeg;base64,{}", request.image_base64),
                    },
                ],
            }],
            "max_output_tokens": request.max_output_tokens,
        })
    }
}

#[async_trait::async_trait]
impl VisionProvider for OpenAiProvider {
    async fn describe(&self, request: VisionRequest) -> Result<Value, ProviderError> {
        let url = format!("{}/responses", self.config.base_url);
        debug!(%url, model = %self.config.model, "Calling vision provider");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&self.request_body(&request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        Ok(response.json().await?)
    }
}

/// `error.message` from an API error body, else the (shortened) raw body
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")?
                .get("message")?
                .as_str()
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.chars().take(200).collect())
}
