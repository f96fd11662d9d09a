//! HTTP client posting captured frames to the relay service
//!
//! Request: raw JPEG body, `Content-Type: application/octet-stream`,
//! `Accept: application/json`, and `X-Api-Key` when a credential is set.
//! Response: 2xx with `{"description": "..."}`; everything else is an error.

use std::fmt;

use anyhow::{Context, Result};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use tracing::debug;

use crate::config::RelayClientConfig;
use crate::error::display_chain;
use crate::protocol::API_KEY_HEADER;
use crate::Frame;

/// Text returned by the vision provider for one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Description(String);

impl Description {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Description {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Relay round-trip failures. All are recoverable at the device.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// DNS, connect, timeout, or a broken body read
    #[error("failed to reach vision service: {}", display_chain(.0))]
    Unreachable(#[source] reqwest::Error),

    /// Non-2xx status; the body is not inspected
    #[error("vision service returned status {0}")]
    ServiceError(u16),

    /// 2xx body that is not a JSON object with a `description` string
    #[error("vision service returned unexpected payload: {0}")]
    MalformedResponse(String),
}

/// Posts frames to the relay's analyze endpoint
#[derive(Debug, Clone)]
pub struct RelayClient {
    http: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl RelayClient {
    pub fn new(config: RelayClientConfig) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            endpoint: config.endpoint,
            api_key: config.api_key.filter(|key| !key.is_empty()),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send one frame and return the provider's description.
    ///
    /// The response is dropped on every return path, which releases the
    /// connection back to the pool (or closes it).
    pub async fn send(&self, frame: &Frame) -> Result<Description, RelayError> {
        let mut request = self
            .http
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(ACCEPT, "application/json")
            .body(frame.payload().clone());

        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let response = request.send().await.map_err(RelayError::Unreachable)?;

        let status = response.status();
        if !status.is_success() {
            debug!(status = status.as_u16(), "Relay rejected frame");
            return Err(RelayError::ServiceError(status.as_u16()));
        }

        let body = response.bytes().await.map_err(RelayError::Unreachable)?;
        parse_description(&body)
    }
}

/// Extract `description` from a relay response body
fn parse_description(body: &[u8]) -> Result<Description, RelayError> {
    let malformed = || RelayError::MalformedResponse(String::from_utf8_lossy(body).into_owned());

    let payload: serde_json::Value = serde_json::from_slice(body).map_err(|_| malformed())?;
    payload
        .as_object()
        .and_then(|obj| obj.get("description"))
        .and_then(|d| d.as_str())
        .map(|d| Description(d.to_string()))
        .ok_or_else(malformed)
}
