//! Process configuration read once from the environment
//!
//! Every component gets its settings from one of the structs below, built at
//! startup and passed down by value. `from_env` reads the real environment;
//! `from_lookup` takes any lookup function so tests can supply their own.
//! Unparseable numbers fall back to their defaults.

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::protocol::{
    DEFAULT_CAPTURE_INTERVAL_SECS, DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_MAX_BODY_BYTES,
    DEFAULT_MAX_OUTPUT_TOKENS, DEFAULT_SERVICE_PORT, DEFAULT_VISION_INSTRUCTION,
    DEFAULT_VISION_MODEL,
};

/// Station credentials for the access point
#[derive(Clone, Default, PartialEq, Eq)]
pub struct WifiCredentials {
    pub ssid: String,
    pub password: String,
}

impl fmt::Debug for WifiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WifiCredentials")
            .field("ssid", &self.ssid)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Where and how the device talks to the relay
#[derive(Debug, Clone)]
pub struct RelayClientConfig {
    /// Full URL of the relay's analyze endpoint
    pub endpoint: String,
    /// Shared secret sent as `X-Api-Key` when non-empty
    pub api_key: Option<String>,
    /// Upper bound for one request, including the body
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for RelayClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://192.168.0.10:8000/analyze".to_string(),
            api_key: None,
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Device (camera firmware) configuration
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub wifi: WifiCredentials,
    pub relay: RelayClientConfig,
    /// Pause between the end of one cycle and the start of the next
    pub interval: Duration,
}

impl DeviceConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let wifi = WifiCredentials {
            ssid: lookup("VERI_WIFI_SSID").unwrap_or_default(),
            password: lookup("VERI_WIFI_PASSWORD").unwrap_or_default(),
        };

        let mut relay = RelayClientConfig::default();
        if let Some(endpoint) = lookup("VERI_VISION_ENDPOINT") {
            relay.endpoint = endpoint;
        }
        relay.api_key = lookup("VERI_VISION_API_KEY").filter(|key| !key.is_empty());
        relay.timeout = Duration::from_secs(parse_or(&lookup, "VERI_RELAY_TIMEOUT_SECS", 30));

        let interval_secs = parse_or(
            &lookup,
            "VERI_CAPTURE_INTERVAL_SECS",
            DEFAULT_CAPTURE_INTERVAL_SECS,
        );

        Ok(Self {
            wifi,
            relay,
            interval: Duration::from_secs(interval_secs),
        })
    }
}

/// Settings for the upstream vision provider
#[derive(Clone)]
pub struct ProviderConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    /// Instruction sent alongside the image
    pub instruction: String,
    pub max_output_tokens: u32,
    pub timeout: Duration,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("instruction", &self.instruction)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ProviderConfig {
    /// Defaults for everything except the credential
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: DEFAULT_VISION_MODEL.to_string(),
            instruction: DEFAULT_VISION_INSTRUCTION.to_string(),
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Relay service (`/analyze`) configuration
#[derive(Debug, Clone)]
pub struct RelayServiceConfig {
    pub bind: SocketAddr,
    /// When set and non-empty, requests must carry a matching `X-Api-Key`
    pub shared_secret: Option<String>,
    /// Largest accepted image body
    pub max_body_bytes: usize,
    pub provider: ProviderConfig,
}

impl RelayServiceConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_key = lookup("OPENAI_API_KEY")
            .filter(|key| !key.is_empty())
            .context("OPENAI_API_KEY environment variable is required to run the relay")?;

        let mut provider = ProviderConfig::with_api_key(api_key);
        if let Some(base_url) = lookup("VERI_OPENAI_BASE_URL") {
            provider.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Some(model) = lookup("VERI_VISION_MODEL") {
            provider.model = model;
        }
        if let Some(prompt) = lookup("VERI_VISION_PROMPT") {
            provider.instruction = prompt;
        }
        provider.max_output_tokens = parse_or(&lookup, "VERI_MAX_OUTPUT_TOKENS", DEFAULT_MAX_OUTPUT_TOKENS);

        let bind = match lookup("VERI_BIND") {
            Some(bind) => bind
                .parse()
                .with_context(|| format!("Invalid VERI_BIND address: {}", bind))?,
            None => default_bind(DEFAULT_SERVICE_PORT),
        };

        Ok(Self {
            bind,
            shared_secret: lookup("VERI_SHARED_SECRET").filter(|s| !s.is_empty()),
            max_body_bytes: parse_or(&lookup, "VERI_MAX_BODY_BYTES", DEFAULT_MAX_BODY_BYTES),
            provider,
        })
    }
}

/// Inference service (`/infer`) configuration
#[derive(Debug, Clone)]
pub struct InferConfig {
    pub bind: SocketAddr,
    /// Weights handed to the detector process
    pub model_path: PathBuf,
    /// Detector executable
    pub classifier_command: String,
    /// Detections below this confidence are dropped
    pub confidence_threshold: f64,
}

impl InferConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let port: u16 = parse_or(&lookup, "VERI_PORT", DEFAULT_SERVICE_PORT);

        let confidence_threshold = lookup("VERI_CONFIDENCE_THRESHOLD")
            .and_then(|s| s.parse::<f64>().ok())
            .filter(|t| (0.0..=1.0).contains(t))
            .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD);

        Ok(Self {
            bind: default_bind(port),
            model_path: lookup("VERI_MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("yolov8n.pt")),
            classifier_command: lookup("VERI_CLASSIFIER_CMD")
                .unwrap_or_else(|| "veri-detect".to_string()),
            confidence_threshold,
        })
    }
}

fn default_bind(port: u16) -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, port))
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    lookup(key)
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}
