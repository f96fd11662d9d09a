//! Protocol constants shared by the device and the relay

/// Header carrying the shared-secret credential from device to relay
pub const API_KEY_HEADER: &str = "x-api-key";

/// Relay endpoint that accepts raw JPEG bodies
pub const ANALYZE_PATH: &str = "/analyze";

/// Detection endpoint of the inference service
pub const INFER_PATH: &str = "/infer";

/// Liveness endpoint exposed by both services
pub const HEALTH_PATH: &str = "/healthz";

/// Multipart field name carrying the image on `/infer`
pub const INFER_IMAGE_FIELD: &str = "image";

/// Default pause between capture cycles (seconds)
pub const DEFAULT_CAPTURE_INTERVAL_SECS: u64 = 12;

/// Default detection confidence threshold
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.35;

/// Default port for the relay and inference services
pub const DEFAULT_SERVICE_PORT: u16 = 8000;

/// Vision model asked for descriptions
pub const DEFAULT_VISION_MODEL: &str = "gpt-4o-mini";

/// Instruction sent alongside every image
pub const DEFAULT_VISION_INSTRUCTION: &str = "Descreva esta imagem em português.";

/// Upper bound on the provider's answer length
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 256;

/// Largest image body the relay accepts
pub const DEFAULT_MAX_BODY_BYTES: usize = 8 * 1024 * 1024;
