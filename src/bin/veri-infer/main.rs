//! Veri Inference Binary
//!
//! Object detection over HTTP: `POST /infer` with a multipart JPEG returns
//! the detected labels above the confidence threshold.
//!
//! ## Usage
//!
//! ```bash
//! export VERI_MODEL_PATH=yolov8n.pt
//! export VERI_CLASSIFIER_CMD="python3 detect.py"
//! veri-infer
//! ```

use anyhow::Result;
use tracing::info;
use veri_cam::server::{infer, CommandClassifier};
use veri_cam::InferConfig;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("veri_cam=info".parse()?),
        )
        .init();

    let config = InferConfig::from_env()?;

    info!("Veri Inference starting");
    info!("  Bind: {}", config.bind);
    info!("  Model: {}", config.model_path.display());
    info!("  Detector: {}", config.classifier_command);
    info!("  Threshold: {}", config.confidence_threshold);

    let classifier =
        CommandClassifier::from_command_line(&config.classifier_command, config.model_path.clone());

    tokio::select! {
        result = infer::serve(config, classifier) => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutting down..."),
    }
    Ok(())
}
