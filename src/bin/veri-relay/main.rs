//! Veri Relay Binary
//!
//! Accepts JPEG frames from cameras on `POST /analyze` and answers with a
//! description from the vision provider.
//!
//! ## Usage
//!
//! ```bash
//! export OPENAI_API_KEY=sk-...
//! export VERI_SHARED_SECRET=change-me   # optional, enables X-Api-Key checks
//! veri-relay
//! ```

use anyhow::Result;
use tracing::{info, warn};
use veri_cam::server::{relay, OpenAiProvider};
use veri_cam::RelayServiceConfig;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("veri_cam=info".parse()?),
        )
        .init();

    let config = RelayServiceConfig::from_env()?;

    info!("Veri Relay starting");
    info!("  Bind: {}", config.bind);
    info!("  Model: {}", config.provider.model);
    if config.shared_secret.is_none() {
        warn!("VERI_SHARED_SECRET not set, /analyze accepts unauthenticated requests");
    }

    let provider = OpenAiProvider::new(config.provider.clone())?;

    tokio::select! {
        result = relay::serve(config, provider) => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutting down..."),
    }
    Ok(())
}
