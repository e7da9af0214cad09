//! Fatigue Prediction Server - Main Entry Point

use std::path::PathBuf;

use anyhow::Context;
use api::{run_server, ServerConfig};
use dms::init_logging;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = ServerConfig::load(config_path.as_deref()).context("loading configuration")?;
    init_logging(&config.logging);

    info!("=== Fatigue Prediction Server v{} ===", env!("CARGO_PKG_VERSION"));

    run_server(&config).await
}
