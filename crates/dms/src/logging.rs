//! Subscriber and metrics setup shared by the binaries

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;
use serde::{Deserialize, Serialize};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::DmsError;

/// Logging section of the configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// trace, debug, info, warn or error
    pub level: String,
    /// Emit one JSON object per line
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl LoggingSettings {
    /// Parsed level; unknown names fall back to info
    pub fn max_level(&self) -> Level {
        self.level.trim().parse().unwrap_or(Level::INFO)
    }
}

/// Install the global subscriber.
///
/// Returns false if one was already installed (tests, embedding).
pub fn init_logging(settings: &LoggingSettings) -> bool {
    let builder = FmtSubscriber::builder()
        .with_max_level(settings.max_level())
        .with_target(true);

    let installed = if settings.json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
    installed.is_ok()
}

/// Install the Prometheus recorder and serve `/metrics` on `addr`.
///
/// Without a recorder the session counters are dropped.
pub fn init_metrics_exporter(addr: SocketAddr) -> Result<(), DmsError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| DmsError::Config(format!("metrics exporter on {}: {}", addr, e)))?;
    info!("Serving metrics on http://{}/metrics", addr);
    Ok(())
}
