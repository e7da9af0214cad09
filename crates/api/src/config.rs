//! Server configuration

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use dms::{load_layered, ClassifierProfile, ClassifierSettings, DmsError, LoggingSettings, ProfileKind};
use serde::{Deserialize, Serialize};

use crate::rate_limit::RateLimitConfig;

/// Configuration of the `fatigue-server` binary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub classifier: ClassifierSettings,
    pub rate_limit: RateLimitConfig,
    pub request_timeout_secs: u64,
    /// Base64 inflates frames by a third; leave room for that
    pub max_body_bytes: usize,
    pub logging: LoggingSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5001,
            classifier: ClassifierSettings::default(),
            rate_limit: RateLimitConfig::default(),
            request_timeout_secs: 30,
            max_body_bytes: 10 * 1024 * 1024,
            logging: LoggingSettings::default(),
        }
    }
}

impl ServerConfig {
    /// Profile used when the configuration names none
    pub const DEFAULT_PROFILE: ProfileKind = ProfileKind::MobilenetV2;

    pub fn load(path: Option<&Path>) -> Result<Self, DmsError> {
        load_layered(path)
    }

    pub fn profile(&self) -> Result<ClassifierProfile, DmsError> {
        self.classifier.profile(Self::DEFAULT_PROFILE)
    }

    pub fn addr(&self) -> Result<SocketAddr, DmsError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| DmsError::Config(format!("invalid listen address {}:{}: {}", self.host, self.port, e)))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}
