//! Per-client rate limiting using the GCRA algorithm
//!
//! Built on tower_governor; clients are keyed by peer IP, so the service
//! must be served with `into_make_service_with_connect_info::<SocketAddr>()`.

use std::sync::Arc;

use governor::middleware::StateInformationMiddleware;
use serde::{Deserialize, Serialize};
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::key_extractor::PeerIpKeyExtractor;

use crate::error::ApiError;

/// Governor config keyed by peer IP, with X-RateLimit-* headers
pub type PeerGovernorConfig =
    tower_governor::governor::GovernorConfig<PeerIpKeyExtractor, StateInformationMiddleware>;

/// Rate limiting configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// One request is replenished every this many milliseconds
    pub replenish_ms: u64,
    /// Requests a client can make back to back
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        // A phone streaming frames at ~10fps stays under the limit
        Self {
            replenish_ms: 100,
            burst_size: 20,
        }
    }
}

impl RateLimitConfig {
    /// Sustained requests per second this config allows
    pub fn sustained_rate(&self) -> f64 {
        1000.0 / self.replenish_ms.max(1) as f64
    }
}

/// Build the governor config for `GovernorLayer`
pub fn create_governor_config(config: &RateLimitConfig) -> Result<Arc<PeerGovernorConfig>, ApiError> {
    GovernorConfigBuilder::default()
        .per_millisecond(config.replenish_ms)
        .burst_size(config.burst_size)
        .use_headers()
        .finish()
        .map(Arc::new)
        .ok_or_else(|| {
            ApiError::internal(format!(
                "invalid rate limit: replenish_ms={} burst_size={}",
                config.replenish_ms, config.burst_size
            ))
        })
}
