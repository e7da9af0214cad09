//! Driver Monitoring System (DMS)
//!
//! Real-time fatigue monitoring from a cabin camera:
//! - Face localization (pluggable locators)
//! - Face crop preprocessing per classifier profile
//! - Temporal windowing for sequence classifiers
//! - Consecutive-frame alert escalation (awake / warning / alarm)
//! - Interactive monitoring loop with pluggable sinks

pub mod config;
pub mod locator;
pub mod logging;
pub mod monitor;
pub mod profile;
pub mod session;
pub mod sink;

pub use config::{load_layered, ClassifierSettings, LocatorKind, LocatorSettings, MonitorConfig, ENV_PREFIX};
pub use locator::{select_primary, FaceBox, FaceLocator, FixedRegionLocator, FullFrameLocator, LuminanceGate};
pub use logging::{init_logging, init_metrics_exporter, LoggingSettings};
pub use monitor::{run_monitor, MonitorSummary};
pub use profile::{ClassifierProfile, ProfileKind};
pub use session::{FatigueSession, FrameOutcome, FrameReport, DEFAULT_ABSENT_ALERT_FRAMES};
pub use sink::{AlertSink, OverlaySink, SinkChain, TracingSink};

use thiserror::Error;

/// DMS error types
#[derive(Error, Debug)]
pub enum DmsError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid alert settings: {0}")]
    Alert(#[from] alerting::AlertConfigError),

    #[error(transparent)]
    Inference(#[from] inference_engine::InferenceError),

    #[error(transparent)]
    Buffer(#[from] temporal_buffer::BufferError),

    #[error(transparent)]
    Camera(#[from] camera_capture::CameraError),

    #[error("Sink failed: {0}")]
    Sink(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<::config::ConfigError> for DmsError {
    fn from(e: ::config::ConfigError) -> Self {
        DmsError::Config(e.to_string())
    }
}
