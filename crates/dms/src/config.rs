//! DMS configuration
//!
//! Every binary reads an optional file (TOML, YAML or JSON, picked by
//! extension) and then `FATIGUE__*` environment variables, e.g.
//! `FATIGUE__CLASSIFIER__MODEL_PATH=/models/fatigue.onnx`.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use alerting::Polarity;
use inference_engine::{Classifier, MockClassifier, TractClassifier};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::locator::{FaceLocator, FixedRegionLocator, FullFrameLocator, LuminanceGate};
use crate::logging::LoggingSettings;
use crate::profile::{ClassifierProfile, ProfileKind};
use crate::session::DEFAULT_ABSENT_ALERT_FRAMES;
use crate::DmsError;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "FATIGUE";

/// Load `T` from an optional file overlaid with the environment
pub fn load_layered<T: DeserializeOwned>(path: Option<&Path>) -> Result<T, DmsError> {
    let mut builder = ::config::Config::builder();
    if let Some(path) = path {
        info!("Loading configuration from {}", path.display());
        builder = builder.add_source(::config::File::from(path).required(true));
    }
    let settings = builder
        .add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()?;
    Ok(settings.try_deserialize()?)
}

/// Classifier section shared by the monitor and the service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierSettings {
    /// Built-in profile; each binary has its own default
    pub profile: Option<ProfileKind>,
    /// ONNX model; without one a mock classifier is used
    pub model_path: Option<String>,
    /// Constant output of the mock classifier
    pub mock_probability: Option<f32>,
    pub threshold: Option<f32>,
    pub trigger_frames: Option<u32>,
}

impl ClassifierSettings {
    /// Resolve the validated profile
    pub fn profile(&self, fallback: ProfileKind) -> Result<ClassifierProfile, DmsError> {
        ClassifierProfile::from_kind(self.profile.unwrap_or(fallback)).with_overrides(self.threshold, self.trigger_frames)
    }

    /// Load the model for `profile`, or a mock when no path is set
    pub fn build_classifier(&self, profile: &ClassifierProfile) -> Result<Arc<dyn Classifier>, DmsError> {
        match &self.model_path {
            Some(path) => {
                let model = TractClassifier::load(path, &profile.contract)?;
                Ok(Arc::new(model))
            }
            None => {
                // Awake side of the threshold unless told otherwise
                let p = self.mock_probability.unwrap_or(match profile.alert.polarity {
                    Polarity::HighMeansFatigue => 0.1,
                    Polarity::LowMeansFatigue => 0.9,
                });
                warn!("No model_path configured, using mock classifier (p={})", p);
                Ok(Arc::new(MockClassifier::constant(p).expecting(&profile.contract)))
            }
        }
    }
}

/// Face locator variants
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocatorKind {
    /// Frames are already face crops
    #[default]
    FullFrame,
    /// Fixed fraction of the frame
    FixedRegion,
}

/// Locator section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorSettings {
    pub kind: LocatorKind,
    pub region: FixedRegionLocator,
    /// Reject candidates darker than this mean luminance
    pub min_luminance: Option<f32>,
}

impl LocatorSettings {
    pub fn build(&self) -> Box<dyn FaceLocator> {
        match (self.kind, self.min_luminance) {
            (LocatorKind::FullFrame, None) => Box::new(FullFrameLocator),
            (LocatorKind::FullFrame, Some(min)) => Box::new(LuminanceGate::new(FullFrameLocator, min)),
            (LocatorKind::FixedRegion, None) => Box::new(self.region),
            (LocatorKind::FixedRegion, Some(min)) => Box::new(LuminanceGate::new(self.region, min)),
        }
    }
}

/// Configuration of the `fatigue-monitor` binary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub classifier: ClassifierSettings,
    pub locator: LocatorSettings,
    /// Directory of recorded frames, replayed in name order
    pub frames_dir: PathBuf,
    /// Annotated frames are written here when set
    pub output_dir: Option<PathBuf>,
    /// No-face frames before "FACE NOT VISIBLE"
    pub absent_alert_frames: u32,
    pub logging: LoggingSettings,
    /// Prometheus endpoint; frame counters are only exported when set
    pub metrics_listen: Option<SocketAddr>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            classifier: ClassifierSettings::default(),
            locator: LocatorSettings::default(),
            frames_dir: PathBuf::from("frames"),
            output_dir: None,
            absent_alert_frames: DEFAULT_ABSENT_ALERT_FRAMES,
            logging: LoggingSettings::default(),
            metrics_listen: None,
        }
    }
}

impl MonitorConfig {
    /// Profile used when the configuration names none
    pub const DEFAULT_PROFILE: ProfileKind = ProfileKind::SequenceCnn;

    pub fn load(path: Option<&Path>) -> Result<Self, DmsError> {
        load_layered(path)
    }

    pub fn profile(&self) -> Result<ClassifierProfile, DmsError> {
        self.classifier.profile(Self::DEFAULT_PROFILE)
    }
}
