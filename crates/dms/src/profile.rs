//! Classifier profiles
//!
//! A profile bundles every constant that must agree with the trained
//! model: input size, channel order, normalization, window length,
//! threshold, persistence, and polarity.

use alerting::{AlertConfig, Polarity};
use inference_engine::{ChannelOrder, InputContract, InputLayout, Normalization};
use serde::{Deserialize, Serialize};
use temporal_buffer::DEFAULT_SEQUENCE_LENGTH;
use tracing::info;

use crate::DmsError;

/// Built-in classifier variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProfileKind {
    /// 64x64 BGR face crops, 20-frame window, high output means fatigue
    SequenceCnn,
    /// 224x224 RGB single frames, low output means fatigue
    MobilenetV2,
}

/// Immutable classifier configuration, validated once at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierProfile {
    pub name: String,
    pub contract: InputContract,
    pub alert: AlertConfig,
}

impl ClassifierProfile {
    /// Sequence CNN over a window of face crops
    pub fn sequence_cnn() -> Self {
        Self {
            name: "sequence-cnn".to_string(),
            contract: InputContract {
                width: 64,
                height: 64,
                channel_order: ChannelOrder::Bgr,
                normalization: Normalization::UnitScale,
                layout: InputLayout::Sequence {
                    length: DEFAULT_SEQUENCE_LENGTH,
                },
            },
            alert: AlertConfig {
                threshold: 0.5,
                trigger_frames: 5,
                polarity: Polarity::HighMeansFatigue,
                confidence_decimals: 1,
            },
        }
    }

    /// MobileNetV2 single-frame classifier
    pub fn mobilenet_v2() -> Self {
        Self {
            name: "mobilenet-v2".to_string(),
            contract: InputContract {
                width: 224,
                height: 224,
                channel_order: ChannelOrder::Rgb,
                normalization: Normalization::SymmetricUnit,
                layout: InputLayout::Single,
            },
            alert: AlertConfig {
                threshold: 0.5,
                trigger_frames: 10,
                polarity: Polarity::LowMeansFatigue,
                confidence_decimals: 0,
            },
        }
    }

    pub fn from_kind(kind: ProfileKind) -> Self {
        match kind {
            ProfileKind::SequenceCnn => Self::sequence_cnn(),
            ProfileKind::MobilenetV2 => Self::mobilenet_v2(),
        }
    }

    /// Apply optional threshold / persistence overrides and re-validate
    pub fn with_overrides(mut self, threshold: Option<f32>, trigger_frames: Option<u32>) -> Result<Self, DmsError> {
        if let Some(threshold) = threshold {
            self.alert.threshold = threshold;
        }
        if let Some(trigger_frames) = trigger_frames {
            self.alert.trigger_frames = trigger_frames;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), DmsError> {
        self.contract.validate()?;
        self.alert.validate()?;
        Ok(())
    }

    /// Whether this profile feeds a window of frames
    pub fn is_sequence(&self) -> bool {
        self.contract.sequence_length().is_some()
    }

    pub fn log_summary(&self) {
        info!(
            "Classifier profile {}: {}x{} {:?} {:?} {:?}, threshold={}, trigger_frames={}, polarity={:?}",
            self.name,
            self.contract.width,
            self.contract.height,
            self.contract.channel_order,
            self.contract.normalization,
            self.contract.layout,
            self.alert.threshold,
            self.alert.trigger_frames,
            self.alert.polarity
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_are_valid() {
        assert!(ClassifierProfile::sequence_cnn().validate().is_ok());
        assert!(ClassifierProfile::mobilenet_v2().validate().is_ok());
    }

    #[test]
    fn test_preset_layouts() {
        let seq = ClassifierProfile::from_kind(ProfileKind::SequenceCnn);
        assert!(seq.is_sequence());
        assert_eq!(seq.contract.input_shape(), vec![1, 20, 64, 64, 3]);

        let mobile = ClassifierProfile::from_kind(ProfileKind::MobilenetV2);
        assert!(!mobile.is_sequence());
        assert_eq!(mobile.contract.input_shape(), vec![1, 224, 224, 3]);
        assert_eq!(mobile.alert.polarity, Polarity::LowMeansFatigue);
    }

    #[test]
    fn test_overrides_revalidated() {
        let profile = ClassifierProfile::sequence_cnn()
            .with_overrides(Some(0.7), Some(3))
            .unwrap();
        assert_eq!(profile.alert.threshold, 0.7);
        assert_eq!(profile.alert.trigger_frames, 3);

        assert!(ClassifierProfile::sequence_cnn().with_overrides(None, Some(0)).is_err());
        assert!(ClassifierProfile::mobilenet_v2().with_overrides(Some(1.2), None).is_err());
    }

    #[test]
    fn test_preset_display_text() {
        let mut seq = alerting::AlertStateMachine::new(ClassifierProfile::sequence_cnn().alert);
        assert_eq!(seq.observe(0.3).text, "AWAKE (70.0%)");
        assert_eq!(seq.observe(0.8).text, "WARNING... (1/5)");

        let mut mobile = alerting::AlertStateMachine::new(ClassifierProfile::mobilenet_v2().alert);
        assert_eq!(mobile.observe(0.8).text, "AWAKE (80%)");
        assert_eq!(mobile.observe(0.2).text, "WARNING... (1/10)");
    }
}
