//! Alert configuration

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which end of the probability range a classifier uses for "fatigued"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    /// p > threshold means fatigue
    HighMeansFatigue,
    /// p < threshold means fatigue
    LowMeansFatigue,
}

/// Invalid alert configuration
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AlertConfigError {
    #[error("threshold {0} must lie strictly between 0 and 1")]
    Threshold(f32),
    #[error("trigger_frames must be at least 1")]
    TriggerFrames,
}

/// Alert configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Probability cut-off (default: 0.5)
    pub threshold: f32,
    /// Consecutive fatigue frames before escalating to alarm
    pub trigger_frames: u32,
    /// Sign convention of the classifier output
    pub polarity: Polarity,
    /// Decimal places for displayed percentages
    pub confidence_decimals: usize,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            trigger_frames: 5,
            polarity: Polarity::HighMeansFatigue,
            confidence_decimals: 1,
        }
    }
}

impl AlertConfig {
    /// Reject configurations the state machine cannot honor
    pub fn validate(&self) -> Result<(), AlertConfigError> {
        if !(self.threshold > 0.0 && self.threshold < 1.0) {
            return Err(AlertConfigError::Threshold(self.threshold));
        }
        if self.trigger_frames == 0 {
            return Err(AlertConfigError::TriggerFrames);
        }
        Ok(())
    }

    /// Whether `p` falls on the fatigue side of the threshold
    pub fn indicates_fatigue(&self, p: f32) -> bool {
        match self.polarity {
            Polarity::HighMeansFatigue => p > self.threshold,
            Polarity::LowMeansFatigue => p < self.threshold,
        }
    }

    /// Probability of fatigue implied by `p` under this polarity
    pub fn fatigue_score(&self, p: f32) -> f32 {
        match self.polarity {
            Polarity::HighMeansFatigue => p,
            Polarity::LowMeansFatigue => 1.0 - p,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polarity_high() {
        let config = AlertConfig::default();
        assert!(config.indicates_fatigue(0.9));
        assert!(!config.indicates_fatigue(0.2));
        assert!(!config.indicates_fatigue(0.5));
        assert_eq!(config.fatigue_score(0.9), 0.9);
    }

    #[test]
    fn test_polarity_low() {
        let config = AlertConfig {
            polarity: Polarity::LowMeansFatigue,
            ..Default::default()
        };
        assert!(config.indicates_fatigue(0.1));
        assert!(!config.indicates_fatigue(0.8));
        assert!(!config.indicates_fatigue(0.5));
        assert!((config.fatigue_score(0.1) - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_validate() {
        assert!(AlertConfig::default().validate().is_ok());

        let bad_threshold = AlertConfig { threshold: 1.0, ..Default::default() };
        assert_eq!(bad_threshold.validate(), Err(AlertConfigError::Threshold(1.0)));

        let nan = AlertConfig { threshold: f32::NAN, ..Default::default() };
        assert!(nan.validate().is_err());

        let no_trigger = AlertConfig { trigger_frames: 0, ..Default::default() };
        assert_eq!(no_trigger.validate(), Err(AlertConfigError::TriggerFrames));
    }
}
