//! Fatigue persistence state machine

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::AlertConfig;
use crate::display::{AlertDisplay, DisplayColor, Overlay};

/// Alert level shown to the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    #[default]
    Awake,
    Warning,
    Alarm,
}

impl AlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Awake => "awake",
            AlertLevel::Warning => "warning",
            AlertLevel::Alarm => "alarm",
        }
    }
}

/// Session alert state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AlertState {
    pub level: AlertLevel,
    /// Consecutive classifier outputs on the fatigue side of the threshold
    pub fatigue_run_length: u32,
}

/// Converts a probability stream into awake / warning / alarm
#[derive(Debug, Clone)]
pub struct AlertStateMachine {
    config: AlertConfig,
    state: AlertState,
}

impl AlertStateMachine {
    /// Create a state machine starting at `Awake` with an empty run
    pub fn new(config: AlertConfig) -> Self {
        info!(
            "Creating alert state machine: threshold={}, trigger_frames={}, polarity={:?}",
            config.threshold, config.trigger_frames, config.polarity
        );
        Self {
            config,
            state: AlertState::default(),
        }
    }

    /// Feed one classifier output in [0, 1]
    pub fn observe(&mut self, p: f32) -> AlertDisplay {
        let previous = self.state.level;
        let decimals = self.config.confidence_decimals;
        let score = self.config.fatigue_score(p).clamp(0.0, 1.0);

        let (text, color, confidence) = if self.config.indicates_fatigue(p) {
            self.state.fatigue_run_length = self.state.fatigue_run_length.saturating_add(1);
            let run = self.state.fatigue_run_length;

            if run >= self.config.trigger_frames {
                self.state.level = AlertLevel::Alarm;
                let pct = score * 100.0;
                (format!("ALARM: FATIGUE ({:.*}%)", decimals, pct), DisplayColor::ALARM, pct)
            } else {
                self.state.level = AlertLevel::Warning;
                (
                    format!("WARNING... ({}/{})", run, self.config.trigger_frames),
                    DisplayColor::WARNING,
                    score * 100.0,
                )
            }
        } else {
            self.state.fatigue_run_length = 0;
            self.state.level = AlertLevel::Awake;
            let pct = (1.0 - score) * 100.0;
            (format!("AWAKE ({:.*}%)", decimals, pct), DisplayColor::AWAKE, pct)
        };

        if self.state.level != previous {
            match self.state.level {
                AlertLevel::Alarm => warn!("Fatigue alarm raised (p={:.3}, run={})", p, self.state.fatigue_run_length),
                AlertLevel::Warning => info!("Fatigue warning (p={:.3})", p),
                AlertLevel::Awake => info!("Subject awake again (p={:.3})", p),
            }
        } else {
            debug!("{} (p={:.3}, run={})", text, p, self.state.fatigue_run_length);
        }

        AlertDisplay {
            level: self.state.level,
            text,
            color,
            run_length: self.state.fatigue_run_length,
            trigger_frames: self.config.trigger_frames,
            confidence,
        }
    }

    /// Overlay for a frame whose classifier invocation failed.
    ///
    /// The run length is left exactly as it was.
    pub fn observe_failure(&self, reason: &str) -> Overlay {
        warn!(
            "Classifier failure, keeping run length {}: {}",
            self.state.fatigue_run_length, reason
        );
        Overlay::error()
    }

    /// Current state
    pub fn state(&self) -> AlertState {
        self.state
    }

    /// Active configuration
    pub fn config(&self) -> &AlertConfig {
        &self.config
    }

    /// Back to `Awake` with an empty run (driver change)
    pub fn reset(&mut self) {
        self.state = AlertState::default();
    }
}
