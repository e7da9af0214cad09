//! Operator-facing text and colors

use serde::{Deserialize, Serialize};

use crate::machine::AlertLevel;

/// RGB overlay color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl DisplayColor {
    pub const AWAKE: Self = Self::rgb(0, 255, 0);
    pub const WARNING: Self = Self::rgb(255, 165, 0);
    pub const ALARM: Self = Self::rgb(255, 0, 0);
    /// Errors and missing subject
    pub const NOTICE: Self = Self::rgb(255, 255, 0);
    pub const BUFFERING: Self = Self::rgb(0, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_array(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

/// Text plus color rendered for one frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Overlay {
    pub text: String,
    pub color: DisplayColor,
}

impl Overlay {
    pub fn new(text: impl Into<String>, color: DisplayColor) -> Self {
        Self {
            text: text.into(),
            color,
        }
    }

    pub fn no_subject() -> Self {
        Self::new("NO FACE DETECTED", DisplayColor::NOTICE)
    }

    /// Face missing for longer than the configured number of frames
    pub fn face_not_visible() -> Self {
        Self::new("FACE NOT VISIBLE", DisplayColor::NOTICE)
    }

    pub fn buffering(filled: usize, capacity: usize) -> Self {
        Self::new(format!("BUFFERING... ({}/{})", filled, capacity), DisplayColor::BUFFERING)
    }

    pub fn error() -> Self {
        Self::new("ERROR", DisplayColor::NOTICE)
    }
}

/// Result of feeding one probability into the state machine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertDisplay {
    pub level: AlertLevel,
    pub text: String,
    pub color: DisplayColor,
    /// Consecutive fatigue frames after this update
    pub run_length: u32,
    pub trigger_frames: u32,
    /// Displayed confidence in percent for the reported level
    pub confidence: f32,
}

impl AlertDisplay {
    /// Fraction of the way to an alarm (1.0 once reached)
    pub fn progress(&self) -> f32 {
        (self.run_length as f32 / self.trigger_frames.max(1) as f32).min(1.0)
    }

    pub fn overlay(&self) -> Overlay {
        Overlay::new(self.text.clone(), self.color)
    }
}
