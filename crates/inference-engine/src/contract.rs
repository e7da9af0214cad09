//! Classifier input contract

use serde::{Deserialize, Serialize};

use crate::InferenceError;

/// How 8-bit channel values are mapped to model inputs
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Normalization {
    /// v / 255, into [0, 1]
    UnitScale,
    /// v / 127.5 - 1, into [-1, 1] (MobileNetV2 convention)
    SymmetricUnit,
    /// (v / 255 - mean[c]) / std[c], in output channel order
    MeanStd { mean: [f32; 3], std: [f32; 3] },
}

impl Normalization {
    /// Normalize one channel value
    #[inline]
    pub fn apply(&self, channel: usize, value: u8) -> f32 {
        let v = value as f32;
        match self {
            Normalization::UnitScale => v / 255.0,
            Normalization::SymmetricUnit => v / 127.5 - 1.0,
            Normalization::MeanStd { mean, std } => (v / 255.0 - mean[channel]) / std[channel],
        }
    }
}

/// Channel order the model was trained on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelOrder {
    Rgb,
    Bgr,
}

/// Whether the model sees one frame or a window of frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InputLayout {
    /// `(1, H, W, C)`
    Single,
    /// `(1, N, H, W, C)`
    Sequence { length: usize },
}

/// Everything the preprocessor and classifier must agree on
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InputContract {
    pub width: u32,
    pub height: u32,
    pub channel_order: ChannelOrder,
    pub normalization: Normalization,
    pub layout: InputLayout,
}

impl InputContract {
    /// Shape of one preprocessed sample, `[H, W, C]`
    pub fn sample_shape(&self) -> [usize; 3] {
        [self.height as usize, self.width as usize, 3]
    }

    /// Full classifier input shape including the batch axis
    pub fn input_shape(&self) -> Vec<usize> {
        let [h, w, c] = self.sample_shape();
        match self.layout {
            InputLayout::Single => vec![1, h, w, c],
            InputLayout::Sequence { length } => vec![1, length, h, w, c],
        }
    }

    /// Window length for sequence classifiers
    pub fn sequence_length(&self) -> Option<usize> {
        match self.layout {
            InputLayout::Single => None,
            InputLayout::Sequence { length } => Some(length),
        }
    }

    pub fn validate(&self) -> Result<(), InferenceError> {
        if self.width == 0 || self.height == 0 {
            return Err(InferenceError::InvalidContract(format!(
                "input size {}x{} must be non-zero",
                self.width, self.height
            )));
        }
        if let InputLayout::Sequence { length: 0 } = self.layout {
            return Err(InferenceError::InvalidContract("sequence length must be at least 1".into()));
        }
        if let Normalization::MeanStd { std, .. } = self.normalization {
            if std.iter().any(|s| !s.is_finite() || *s == 0.0) {
                return Err(InferenceError::InvalidContract(format!(
                    "standard deviations {:?} must be finite and non-zero",
                    std
                )));
            }
        }
        Ok(())
    }
}
