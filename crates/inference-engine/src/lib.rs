//! Fatigue Classifier Inference
//!
//! Provides the preprocessing contract shared with the trained model and
//! the classifier adapters:
//! - `InputContract`: size, channel order, normalization, and layout
//! - `Preprocessor`: face crop to normalized `H x W x C` tensor
//! - `TractClassifier`: ONNX inference using tract
//! - `MockClassifier`: constant or scripted outputs for development

mod contract;
mod engine;
mod preprocess;

pub use contract::{ChannelOrder, InputContract, InputLayout, Normalization};
pub use engine::{checked_probability, Classifier, MockClassifier, TractClassifier};
pub use preprocess::{CropRegion, PreparedInput, PreprocessedSample, Preprocessor};

use thiserror::Error;

/// Errors during preprocessing and inference
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InferenceError {
    #[error("Model load failed: {0}")]
    ModelLoadError(String),
    #[error("Inference failed: {0}")]
    InferenceFailed(String),
    #[error("Invalid input shape: expected {expected}, got {actual}")]
    InvalidInputShape { expected: String, actual: String },
    #[error("Classifier output {0} is not a probability")]
    InvalidOutput(f32),
    #[error("Preprocessing failed: {0}")]
    Preprocess(String),
    #[error("Invalid input contract: {0}")]
    InvalidContract(String),
}
