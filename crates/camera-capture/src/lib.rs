//! Camera Capture Library for the Fatigue Monitor
//!
//! Provides the RGB frame type shared by every stage of the pipeline,
//! plus the acquisition side of the loop:
//! - Still image decoding (JPEG/PNG/BMP) for the prediction service
//! - Image-sequence sources for replaying recorded cabin footage

pub mod frame;
pub mod source;

pub use frame::{decode_still, VideoFrame};
pub use source::{FrameSource, ImageSequenceSource};

use thiserror::Error;

/// Camera error types
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Failed to open source: {0}")]
    Open(String),

    /// One frame could not be read; the source itself is still usable
    #[error("Unreadable frame: {0}")]
    Frame(String),

    #[error("Decode failed: {0}")]
    Decode(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<image::ImageError> for CameraError {
    fn from(e: image::ImageError) -> Self {
        CameraError::Decode(e.to_string())
    }
}
