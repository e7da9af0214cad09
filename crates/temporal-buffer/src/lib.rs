//! Temporal Buffer
//!
//! Provides the bounded FIFO window of preprocessed face samples that
//! sequence-aware classifiers consume as a single stacked tensor.

mod buffer;

pub use buffer::{TemporalBuffer, DEFAULT_SEQUENCE_LENGTH};

use thiserror::Error;

/// Errors raised by the temporal buffer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BufferError {
    #[error("Buffer capacity must be at least 1")]
    ZeroCapacity,
    #[error("Sample shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: [usize; 3],
        actual: [usize; 3],
    },
    #[error("Buffer not ready: {len}/{capacity} samples")]
    NotReady { len: usize, capacity: usize },
    #[error("Failed to stack samples: {0}")]
    Stack(String),
}
