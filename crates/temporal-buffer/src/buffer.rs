//! Bounded FIFO window implementation

use std::collections::VecDeque;

use ndarray::{Array3, Array5, ArrayView3, Axis};
use tracing::debug;

use crate::BufferError;

/// Default window length (20 frames, ~1.3s at 15fps)
pub const DEFAULT_SEQUENCE_LENGTH: usize = 20;

/// Fixed-length window of `H x W x C` samples, oldest first
#[derive(Debug, Clone)]
pub struct TemporalBuffer {
    /// Buffered samples
    samples: VecDeque<Array3<f32>>,
    /// Window length N
    capacity: usize,
    /// Total samples pushed (for statistics)
    total_pushed: usize,
}

impl TemporalBuffer {
    /// Create a new buffer holding at most `capacity` samples
    pub fn new(capacity: usize) -> Result<Self, BufferError> {
        if capacity == 0 {
            return Err(BufferError::ZeroCapacity);
        }
        Ok(Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            total_pushed: 0,
        })
    }

    /// Append a sample, evicting the oldest once the window is saturated.
    ///
    /// Every sample must share the shape of the samples already buffered.
    pub fn push(&mut self, sample: Array3<f32>) -> Result<(), BufferError> {
        if let Some(front) = self.samples.front() {
            let expected = shape_of(front);
            let actual = shape_of(&sample);
            if expected != actual {
                return Err(BufferError::ShapeMismatch { expected, actual });
            }
        }

        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
        self.total_pushed += 1;
        Ok(())
    }

    /// Drop every buffered sample
    pub fn clear(&mut self) {
        if !self.samples.is_empty() {
            debug!("Clearing temporal buffer ({} samples)", self.samples.len());
        }
        self.samples.clear();
    }

    /// True once exactly `capacity` samples are buffered
    pub fn is_ready(&self) -> bool {
        self.samples.len() == self.capacity
    }

    /// Stack the window as `(1, N, H, W, C)` without consuming it
    pub fn snapshot(&self) -> Result<Array5<f32>, BufferError> {
        if !self.is_ready() {
            return Err(BufferError::NotReady {
                len: self.samples.len(),
                capacity: self.capacity,
            });
        }

        let views: Vec<ArrayView3<'_, f32>> = self.samples.iter().map(|s| s.view()).collect();
        let stacked = ndarray::stack(Axis(0), &views)
            .map_err(|e| BufferError::Stack(e.to_string()))?;
        Ok(stacked.insert_axis(Axis(0)))
    }

    /// Get the number of samples currently buffered
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Get the window length
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get fill ratio (0.0 to 1.0)
    pub fn fill_ratio(&self) -> f64 {
        self.samples.len() as f64 / self.capacity as f64
    }

    /// Get total samples pushed (for statistics)
    pub fn total_pushed(&self) -> usize {
        self.total_pushed
    }
}

fn shape_of(sample: &Array3<f32>) -> [usize; 3] {
    let (h, w, c) = sample.dim();
    [h, w, c]
}
