//! Face crop preprocessing

use camera_capture::VideoFrame;
use ndarray::{Array3, Array4, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::contract::{ChannelOrder, InputContract};
use crate::InferenceError;

/// One normalized `H x W x C` sample
pub type PreprocessedSample = Array3<f32>;

/// Region of a frame to feed the classifier, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropRegion {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl CropRegion {
    /// The whole frame
    pub fn full(frame: &VideoFrame) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: frame.width as f32,
            height: frame.height as f32,
        }
    }

    /// Round and clamp to the frame bounds, `None` if nothing is left
    pub fn clamp_to(&self, frame_width: u32, frame_height: u32) -> Option<(u32, u32, u32, u32)> {
        if ![self.x, self.y, self.width, self.height].iter().all(|v| v.is_finite()) {
            return None;
        }
        let x0 = self.x.round().clamp(0.0, frame_width as f32) as u32;
        let y0 = self.y.round().clamp(0.0, frame_height as f32) as u32;
        let x1 = (self.x + self.width).round().clamp(0.0, frame_width as f32) as u32;
        let y1 = (self.y + self.height).round().clamp(0.0, frame_height as f32) as u32;

        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some((x0, y0, x1 - x0, y1 - y0))
    }
}

/// Classifier-ready sample plus the resized crop for debug display
#[derive(Debug, Clone)]
pub struct PreparedInput {
    pub sample: PreprocessedSample,
    pub preview: VideoFrame,
}

/// Stateless crop, resize, and normalize step
#[derive(Debug, Clone)]
pub struct Preprocessor {
    contract: InputContract,
}

impl Preprocessor {
    pub fn new(contract: InputContract) -> Result<Self, InferenceError> {
        contract.validate()?;
        Ok(Self { contract })
    }

    pub fn contract(&self) -> &InputContract {
        &self.contract
    }

    /// Crop `region` out of `frame` and map it onto the input contract
    pub fn prepare(&self, frame: &VideoFrame, region: CropRegion) -> Result<PreparedInput, InferenceError> {
        if !frame.is_consistent() {
            return Err(InferenceError::Preprocess(format!(
                "frame buffer of {} bytes does not match {}x{}",
                frame.data.len(),
                frame.width,
                frame.height
            )));
        }

        let (x, y, w, h) = region
            .clamp_to(frame.width, frame.height)
            .ok_or_else(|| InferenceError::Preprocess(format!("degenerate crop {:?}", region)))?;

        let crop = frame
            .crop(x, y, w, h)
            .ok_or_else(|| InferenceError::Preprocess(format!("crop {}x{}+{}+{} out of bounds", w, h, x, y)))?;
        let resized = crop
            .resize(self.contract.width, self.contract.height)
            .ok_or_else(|| InferenceError::Preprocess("resize failed".into()))?;

        let sample = self.normalize(&resized);
        debug!("Prepared {}x{} crop at ({}, {})", w, h, x, y);

        Ok(PreparedInput {
            sample,
            preview: resized,
        })
    }

    /// Add the leading batch axis for single-frame classifiers
    pub fn batch_single(sample: PreprocessedSample) -> Array4<f32> {
        sample.insert_axis(Axis(0))
    }

    fn normalize(&self, resized: &VideoFrame) -> PreprocessedSample {
        let width = resized.width as usize;
        let height = resized.height as usize;
        let order = self.contract.channel_order;
        let normalization = self.contract.normalization;
        let data = &resized.data;

        Array3::from_shape_fn((height, width, 3), |(row, col, c)| {
            let src_channel = match order {
                ChannelOrder::Rgb => c,
                ChannelOrder::Bgr => 2 - c,
            };
            let value = data[(row * width + col) * 3 + src_channel];
            normalization.apply(c, value)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{InputLayout, Normalization};
    use proptest::prelude::*;

    fn contract(order: ChannelOrder, normalization: Normalization) -> InputContract {
        InputContract {
            width: 8,
            height: 8,
            channel_order: order,
            normalization,
            layout: InputLayout::Single,
        }
    }

    #[test]
    fn test_prepare_shape_and_range() {
        let pre = Preprocessor::new(contract(ChannelOrder::Rgb, Normalization::UnitScale)).unwrap();
        let frame = VideoFrame::filled(40, 30, [255, 0, 51]);

        let prepared = pre
            .prepare(&frame, CropRegion { x: 5.0, y: 5.0, width: 20.0, height: 20.0 })
            .unwrap();

        assert_eq!(prepared.sample.dim(), (8, 8, 3));
        assert_eq!((prepared.preview.width, prepared.preview.height), (8, 8));
        assert!((prepared.sample[[0, 0, 0]] - 1.0).abs() < 1e-6);
        assert!(prepared.sample[[0, 0, 1]].abs() < 1e-6);
        assert!((prepared.sample[[7, 7, 2]] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_bgr_order_swaps_channels() {
        let pre = Preprocessor::new(contract(ChannelOrder::Bgr, Normalization::SymmetricUnit)).unwrap();
        let frame = VideoFrame::filled(16, 16, [255, 0, 0]);

        let prepared = pre.prepare(&frame, CropRegion::full(&frame)).unwrap();

        // Red lands in the last channel
        assert!((prepared.sample[[3, 3, 0]] + 1.0).abs() < 1e-6);
        assert!((prepared.sample[[3, 3, 2]] - 1.0).abs() < 1e-6);
        // Preview keeps display order
        assert_eq!(prepared.preview.get_pixel(0, 0), Some([255, 0, 0]));
    }

    #[test]
    fn test_region_clamped_to_frame() {
        let pre = Preprocessor::new(contract(ChannelOrder::Rgb, Normalization::UnitScale)).unwrap();
        let frame = VideoFrame::filled(20, 20, [10, 10, 10]);

        let region = CropRegion { x: -5.0, y: 15.0, width: 15.0, height: 30.0 };
        assert_eq!(region.clamp_to(20, 20), Some((0, 15, 10, 5)));
        assert!(pre.prepare(&frame, region).is_ok());
    }

    #[test]
    fn test_degenerate_crop_fails() {
        let pre = Preprocessor::new(contract(ChannelOrder::Rgb, Normalization::UnitScale)).unwrap();
        let frame = VideoFrame::filled(20, 20, [10, 10, 10]);

        let zero = CropRegion { x: 4.0, y: 4.0, width: 0.0, height: 10.0 };
        assert!(matches!(pre.prepare(&frame, zero), Err(InferenceError::Preprocess(_))));

        let outside = CropRegion { x: 30.0, y: 30.0, width: 10.0, height: 10.0 };
        assert!(matches!(pre.prepare(&frame, outside), Err(InferenceError::Preprocess(_))));

        let nan = CropRegion { x: f32::NAN, y: 0.0, width: 10.0, height: 10.0 };
        assert!(pre.prepare(&frame, nan).is_err());
    }

    #[test]
    fn test_inconsistent_frame_fails() {
        let pre = Preprocessor::new(contract(ChannelOrder::Rgb, Normalization::UnitScale)).unwrap();
        let frame = VideoFrame::new(vec![0; 10], 20, 20, 0, 0);
        assert!(pre.prepare(&frame, CropRegion::full(&frame)).is_err());
    }

    #[test]
    fn test_batch_single_adds_axis() {
        let batched = Preprocessor::batch_single(Array3::zeros((8, 8, 3)));
        assert_eq!(batched.shape(), &[1, 8, 8, 3]);
    }

    proptest! {
        #[test]
        fn prop_clamped_region_inside_frame(
            x in -100.0f32..300.0,
            y in -100.0f32..300.0,
            width in -50.0f32..400.0,
            height in -50.0f32..400.0,
        ) {
            let region = CropRegion { x, y, width, height };
            if let Some((cx, cy, cw, ch)) = region.clamp_to(160, 120) {
                prop_assert!(cw > 0 && ch > 0);
                prop_assert!(cx + cw <= 160);
                prop_assert!(cy + ch <= 120);
            }
        }
    }
}
