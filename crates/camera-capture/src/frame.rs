//! Video frame types and processing

use image::{imageops::FilterType, RgbImage};

use crate::CameraError;

/// Decoded RGB video frame
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// RGB pixel data (width * height * 3)
    pub data: Vec<u8>,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Capture timestamp (nanoseconds)
    pub timestamp_ns: u64,
    /// Frame sequence number
    pub sequence: u32,
}

impl VideoFrame {
    /// Create a new video frame from raw RGB data
    pub fn new(data: Vec<u8>, width: u32, height: u32, timestamp_ns: u64, sequence: u32) -> Self {
        Self {
            data,
            width,
            height,
            timestamp_ns,
            sequence,
        }
    }

    /// Create a frame filled with a single color
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take((width * height * 3) as usize)
            .collect();
        Self::new(data, width, height, 0, 0)
    }

    /// Wrap an `image` buffer
    pub fn from_image(img: RgbImage, timestamp_ns: u64, sequence: u32) -> Self {
        let (width, height) = img.dimensions();
        Self::new(img.into_raw(), width, height, timestamp_ns, sequence)
    }

    /// Copy the frame into an `image` buffer.
    ///
    /// Returns `None` when the pixel buffer does not match the dimensions.
    pub fn to_image(&self) -> Option<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.data.clone())
    }

    /// Whether the buffer length agrees with `width * height * 3`
    pub fn is_consistent(&self) -> bool {
        self.data.len() == (self.width as usize) * (self.height as usize) * 3
    }

    /// Whether the frame has no pixels
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Get pixel at (x, y)
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y * self.width + x) * 3) as usize;
        self.data
            .get(idx..idx + 3)
            .map(|p| [p[0], p[1], p[2]])
    }

    /// Convert to grayscale
    pub fn to_grayscale(&self) -> Vec<u8> {
        let mut gray = Vec::with_capacity((self.width * self.height) as usize);
        for pixel in self.data.chunks_exact(3) {
            // Luminance formula: 0.299*R + 0.587*G + 0.114*B
            let y = (pixel[0] as f32 * 0.299
                   + pixel[1] as f32 * 0.587
                   + pixel[2] as f32 * 0.114) as u8;
            gray.push(y);
        }
        gray
    }

    /// Mean luminance (0-255) of a region, `None` if the region is empty
    /// or falls outside the frame
    pub fn mean_luminance(&self, x: u32, y: u32, w: u32, h: u32) -> Option<f32> {
        let region = self.crop(x, y, w, h)?;
        if region.is_empty() {
            return None;
        }
        let gray = region.to_grayscale();
        let sum: u64 = gray.iter().map(|&v| v as u64).sum();
        Some(sum as f32 / gray.len() as f32)
    }

    /// Crop a region of the frame
    pub fn crop(&self, x: u32, y: u32, w: u32, h: u32) -> Option<VideoFrame> {
        if x.checked_add(w)? > self.width || y.checked_add(h)? > self.height {
            return None;
        }
        if !self.is_consistent() {
            return None;
        }

        let mut cropped = Vec::with_capacity((w * h * 3) as usize);
        for row in y..(y + h) {
            let start = ((row * self.width + x) * 3) as usize;
            let end = start + (w * 3) as usize;
            cropped.extend_from_slice(&self.data[start..end]);
        }

        Some(VideoFrame {
            data: cropped,
            width: w,
            height: h,
            timestamp_ns: self.timestamp_ns,
            sequence: self.sequence,
        })
    }

    /// Resize frame with a triangle (bilinear) filter.
    ///
    /// Returns `None` for empty or inconsistent frames and zero targets.
    pub fn resize(&self, new_width: u32, new_height: u32) -> Option<VideoFrame> {
        if self.is_empty() || new_width == 0 || new_height == 0 {
            return None;
        }
        let img = self.to_image()?;
        let resized = image::imageops::resize(&img, new_width, new_height, FilterType::Triangle);

        Some(VideoFrame::from_image(resized, self.timestamp_ns, self.sequence))
    }
}

/// Decode an encoded still image (JPEG, PNG, BMP...) to an RGB frame
pub fn decode_still(bytes: &[u8]) -> Result<VideoFrame, CameraError> {
    if bytes.is_empty() {
        return Err(CameraError::Decode("empty image payload".into()));
    }
    let img = image::load_from_memory(bytes)?;
    Ok(VideoFrame::from_image(img.to_rgb8(), 0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Cursor;

    fn gradient(width: u32, height: u32) -> VideoFrame {
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&[x as u8, y as u8, 7]);
            }
        }
        VideoFrame::new(data, width, height, 42, 3)
    }

    #[test]
    fn test_crop_copies_region() {
        let frame = gradient(10, 8);
        let crop = frame.crop(2, 3, 4, 2).unwrap();

        assert_eq!(crop.width, 4);
        assert_eq!(crop.height, 2);
        assert_eq!(crop.get_pixel(0, 0), Some([2, 3, 7]));
        assert_eq!(crop.get_pixel(3, 1), Some([5, 4, 7]));
        assert_eq!(crop.sequence, 3);
    }

    #[test]
    fn test_crop_out_of_bounds() {
        let frame = gradient(10, 8);
        assert!(frame.crop(8, 0, 4, 2).is_none());
        assert!(frame.crop(u32::MAX, 0, 4, 2).is_none());
    }

    #[test]
    fn test_resize_dimensions() {
        let frame = gradient(32, 16);
        let resized = frame.resize(8, 8).unwrap();
        assert_eq!((resized.width, resized.height), (8, 8));
        assert_eq!(resized.data.len(), 8 * 8 * 3);
        assert!(frame.resize(0, 8).is_none());
    }

    #[test]
    fn test_inconsistent_frame_rejected() {
        let frame = VideoFrame::new(vec![0; 5], 4, 4, 0, 0);
        assert!(!frame.is_consistent());
        assert!(frame.to_image().is_none());
        assert!(frame.resize(2, 2).is_none());
    }

    #[test]
    fn test_mean_luminance() {
        let frame = VideoFrame::filled(4, 4, [255, 255, 255]);
        let lum = frame.mean_luminance(0, 0, 4, 4).unwrap();
        assert!(lum > 250.0);

        let dark = VideoFrame::filled(4, 4, [0, 0, 0]);
        assert_eq!(dark.mean_luminance(1, 1, 2, 2), Some(0.0));
    }

    #[test]
    fn test_decode_png_still() {
        let img = RgbImage::from_pixel(6, 5, image::Rgb([10, 20, 30]));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();

        let frame = decode_still(&bytes).unwrap();
        assert_eq!((frame.width, frame.height), (6, 5));
        assert_eq!(frame.get_pixel(5, 4), Some([10, 20, 30]));
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(matches!(decode_still(b"not an image"), Err(CameraError::Decode(_))));
        assert!(matches!(decode_still(&[]), Err(CameraError::Decode(_))));
    }

    proptest! {
        #[test]
        fn prop_crop_respects_bounds(x in 0u32..40, y in 0u32..40, w in 0u32..40, h in 0u32..40) {
            let frame = gradient(32, 24);
            match frame.crop(x, y, w, h) {
                Some(cropped) => {
                    prop_assert!(x + w <= 32 && y + h <= 24);
                    prop_assert_eq!((cropped.width, cropped.height), (w, h));
                    prop_assert!(cropped.is_consistent());
                }
                None => {
                    prop_assert!(x + w > 32 || y + h > 24);
                }
            }
        }
    }
}
