//! Face localization adapters

use camera_capture::VideoFrame;
use inference_engine::CropRegion;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::DmsError;

/// Face bounding box in pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
}

impl FaceBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            confidence: 1.0,
        }
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    pub fn region(&self) -> CropRegion {
        CropRegion {
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
        }
    }
}

/// Finds candidate faces in a frame
pub trait FaceLocator: Send {
    fn locate(&self, frame: &VideoFrame) -> Result<Vec<FaceBox>, DmsError>;
}

impl<F> FaceLocator for F
where
    F: Fn(&VideoFrame) -> Vec<FaceBox> + Send,
{
    fn locate(&self, frame: &VideoFrame) -> Result<Vec<FaceBox>, DmsError> {
        Ok(self(frame))
    }
}

/// Pick the largest box; the earliest one wins ties
pub fn select_primary(faces: &[FaceBox]) -> Option<FaceBox> {
    let mut best: Option<FaceBox> = None;
    for face in faces {
        let area = face.area();
        if !area.is_finite() || area <= 0.0 {
            continue;
        }
        match best {
            Some(b) if area <= b.area() => {}
            _ => best = Some(*face),
        }
    }
    best
}

/// Treats the whole frame as the face (pre-cropped input)
#[derive(Debug, Clone, Copy, Default)]
pub struct FullFrameLocator;

impl FaceLocator for FullFrameLocator {
    fn locate(&self, frame: &VideoFrame) -> Result<Vec<FaceBox>, DmsError> {
        if frame.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![FaceBox::new(0.0, 0.0, frame.width as f32, frame.height as f32)])
    }
}

/// Fixed region expressed as fractions of the frame, for a camera
/// mounted so the driver's face sits in a known area
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FixedRegionLocator {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Default for FixedRegionLocator {
    fn default() -> Self {
        Self {
            x: 0.3,
            y: 0.2,
            width: 0.4,
            height: 0.5,
        }
    }
}

impl FaceLocator for FixedRegionLocator {
    fn locate(&self, frame: &VideoFrame) -> Result<Vec<FaceBox>, DmsError> {
        if frame.is_empty() {
            return Ok(Vec::new());
        }
        let w = frame.width as f32;
        let h = frame.height as f32;
        Ok(vec![FaceBox::new(self.x * w, self.y * h, self.width * w, self.height * h)])
    }
}

/// Drops candidates whose region is too dark to hold a visible face
/// (covered lens, unlit cabin)
pub struct LuminanceGate<L> {
    inner: L,
    min_luminance: f32,
}

impl<L: FaceLocator> LuminanceGate<L> {
    pub fn new(inner: L, min_luminance: f32) -> Self {
        Self { inner, min_luminance }
    }
}

impl<L: FaceLocator> FaceLocator for LuminanceGate<L> {
    fn locate(&self, frame: &VideoFrame) -> Result<Vec<FaceBox>, DmsError> {
        let faces = self.inner.locate(frame)?;
        Ok(faces
            .into_iter()
            .filter(|face| {
                let Some((x, y, w, h)) = face.region().clamp_to(frame.width, frame.height) else {
                    return false;
                };
                let lum = frame.mean_luminance(x, y, w, h).unwrap_or(0.0);
                if lum < self.min_luminance {
                    debug!("Rejecting face candidate: luminance {:.1} < {:.1}", lum, self.min_luminance);
                    return false;
                }
                true
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_select_largest() {
        let faces = [
            FaceBox::new(0.0, 0.0, 10.0, 10.0),
            FaceBox::new(5.0, 5.0, 30.0, 20.0),
            FaceBox::new(1.0, 1.0, 20.0, 20.0),
        ];
        assert_eq!(select_primary(&faces), Some(faces[1]));
    }

    #[test]
    fn test_select_tie_keeps_first() {
        let faces = [FaceBox::new(0.0, 0.0, 10.0, 20.0), FaceBox::new(50.0, 50.0, 20.0, 10.0)];
        assert_eq!(select_primary(&faces), Some(faces[0]));
    }

    #[test]
    fn test_select_none() {
        assert_eq!(select_primary(&[]), None);
        assert_eq!(select_primary(&[FaceBox::new(0.0, 0.0, 0.0, 10.0)]), None);
    }

    #[test]
    fn test_fixed_region() {
        let frame = VideoFrame::filled(100, 200, [0, 0, 0]);
        let faces = FixedRegionLocator::default().locate(&frame).unwrap();
        assert_eq!(faces.len(), 1);

        let face = faces[0];
        for (got, want) in [(face.x, 30.0), (face.y, 40.0), (face.width, 40.0), (face.height, 100.0)] {
            assert!((got - want).abs() < 1e-3, "{} != {}", got, want);
        }
    }

    #[test]
    fn test_closure_locator() {
        let locator = |_: &VideoFrame| vec![FaceBox::new(1.0, 2.0, 3.0, 4.0)];
        let frame = VideoFrame::filled(10, 10, [0, 0, 0]);
        assert_eq!(locator.locate(&frame).unwrap().len(), 1);
    }

    #[test]
    fn test_luminance_gate() {
        let gate = LuminanceGate::new(FullFrameLocator, 20.0);

        let dark = VideoFrame::filled(8, 8, [2, 2, 2]);
        assert!(gate.locate(&dark).unwrap().is_empty());

        let lit = VideoFrame::filled(8, 8, [180, 160, 150]);
        assert_eq!(gate.locate(&lit).unwrap().len(), 1);
    }

    fn face_box() -> impl Strategy<Value = FaceBox> {
        // Small integer sides so equal areas come up often
        (0u8..50, 0u8..50, 0u8..6, 0u8..6)
            .prop_map(|(x, y, w, h)| FaceBox::new(x as f32, y as f32, w as f32, h as f32))
    }

    proptest! {
        #[test]
        fn prop_select_primary_is_first_largest(faces in proptest::collection::vec(face_box(), 0..12)) {
            let max_area = faces.iter().map(FaceBox::area).filter(|a| *a > 0.0).fold(None, |m: Option<f32>, a| {
                Some(m.map_or(a, |m| m.max(a)))
            });

            match (select_primary(&faces), max_area) {
                (None, None) => {}
                (Some(chosen), Some(max)) => {
                    prop_assert_eq!(chosen.area(), max);
                    let first = faces.iter().position(|f| f.area() == max).unwrap();
                    prop_assert_eq!(chosen, faces[first]);
                }
                (chosen, max) => prop_assert!(false, "selected {:?} with max area {:?}", chosen, max),
            }
        }
    }
}
