//! Frame sources feeding the monitoring loop

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::frame::VideoFrame;
use crate::CameraError;

/// Extensions recognized as still frames
const FRAME_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// Anything that yields frames one at a time.
///
/// `Ok(None)` signals end of stream. `CameraError::Frame` reports a single
/// bad frame that was skipped; any other error means the source is gone.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Option<VideoFrame>, CameraError>;
}

/// Replays a directory of still images in file-name order
pub struct ImageSequenceSource {
    paths: Vec<PathBuf>,
    cursor: usize,
}

impl ImageSequenceSource {
    /// Scan a directory for frames
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, CameraError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(CameraError::Open(format!("{} is not a directory", dir.display())));
        }

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let is_frame = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| FRAME_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
                .unwrap_or(false);
            if is_frame {
                paths.push(path);
            }
        }
        paths.sort();

        info!("Opened image sequence {} ({} frames)", dir.display(), paths.len());
        Ok(Self { paths, cursor: 0 })
    }

    /// Number of frames not yet read
    pub fn remaining(&self) -> usize {
        self.paths.len() - self.cursor
    }
}

impl FrameSource for ImageSequenceSource {
    fn next_frame(&mut self) -> Result<Option<VideoFrame>, CameraError> {
        let Some(path) = self.paths.get(self.cursor) else {
            return Ok(None);
        };
        let sequence = self.cursor as u32;
        self.cursor += 1;

        debug!("Reading frame {}", path.display());
        let img = image::open(path).map_err(|e| CameraError::Frame(format!("{}: {}", path.display(), e)))?;
        let timestamp_ns = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);

        Ok(Some(VideoFrame::from_image(img.to_rgb8(), timestamp_ns, sequence)))
    }
}

/// Frames held in memory, handy for replays and tests
impl FrameSource for std::vec::IntoIter<VideoFrame> {
    fn next_frame(&mut self) -> Result<Option<VideoFrame>, CameraError> {
        Ok(self.next())
    }
}
