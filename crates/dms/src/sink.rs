//! Presentation of per-frame results

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use alerting::{AlertLevel, DisplayColor};
use camera_capture::VideoFrame;
use image::{imageops, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::session::{FrameOutcome, FrameReport};
use crate::DmsError;

/// Receives every processed frame
pub trait AlertSink: Send {
    fn render(&mut self, frame: &VideoFrame, report: &FrameReport) -> Result<(), DmsError>;
}

/// Logs frames; level changes are logged at info/warn
#[derive(Debug, Default)]
pub struct TracingSink {
    last_level: Option<AlertLevel>,
}

impl TracingSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AlertSink for TracingSink {
    fn render(&mut self, _frame: &VideoFrame, report: &FrameReport) -> Result<(), DmsError> {
        debug!(
            "Frame {}: {} [{}] run={}",
            report.sequence,
            report.overlay.text,
            report.outcome.label(),
            report.state.fatigue_run_length
        );

        if let Some(level) = report.outcome.level() {
            if self.last_level != Some(level) {
                match level {
                    AlertLevel::Alarm => warn!("Frame {}: {}", report.sequence, report.overlay.text),
                    _ => info!("Frame {}: {}", report.sequence, report.overlay.text),
                }
                self.last_level = Some(level);
            }
        }
        Ok(())
    }
}

const BORDER: u32 = 4;
const BAR_HEIGHT: u32 = 8;
/// Pixels per font cell
const TEXT_SCALE: u32 = 2;
const GLYPH_HEIGHT: u32 = 5;

/// One line of the JSONL summary
#[derive(Debug, Serialize)]
struct FrameRecord<'a> {
    sequence: u32,
    outcome: &'static str,
    text: &'a str,
    color: DisplayColor,
    level: AlertLevel,
    run_length: u32,
    probability: Option<f32>,
}

/// Writes annotated frames plus a `frames.jsonl` summary to a directory.
///
/// Each PNG carries the overlay text in the overlay color, bottom-left
/// above the progress bar.
pub struct OverlaySink {
    dir: PathBuf,
    log: BufWriter<File>,
    written: u64,
}

impl OverlaySink {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, DmsError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        let log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join("frames.jsonl"))?;

        info!("Writing annotated frames to {}", dir.display());
        Ok(Self {
            dir,
            log: BufWriter::new(log),
            written: 0,
        })
    }

    /// Frames written so far
    pub fn written(&self) -> u64 {
        self.written
    }

    fn annotate(frame: &VideoFrame, report: &FrameReport) -> Result<RgbImage, DmsError> {
        let mut img = frame
            .to_image()
            .ok_or_else(|| DmsError::Sink(format!("frame {} has inconsistent dimensions", report.sequence)))?;
        let color = Rgb(report.overlay.color.to_array());

        // Border in the overlay color
        for inset in 0..BORDER.min(img.width() / 2).min(img.height() / 2) {
            if let Some(rect) = rect(inset as i32, inset as i32, img.width() - 2 * inset, img.height() - 2 * inset) {
                draw_hollow_rect_mut(&mut img, rect, color);
            }
        }

        if let Some(face) = report.face {
            if let Some((x, y, w, h)) = face.region().clamp_to(img.width(), img.height()) {
                if let Some(rect) = rect(x as i32, y as i32, w, h) {
                    draw_hollow_rect_mut(&mut img, rect, Rgb([255, 255, 255]));
                }
            }
        }

        // Progress toward the alarm along the bottom edge
        if let FrameOutcome::Classified { display, .. } = &report.outcome {
            let width = (img.width() as f32 * display.progress()) as u32;
            let top = img.height().saturating_sub(BAR_HEIGHT) as i32;
            if let Some(rect) = rect(0, top, width, BAR_HEIGHT.min(img.height())) {
                draw_filled_rect_mut(&mut img, rect, Rgb(display.color.to_array()));
            }
        }

        // What the classifier saw, top-left
        if let Some(preview) = report.preview.as_ref().and_then(VideoFrame::to_image) {
            imageops::overlay(&mut img, &preview, BORDER as i64, BORDER as i64);
        }

        let text_y = img.height() as i32 - (BAR_HEIGHT + GLYPH_HEIGHT * TEXT_SCALE + 2) as i32;
        draw_text(&mut img, (BORDER + 2) as i32, text_y, &report.overlay.text, color);

        Ok(img)
    }
}

fn rect(x: i32, y: i32, width: u32, height: u32) -> Option<Rect> {
    (width > 0 && height > 0).then(|| Rect::at(x, y).of_size(width, height))
}

/// 3x5 bitmap, one row per entry, most significant bit on the left
fn glyph(ch: char) -> [u8; 5] {
    match ch.to_ascii_uppercase() {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b010, 0b010, 0b010],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        'A' => [0b010, 0b101, 0b111, 0b101, 0b101],
        'B' => [0b110, 0b101, 0b110, 0b101, 0b110],
        'C' => [0b011, 0b100, 0b100, 0b100, 0b011],
        'D' => [0b110, 0b101, 0b101, 0b101, 0b110],
        'E' => [0b111, 0b100, 0b110, 0b100, 0b111],
        'F' => [0b111, 0b100, 0b110, 0b100, 0b100],
        'G' => [0b011, 0b100, 0b101, 0b101, 0b011],
        'I' => [0b111, 0b010, 0b010, 0b010, 0b111],
        'K' => [0b101, 0b101, 0b110, 0b101, 0b101],
        'L' => [0b100, 0b100, 0b100, 0b100, 0b111],
        'M' => [0b101, 0b111, 0b111, 0b101, 0b101],
        'N' => [0b110, 0b101, 0b101, 0b101, 0b101],
        'O' => [0b010, 0b101, 0b101, 0b101, 0b010],
        'R' => [0b110, 0b101, 0b110, 0b101, 0b101],
        'S' => [0b011, 0b100, 0b010, 0b001, 0b110],
        'T' => [0b111, 0b010, 0b010, 0b010, 0b010],
        'U' => [0b101, 0b101, 0b101, 0b101, 0b111],
        'V' => [0b101, 0b101, 0b101, 0b101, 0b010],
        'W' => [0b101, 0b101, 0b111, 0b111, 0b101],
        '.' => [0b000, 0b000, 0b000, 0b000, 0b010],
        ':' => [0b000, 0b010, 0b000, 0b010, 0b000],
        '(' => [0b001, 0b010, 0b010, 0b010, 0b001],
        ')' => [0b100, 0b010, 0b010, 0b010, 0b100],
        '%' => [0b101, 0b001, 0b010, 0b100, 0b101],
        '/' => [0b001, 0b001, 0b010, 0b100, 0b100],
        _ => [0; 5],
    }
}

/// Draw `text` with its top-left corner at (x, y); clipped to the image
fn draw_text(img: &mut RgbImage, x: i32, y: i32, text: &str, color: Rgb<u8>) {
    let cell = TEXT_SCALE as i32;
    for (i, ch) in text.chars().enumerate() {
        let left = x + i as i32 * 4 * cell;
        for (row, bits) in glyph(ch).iter().enumerate() {
            for col in 0..3 {
                if (bits >> (2 - col)) & 1 == 1 {
                    let rect = Rect::at(left + col * cell, y + row as i32 * cell).of_size(TEXT_SCALE, TEXT_SCALE);
                    draw_filled_rect_mut(img, rect, color);
                }
            }
        }
    }
}

impl AlertSink for OverlaySink {
    fn render(&mut self, frame: &VideoFrame, report: &FrameReport) -> Result<(), DmsError> {
        let img = Self::annotate(frame, report)?;
        let path = self.dir.join(format!("frame_{:06}.png", report.sequence));
        img.save(&path)
            .map_err(|e| DmsError::Sink(format!("{}: {}", path.display(), e)))?;

        let record = FrameRecord {
            sequence: report.sequence,
            outcome: report.outcome.label(),
            text: &report.overlay.text,
            color: report.overlay.color,
            level: report.state.level,
            run_length: report.state.fatigue_run_length,
            probability: match report.outcome {
                FrameOutcome::Classified { probability, .. } => Some(probability),
                _ => None,
            },
        };
        let line = serde_json::to_string(&record).map_err(|e| DmsError::Sink(e.to_string()))?;
        writeln!(self.log, "{}", line)?;
        self.log.flush()?;

        self.written += 1;
        Ok(())
    }
}

/// Fans a frame out to several sinks; every sink runs even if one fails
#[derive(Default)]
pub struct SinkChain {
    sinks: Vec<Box<dyn AlertSink>>,
}

impl SinkChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl AlertSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }
}

impl AlertSink for SinkChain {
    fn render(&mut self, frame: &VideoFrame, report: &FrameReport) -> Result<(), DmsError> {
        let mut first_error = None;
        for sink in &mut self.sinks {
            if let Err(e) = sink.render(frame, report) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
