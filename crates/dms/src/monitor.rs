//! Interactive monitoring loop

use std::sync::atomic::{AtomicBool, Ordering};

use alerting::AlertLevel;
use camera_capture::{CameraError, FrameSource};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::session::{FatigueSession, FrameOutcome};
use crate::sink::AlertSink;

/// Frame counts for one run of the loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MonitorSummary {
    pub frames: u64,
    pub classified: u64,
    /// Frames displayed at the alarm level
    pub alarms: u64,
    pub errors: u64,
    pub no_subject: u64,
    pub buffering: u64,
    /// Frames the source could not read
    pub skipped: u64,
}

impl MonitorSummary {
    fn record(&mut self, outcome: &FrameOutcome) {
        self.frames += 1;
        match outcome {
            FrameOutcome::NoSubject { .. } => self.no_subject += 1,
            FrameOutcome::Buffering { .. } => self.buffering += 1,
            FrameOutcome::Error { .. } => self.errors += 1,
            FrameOutcome::Classified { display, .. } => {
                self.classified += 1;
                if display.level == AlertLevel::Alarm {
                    self.alarms += 1;
                }
            }
        }
    }
}

/// Acquire, process and render frames until the source ends or `stop` is set.
///
/// `stop` is checked between frames only. Sink failures and unreadable
/// frames are logged and the loop keeps going; losing the source ends it.
pub fn run_monitor(
    session: &mut FatigueSession,
    source: &mut dyn FrameSource,
    sink: &mut dyn AlertSink,
    stop: &AtomicBool,
) -> MonitorSummary {
    let mut summary = MonitorSummary::default();
    info!("Monitoring started with profile {}", session.profile().name);

    while !stop.load(Ordering::SeqCst) {
        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                info!("Frame source exhausted");
                break;
            }
            Err(CameraError::Frame(msg)) => {
                warn!("Skipping unreadable frame: {}", msg);
                summary.skipped += 1;
                continue;
            }
            Err(e) => {
                error!("Frame acquisition failed: {}", e);
                break;
            }
        };

        let report = session.process(&frame);
        summary.record(&report.outcome);

        if let Err(e) = sink.render(&frame, &report) {
            warn!("Failed to render frame {}: {}", report.sequence, e);
        }
    }

    info!(
        "Monitoring stopped: {} frames, {} classified, {} alarm frames, {} errors, {} without face, {} skipped",
        summary.frames, summary.classified, summary.alarms, summary.errors, summary.no_subject, summary.skipped
    );
    summary
}
