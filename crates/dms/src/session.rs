//! Per-subject monitoring session
//!
//! Owns the only mutable state of the pipeline: the alert state machine
//! and, for sequence classifiers, the temporal window.

use std::sync::Arc;

use alerting::{AlertDisplay, AlertLevel, AlertState, AlertStateMachine, Overlay};
use camera_capture::VideoFrame;
use inference_engine::{Classifier, PreparedInput, Preprocessor};
use metrics::counter;
use ndarray::ArrayD;
use temporal_buffer::TemporalBuffer;
use tracing::{debug, info, warn};

use crate::locator::{select_primary, FaceBox, FaceLocator};
use crate::profile::ClassifierProfile;
use crate::DmsError;

/// Consecutive no-face frames before the notice escalates (~2s at 15fps)
pub const DEFAULT_ABSENT_ALERT_FRAMES: u32 = 30;

/// What happened to one frame
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// No usable face (none found, or the crop could not be prepared)
    NoSubject { absent_frames: u32, prolonged: bool },
    /// Window still filling, no classification this frame
    Buffering { filled: usize, capacity: usize },
    /// Classifier ran and the state machine was updated
    Classified { probability: f32, display: AlertDisplay },
    /// Classifier failed; state untouched
    Error { message: String },
}

impl FrameOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            FrameOutcome::NoSubject { .. } => "no_subject",
            FrameOutcome::Buffering { .. } => "buffering",
            FrameOutcome::Classified { .. } => "classified",
            FrameOutcome::Error { .. } => "error",
        }
    }

    /// Alert level, if the state machine ran this frame
    pub fn level(&self) -> Option<AlertLevel> {
        match self {
            FrameOutcome::Classified { display, .. } => Some(display.level),
            _ => None,
        }
    }
}

/// Everything a sink needs to render one frame
#[derive(Debug, Clone)]
pub struct FrameReport {
    pub sequence: u32,
    pub face: Option<FaceBox>,
    /// Resized crop the classifier saw
    pub preview: Option<VideoFrame>,
    pub outcome: FrameOutcome,
    pub overlay: Overlay,
    /// Alert state after this frame
    pub state: AlertState,
}

/// Streaming fatigue detection for one subject
pub struct FatigueSession {
    profile: ClassifierProfile,
    locator: Box<dyn FaceLocator>,
    classifier: Arc<dyn Classifier>,
    preprocessor: Preprocessor,
    buffer: Option<TemporalBuffer>,
    alerts: AlertStateMachine,
    absent_frames: u32,
    absent_alert_frames: u32,
}

impl FatigueSession {
    /// Create a session; fails if the profile is inconsistent
    pub fn new(
        profile: ClassifierProfile,
        locator: Box<dyn FaceLocator>,
        classifier: Arc<dyn Classifier>,
    ) -> Result<Self, DmsError> {
        profile.validate()?;
        let preprocessor = Preprocessor::new(profile.contract)?;
        let buffer = profile
            .contract
            .sequence_length()
            .map(TemporalBuffer::new)
            .transpose()?;

        info!(
            "Starting fatigue session: profile={}, classifier={}, window={:?}",
            profile.name,
            classifier.name(),
            buffer.as_ref().map(|b| b.capacity())
        );

        Ok(Self {
            alerts: AlertStateMachine::new(profile.alert),
            profile,
            locator,
            classifier,
            preprocessor,
            buffer,
            absent_frames: 0,
            absent_alert_frames: DEFAULT_ABSENT_ALERT_FRAMES,
        })
    }

    /// Frames without a face before the notice escalates
    pub fn with_absent_alert_frames(mut self, frames: u32) -> Self {
        self.absent_alert_frames = frames;
        self
    }

    /// Run one iteration of the pipeline for `frame`
    pub fn process(&mut self, frame: &VideoFrame) -> FrameReport {
        let faces = match self.locator.locate(frame) {
            Ok(faces) => faces,
            Err(e) => {
                warn!("Face locator failed on frame {}: {}", frame.sequence, e);
                Vec::new()
            }
        };

        let face = select_primary(&faces);
        let prepared = face.and_then(|f| match self.preprocessor.prepare(frame, f.region()) {
            Ok(prepared) => Some(prepared),
            Err(e) => {
                warn!("Preprocessing failed on frame {}: {}", frame.sequence, e);
                None
            }
        });

        let (outcome, overlay, preview) = match prepared {
            Some(PreparedInput { sample, preview }) => {
                self.absent_frames = 0;
                let (outcome, overlay) = self.classify_sample(sample);
                (outcome, overlay, Some(preview))
            }
            None => {
                let (outcome, overlay) = self.no_subject();
                (outcome, overlay, None)
            }
        };

        counter!("fatigue_frames_total", "outcome" => outcome.label()).increment(1);
        if outcome.level() == Some(AlertLevel::Alarm) {
            counter!("fatigue_alarms_total").increment(1);
        }

        FrameReport {
            sequence: frame.sequence,
            face,
            preview,
            outcome,
            overlay,
            state: self.alerts.state(),
        }
    }

    fn classify_sample(&mut self, sample: ndarray::Array3<f32>) -> (FrameOutcome, Overlay) {
        let input: ArrayD<f32> = match self.buffer.as_mut() {
            Some(buffer) => {
                if let Err(e) = buffer.push(sample) {
                    buffer.clear();
                    return self.failure(e.to_string());
                }
                if !buffer.is_ready() {
                    debug!("Buffering {}/{}", buffer.len(), buffer.capacity());
                    return (
                        FrameOutcome::Buffering {
                            filled: buffer.len(),
                            capacity: buffer.capacity(),
                        },
                        Overlay::buffering(buffer.len(), buffer.capacity()),
                    );
                }
                match buffer.snapshot() {
                    Ok(window) => window.into_dyn(),
                    Err(e) => return self.failure(e.to_string()),
                }
            }
            None => Preprocessor::batch_single(sample).into_dyn(),
        };

        match self.classifier.classify(input.view()) {
            Ok(probability) => {
                let display = self.alerts.observe(probability);
                let overlay = display.overlay();
                (FrameOutcome::Classified { probability, display }, overlay)
            }
            Err(e) => self.failure(e.to_string()),
        }
    }

    fn failure(&self, message: String) -> (FrameOutcome, Overlay) {
        let overlay = self.alerts.observe_failure(&message);
        (FrameOutcome::Error { message }, overlay)
    }

    /// Clears the window; the fatigue run is left alone
    fn no_subject(&mut self) -> (FrameOutcome, Overlay) {
        if let Some(buffer) = self.buffer.as_mut() {
            buffer.clear();
        }
        self.absent_frames = self.absent_frames.saturating_add(1);

        let prolonged = self.absent_frames > self.absent_alert_frames;
        if self.absent_frames == self.absent_alert_frames.saturating_add(1) {
            warn!("Face not visible for {} frames", self.absent_frames);
        }

        let overlay = if prolonged {
            Overlay::face_not_visible()
        } else {
            Overlay::no_subject()
        };
        (
            FrameOutcome::NoSubject {
                absent_frames: self.absent_frames,
                prolonged,
            },
            overlay,
        )
    }

    /// Current alert state
    pub fn alert_state(&self) -> AlertState {
        self.alerts.state()
    }

    /// Samples currently in the window (0 for single-frame profiles)
    pub fn buffered(&self) -> usize {
        self.buffer.as_ref().map(|b| b.len()).unwrap_or(0)
    }

    pub fn profile(&self) -> &ClassifierProfile {
        &self.profile
    }

    /// Start over (driver change)
    pub fn reset(&mut self) {
        info!("Resetting fatigue session");
        self.alerts.reset();
        if let Some(buffer) = self.buffer.as_mut() {
            buffer.clear();
        }
        self.absent_frames = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::FullFrameLocator;
    use inference_engine::MockClassifier;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn frame(seq: u32) -> VideoFrame {
        let mut f = VideoFrame::filled(80, 60, [120, 100, 90]);
        f.sequence = seq;
        f
    }

    fn single_profile(trigger_frames: u32) -> ClassifierProfile {
        let mut profile = ClassifierProfile::sequence_cnn();
        profile.contract.layout = inference_engine::InputLayout::Single;
        profile.alert.trigger_frames = trigger_frames;
        profile
    }

    fn session(profile: ClassifierProfile, classifier: Arc<MockClassifier>) -> FatigueSession {
        FatigueSession::new(profile, Box::new(FullFrameLocator), classifier).unwrap()
    }

    /// Locator whose face can be switched off from the test
    fn toggled_locator(present: Arc<AtomicBool>) -> Box<dyn FaceLocator> {
        Box::new(move |f: &VideoFrame| {
            if present.load(Ordering::SeqCst) {
                vec![FaceBox::new(0.0, 0.0, f.width as f32, f.height as f32)]
            } else {
                Vec::new()
            }
        })
    }

    #[test]
    fn test_single_frame_escalation() {
        let profile = single_profile(5);
        let mock = Arc::new(MockClassifier::constant(0.9).expecting(&profile.contract));
        let mut session = session(profile, mock.clone());

        let levels: Vec<_> = (0..5).map(|i| session.process(&frame(i)).outcome.level()).collect();
        assert_eq!(
            levels,
            vec![
                Some(AlertLevel::Warning),
                Some(AlertLevel::Warning),
                Some(AlertLevel::Warning),
                Some(AlertLevel::Warning),
                Some(AlertLevel::Alarm),
            ]
        );
        assert_eq!(mock.calls(), 5);
    }

    #[test]
    fn test_buffering_skips_classifier() {
        let profile = ClassifierProfile::sequence_cnn();
        let mock = Arc::new(MockClassifier::constant(0.9).expecting(&profile.contract));
        let mut session = session(profile, mock.clone());

        for i in 0..19 {
            let report = session.process(&frame(i));
            assert_eq!(
                report.outcome,
                FrameOutcome::Buffering { filled: i as usize + 1, capacity: 20 }
            );
            assert_eq!(report.overlay.text, format!("BUFFERING... ({}/20)", i + 1));
        }
        assert_eq!(mock.calls(), 0);
        assert_eq!(session.alert_state().fatigue_run_length, 0);

        let report = session.process(&frame(19));
        assert_eq!(report.outcome.level(), Some(AlertLevel::Warning));
        assert_eq!(mock.calls(), 1);

        // Window stays full; every later frame is classified
        session.process(&frame(20));
        assert_eq!(mock.calls(), 2);
        assert_eq!(session.buffered(), 20);
    }

    #[test]
    fn test_no_subject_clears_window_but_keeps_run() {
        let present = Arc::new(AtomicBool::new(true));
        let mut profile = ClassifierProfile::sequence_cnn();
        profile.contract.layout = inference_engine::InputLayout::Sequence { length: 2 };
        let mock = Arc::new(MockClassifier::constant(0.9));
        let mut session = FatigueSession::new(profile, toggled_locator(present.clone()), mock.clone()).unwrap();

        for i in 0..4 {
            session.process(&frame(i));
        }
        assert_eq!(session.alert_state().fatigue_run_length, 3);

        present.store(false, Ordering::SeqCst);
        let report = session.process(&frame(4));
        assert_eq!(report.outcome, FrameOutcome::NoSubject { absent_frames: 1, prolonged: false });
        assert_eq!(report.overlay, Overlay::no_subject());
        assert_eq!(session.buffered(), 0);
        assert_eq!(session.alert_state().fatigue_run_length, 3);

        // Window refills before the run continues
        present.store(true, Ordering::SeqCst);
        assert!(matches!(session.process(&frame(5)).outcome, FrameOutcome::Buffering { filled: 1, .. }));
        assert_eq!(session.alert_state().fatigue_run_length, 3);
        assert_eq!(session.process(&frame(6)).state.fatigue_run_length, 4);
    }

    #[test]
    fn test_classifier_failure_preserves_run() {
        let mut script: Vec<Result<f32, String>> = vec![Ok(0.9); 5];
        script.push(Err("device lost".to_string()));
        script.push(Ok(0.9));
        let mock = Arc::new(MockClassifier::scripted(script));
        let mut session = session(single_profile(10), mock);

        for i in 0..5 {
            session.process(&frame(i));
        }
        assert_eq!(session.alert_state().fatigue_run_length, 5);

        let failed = session.process(&frame(5));
        assert!(matches!(failed.outcome, FrameOutcome::Error { .. }));
        assert_eq!(failed.overlay, Overlay::error());
        assert_eq!(failed.state.fatigue_run_length, 5);

        let resumed = session.process(&frame(6));
        assert_eq!(resumed.state.fatigue_run_length, 6);
        assert_eq!(resumed.overlay.text, "WARNING... (6/10)");
    }

    #[test]
    fn test_out_of_range_output_is_failure() {
        let mock = Arc::new(MockClassifier::scripted(vec![Ok(0.9), Ok(1.7)]));
        let mut session = session(single_profile(5), mock);

        session.process(&frame(0));
        let report = session.process(&frame(1));
        assert!(matches!(report.outcome, FrameOutcome::Error { .. }));
        assert_eq!(report.state.fatigue_run_length, 1);
    }

    #[test]
    fn test_degenerate_face_treated_as_no_subject() {
        let locator: Box<dyn FaceLocator> = Box::new(|_: &VideoFrame| vec![FaceBox::new(500.0, 500.0, 10.0, 10.0)]);
        let mock = Arc::new(MockClassifier::constant(0.9));
        let mut session = FatigueSession::new(ClassifierProfile::sequence_cnn(), locator, mock.clone()).unwrap();

        let report = session.process(&frame(0));
        assert!(matches!(report.outcome, FrameOutcome::NoSubject { .. }));
        assert!(report.preview.is_none());
        assert_eq!(mock.calls(), 0);
    }

    #[test]
    fn test_prolonged_absence() {
        let locator: Box<dyn FaceLocator> = Box::new(|_: &VideoFrame| Vec::new());
        let mock = Arc::new(MockClassifier::constant(0.9));
        let mut session = FatigueSession::new(single_profile(5), locator, mock)
            .unwrap()
            .with_absent_alert_frames(2);

        assert_eq!(session.process(&frame(0)).overlay, Overlay::no_subject());
        assert_eq!(session.process(&frame(1)).overlay, Overlay::no_subject());
        let third = session.process(&frame(2));
        assert_eq!(third.overlay, Overlay::face_not_visible());
        assert_eq!(third.outcome, FrameOutcome::NoSubject { absent_frames: 3, prolonged: true });
    }

    #[test]
    fn test_recovery_and_replay() {
        let probs = [0.9, 0.9, 0.9, 0.2, 0.8, 0.6];
        let script: Vec<Result<f32, String>> = probs.iter().chain(probs.iter()).map(|&p| Ok(p)).collect();
        let mock = Arc::new(MockClassifier::scripted(script));
        let mut session = session(single_profile(5), mock);

        let first: Vec<_> = (0..6).map(|i| session.process(&frame(i)).outcome).collect();
        assert_eq!(first[3].level(), Some(AlertLevel::Awake));
        if let FrameOutcome::Classified { display, .. } = &first[3] {
            assert_eq!(display.run_length, 0);
        }

        session.reset();
        let second: Vec<_> = (0..6).map(|i| session.process(&frame(i)).outcome).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_preview_matches_contract() {
        let mock = Arc::new(MockClassifier::constant(0.1));
        let mut session = session(single_profile(5), mock);

        let report = session.process(&frame(0));
        let preview = report.preview.unwrap();
        assert_eq!((preview.width, preview.height), (64, 64));
        assert_eq!(report.face, Some(FaceBox::new(0.0, 0.0, 80.0, 60.0)));
    }

    #[test]
    fn test_invalid_profile_rejected() {
        let mut profile = ClassifierProfile::mobilenet_v2();
        profile.alert.trigger_frames = 0;
        let result = FatigueSession::new(profile, Box::new(FullFrameLocator), Arc::new(MockClassifier::constant(0.5)));
        assert!(result.is_err());
    }
}
