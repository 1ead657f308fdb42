// src/app.rs - Frame-synchronous host loop around the track manager
use crate::classifier::{FrameClassifier, RuleClassifier, WindowedClassifier};
use crate::config::EngineConfig;
use crate::data::SegmentSink;
use crate::error::ReplayError;
use crate::model_bridge::{LabelMap, TemplateModel};
use crate::observation::{Frame, TrackId};
use crate::segment::Segment;
use crate::tracking::{TrackManager, TrackUpdate};
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum ClassifierKind {
    Rules,
    Sequence { model: PathBuf, labels: PathBuf },
}

/// Builds the frame classifier. A sequence classifier that cannot load its
/// model or label mapping is fatal; there is no silent rule fallback.
pub fn build_classifier(kind: &ClassifierKind, config: &EngineConfig) -> Result<FrameClassifier> {
    match kind {
        ClassifierKind::Rules => Ok(FrameClassifier::Rules(RuleClassifier::new(
            config.rules.clone(),
        ))),
        ClassifierKind::Sequence { model, labels } => {
            let model = TemplateModel::load(model)
                .with_context(|| format!("Failed to load sequence model {}", model.display()))?;
            let labels = LabelMap::load(labels)
                .with_context(|| format!("Failed to load label mapping {}", labels.display()))?;
            info!("Loaded sequence model with classes {:?}", labels.classes());
            let classifier = WindowedClassifier::new(Box::new(model), labels, config)
                .context("Sequence model does not match its label mapping")?;
            Ok(FrameClassifier::Windowed(classifier))
        }
    }
}

/// What happened to each body in one frame.
#[derive(Debug, Clone)]
pub struct FrameReport {
    pub timestamp: f64,
    pub updates: Vec<(TrackId, TrackUpdate)>,
    pub expired: Vec<Segment>,
}

#[derive(Debug, Clone, Default)]
pub struct SessionSummary {
    pub frames: usize,
    pub segments_logged: usize,
    pub segments_failed: usize,
    /// Label to (segment count, total seconds).
    pub per_label: BTreeMap<String, (usize, f64)>,
}

pub struct Session<S: SegmentSink> {
    manager: TrackManager,
    sink: S,
    summary: SessionSummary,
    finished: bool,
}

impl<S: SegmentSink> Session<S> {
    pub fn new(manager: TrackManager, sink: S) -> Self {
        Self {
            manager,
            sink,
            summary: SessionSummary::default(),
            finished: false,
        }
    }

    /// Routes every body to its track, then sweeps for stale tracks even if
    /// the frame carried no bodies.
    pub fn process_frame(&mut self, frame: &Frame) -> FrameReport {
        let mut updates = Vec::with_capacity(frame.bodies.len());

        for body in &frame.bodies {
            let observation = (!body.observation.is_empty()).then_some(&body.observation);
            let update = self.manager.update(&body.track_id, observation, frame.timestamp);
            if let Some(segment) = &update.closed {
                self.record(segment);
            }
            updates.push((body.track_id.clone(), update));
        }

        let expired = self.manager.sweep(frame.timestamp);
        for segment in &expired {
            self.record(segment);
        }

        self.summary.frames += 1;
        FrameReport {
            timestamp: frame.timestamp,
            updates,
            expired,
        }
    }

    /// Flushes every remaining track. Must run before the host exits.
    pub fn finish(&mut self) -> &SessionSummary {
        if !self.finished {
            for segment in self.manager.flush_all() {
                self.record(&segment);
            }
            self.finished = true;
            info!(
                "Session finished: {} frames, {} segments logged, {} failed",
                self.summary.frames, self.summary.segments_logged, self.summary.segments_failed
            );
        }
        &self.summary
    }

    /// Drives the session over a whole stream. Malformed frames are skipped;
    /// read failures end the stream early, but open segments are still flushed.
    pub fn run<I>(&mut self, frames: I) -> Result<SessionSummary>
    where
        I: IntoIterator<Item = std::result::Result<Frame, ReplayError>>,
    {
        let mut failure = None;
        for frame in frames {
            match frame {
                Ok(frame) => {
                    self.process_frame(&frame);
                }
                Err(e @ ReplayError::Parse { .. }) => warn!("Skipping frame: {}", e),
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        let summary = self.finish().clone();
        match failure {
            Some(e) => Err(e).context("Observation stream ended abnormally"),
            None => Ok(summary),
        }
    }

    pub fn manager(&self) -> &TrackManager {
        &self.manager
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn summary(&self) -> &SessionSummary {
        &self.summary
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    // Sink failures are reported and the segment dropped; processing continues
    fn record(&mut self, segment: &Segment) {
        match self.sink.append(segment) {
            Ok(()) => {
                self.summary.segments_logged += 1;
                let entry = self.summary.per_label.entry(segment.label.clone()).or_insert((0, 0.0));
                entry.0 += 1;
                entry.1 += segment.duration;
            }
            Err(e) => {
                warn!(
                    "Failed to log '{}' segment for track {}: {}",
                    segment.label, segment.track_id, e
                );
                self.summary.segments_failed += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MemoryLog;
    use crate::error::LogError;
    use crate::features::fixtures::posture;
    use crate::observation::{BodyObservation, Observation};

    struct BrokenSink;

    impl SegmentSink for BrokenSink {
        fn append(&mut self, _segment: &Segment) -> Result<(), LogError> {
            Err(LogError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk full")))
        }

        fn records_written(&self) -> usize {
            0
        }
    }

    fn config() -> EngineConfig {
        EngineConfig {
            stabilization_window: 4,
            min_confident_frames: 2,
            liveness_timeout: 1.0,
            min_segment_duration: 0.1,
            ..Default::default()
        }
    }

    fn session<S: SegmentSink>(sink: S) -> Session<S> {
        let config = config();
        let classifier = build_classifier(&ClassifierKind::Rules, &config).unwrap();
        Session::new(TrackManager::new(classifier, &config), sink)
    }

    fn frame(timestamp: f64, bodies: Vec<(i64, Observation)>) -> Frame {
        Frame {
            timestamp,
            bodies: bodies
                .into_iter()
                .map(|(id, observation)| BodyObservation {
                    track_id: TrackId::Int(id),
                    observation,
                })
                .collect(),
        }
    }

    fn standing() -> Observation {
        Observation::from_pose(posture(150.0, 0.3))
    }

    #[test]
    fn test_empty_frames_still_expire_tracks() {
        let mut session = session(MemoryLog::new());
        session.process_frame(&frame(0.0, vec![(1, standing())]));
        session.process_frame(&frame(0.1, vec![(1, standing())]));

        let report = session.process_frame(&frame(0.5, vec![]));
        assert!(report.expired.is_empty());

        let report = session.process_frame(&frame(1.5, vec![]));
        assert_eq!(report.expired.len(), 1);
        assert_eq!(session.sink().segments().len(), 1);
        assert!(session.manager().is_empty());
    }

    #[test]
    fn test_finish_flushes_once() {
        let mut session = session(MemoryLog::new());
        session.process_frame(&frame(0.0, vec![(4, standing())]));
        session.process_frame(&frame(0.05, vec![(4, standing())]));

        assert_eq!(session.finish().segments_logged, 1);
        assert_eq!(session.finish().segments_logged, 1);
        let log = session.into_sink();
        assert_eq!(log.segments()[0].label, "Standing");
    }

    #[test]
    fn test_sink_failures_do_not_stop_processing() {
        let mut session = session(BrokenSink);
        session.process_frame(&frame(0.0, vec![(1, standing())]));
        session.process_frame(&frame(0.1, vec![(1, standing())]));
        session.process_frame(&frame(2.0, vec![(2, standing())]));

        let summary = session.finish();
        assert_eq!(summary.frames, 3);
        assert_eq!(summary.segments_failed, 1);
        assert_eq!(summary.segments_logged, 0);
    }

    #[test]
    fn test_sequence_classifier_requires_model() {
        let kind = ClassifierKind::Sequence {
            model: PathBuf::from("/nonexistent/model.json"),
            labels: PathBuf::from("/nonexistent/labels.json"),
        };
        assert!(build_classifier(&kind, &config()).is_err());
    }

    #[test]
    fn test_run_skips_malformed_frames() {
        let bad = serde_json::from_str::<Frame>("{").unwrap_err();
        let frames = vec![
            Ok(frame(0.0, vec![(1, standing())])),
            Err(ReplayError::Parse { line: 2, source: bad }),
            Ok(frame(0.1, vec![(1, standing())])),
        ];
        let mut session = session(MemoryLog::new());
        let summary = session.run(frames).unwrap();
        assert_eq!(summary.frames, 2);
        assert_eq!(summary.per_label.get("Standing").map(|e| e.0), Some(1));
    }
}
