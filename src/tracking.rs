// src/tracking.rs - Identity-keyed track state and the per-frame pipeline
use crate::classifier::{ActionLabel, FrameClassifier, KeypointHistory};
use crate::config::EngineConfig;
use crate::observation::{Observation, TrackId};
use crate::segment::{Segment, SegmentTracker};
use crate::stabilizer::{LabelHistory, LabelStabilizer};
use std::collections::BTreeMap;
use tracing::debug;

/// Everything the engine remembers about one tracked body.
pub struct TrackState {
    keypoints: KeypointHistory,
    labels: LabelHistory,
    segment: SegmentTracker,
    last_update_time: f64,
}

impl TrackState {
    pub fn last_update_time(&self) -> f64 {
        self.last_update_time
    }

    pub fn committed_label(&self) -> &ActionLabel {
        self.labels.committed()
    }

    pub fn open_label(&self) -> Option<&str> {
        self.segment.open_label()
    }

    pub fn segment_start(&self) -> Option<f64> {
        self.segment.start_time()
    }

    pub fn keypoint_count(&self) -> usize {
        self.keypoints.len()
    }
}

/// Result of routing one body's observation through the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackUpdate {
    /// Stabilized label for display.
    pub label: ActionLabel,
    pub provisional: bool,
    /// Seconds the current segment has lasted, 0 when `label` has no open segment.
    pub duration: f64,
    /// This frame's unsmoothed classification.
    pub instant: ActionLabel,
    pub confidence: f64,
    /// Segment closed by a label change on this frame, if it was long enough to keep.
    pub closed: Option<Segment>,
}

impl TrackUpdate {
    fn idle() -> Self {
        Self {
            label: ActionLabel::Unknown,
            provisional: false,
            duration: 0.0,
            instant: ActionLabel::Unknown,
            confidence: 0.0,
            closed: None,
        }
    }
}

pub struct TrackManager {
    tracks: BTreeMap<TrackId, TrackState>,
    classifier: FrameClassifier,
    stabilizer: LabelStabilizer,
    liveness_timeout: f64,
    min_segment_duration: f64,
}

impl TrackManager {
    pub fn new(classifier: FrameClassifier, config: &EngineConfig) -> Self {
        Self {
            tracks: BTreeMap::new(),
            classifier,
            stabilizer: LabelStabilizer::new(config),
            liveness_timeout: config.liveness_timeout,
            min_segment_duration: config.min_segment_duration,
        }
    }

    /// Runs extraction, classification, stabilization and segmentation for
    /// one body, creating its track on first sighting.
    ///
    /// A non-finite `now` is treated as the track's last update time; for a
    /// track not seen before, the update is ignored.
    pub fn update(
        &mut self,
        track_id: &TrackId,
        observation: Option<&Observation>,
        now: f64,
    ) -> TrackUpdate {
        let now = if now.is_finite() {
            now
        } else {
            let Some(state) = self.tracks.get(track_id) else {
                debug!("Ignoring non-finite timestamp for unseen track {}", track_id);
                return TrackUpdate::idle();
            };
            debug!(
                "Track {} received non-finite timestamp {}; using {:.3}",
                track_id, now, state.last_update_time
            );
            state.last_update_time
        };

        let classifier = &self.classifier;
        let stabilizer = &self.stabilizer;
        let min_segment_duration = self.min_segment_duration;

        let state = self.tracks.entry(track_id.clone()).or_insert_with(|| {
            debug!("New track {} at {:.2}", track_id, now);
            TrackState {
                keypoints: KeypointHistory::new(classifier.history_capacity()),
                labels: stabilizer.new_history(),
                segment: SegmentTracker::new(track_id.clone(), min_segment_duration),
                last_update_time: now,
            }
        });

        // Wall-clock hosts can step backwards; never let time run in reverse for a track
        let now = if now < state.last_update_time {
            debug!(
                "Track {} received {:.3} after {:.3}; clamping",
                track_id, now, state.last_update_time
            );
            state.last_update_time
        } else {
            now
        };

        if let Some(vector) = classifier.keypoints(observation) {
            state.keypoints.push(vector);
        }
        let classification = classifier.classify(observation, &state.keypoints);
        let stabilized = stabilizer.observe(&mut state.labels, classification.label.clone());
        let closed = state.segment.advance(&stabilized.committed, now);
        state.last_update_time = now;

        let duration = match state.segment.open_label() {
            Some(open) if matches!(&stabilized.label, ActionLabel::Named(name) if name == open) => {
                state.segment.duration(now)
            }
            _ => 0.0,
        };

        TrackUpdate {
            label: stabilized.label,
            provisional: stabilized.provisional,
            duration,
            instant: classification.label,
            confidence: classification.confidence,
            closed,
        }
    }

    /// Expires tracks idle for at least the liveness timeout and flushes
    /// their open segments. Safe to call on every frame.
    pub fn sweep(&mut self, now: f64) -> Vec<Segment> {
        let expired: Vec<TrackId> = self
            .tracks
            .iter()
            .filter(|(_, state)| now - state.last_update_time >= self.liveness_timeout)
            .map(|(id, _)| id.clone())
            .collect();

        expired
            .into_iter()
            .filter_map(|id| {
                let mut state = self.tracks.remove(&id)?;
                debug!(
                    "Track {} expired ({:.2}s since last update)",
                    id,
                    now - state.last_update_time
                );
                state.segment.flush(state.last_update_time)
            })
            .collect()
    }

    /// Flushes and drops every track. Required before shutdown, otherwise
    /// open segments are lost.
    pub fn flush_all(&mut self) -> Vec<Segment> {
        std::mem::take(&mut self.tracks)
            .into_values()
            .filter_map(|mut state| state.segment.flush(state.last_update_time))
            .collect()
    }

    pub fn track(&self, track_id: &TrackId) -> Option<&TrackState> {
        self.tracks.get(track_id)
    }

    pub fn active_tracks(&self) -> impl Iterator<Item = &TrackId> {
        self.tracks.keys()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn open_segment_count(&self) -> usize {
        self.tracks.values().filter(|s| s.segment.is_open()).count()
    }
}
