// src/segment.rs - Per-track segment state machine
use crate::classifier::ActionLabel;
use crate::observation::TrackId;
use tracing::{debug, info};

/// A closed interval during which one track held one stabilized label.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub track_id: TrackId,
    pub label: String,
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,
}

#[derive(Debug, Clone, PartialEq)]
enum SegmentState {
    NoSegment,
    Open { label: String, start_time: f64 },
    Flushed,
}

#[derive(Debug, Clone)]
pub struct SegmentTracker {
    track_id: TrackId,
    state: SegmentState,
    min_duration: f64,
}

impl SegmentTracker {
    pub fn new(track_id: TrackId, min_duration: f64) -> Self {
        Self {
            track_id,
            state: SegmentState::NoSegment,
            min_duration,
        }
    }

    /// Feeds the committed label for frame time `now`. Returns the previous
    /// segment if the label changed and it outlasted the minimum duration.
    pub fn advance(&mut self, committed: &ActionLabel, now: f64) -> Option<Segment> {
        let next = match committed {
            ActionLabel::Named(name) => Some(name.as_str()),
            _ => None,
        };

        match &self.state {
            SegmentState::Flushed => return None,
            SegmentState::Open { label, .. } if Some(label.as_str()) == next => return None,
            _ => {}
        }

        let closed = self.close(now);
        match next {
            Some(name) => self.open(name, now),
            None => self.state = SegmentState::NoSegment,
        }
        closed.filter(|segment| {
            let durable = segment.duration > self.min_duration;
            if !durable {
                debug!(
                    "Dropping {:.2}s '{}' segment for track {}",
                    segment.duration, segment.label, self.track_id
                );
            }
            durable
        })
    }

    /// Terminal transition. The open segment is emitted regardless of the
    /// minimum duration since it is the track's real final state.
    pub fn flush(&mut self, end_time: f64) -> Option<Segment> {
        let closed = self.close(end_time);
        self.state = SegmentState::Flushed;
        closed
    }

    /// Seconds the open segment has lasted as of `now`, or 0 with no segment.
    pub fn duration(&self, now: f64) -> f64 {
        match &self.state {
            SegmentState::Open { start_time, .. } => (now - start_time).max(0.0),
            _ => 0.0,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, SegmentState::Open { .. })
    }

    pub fn is_flushed(&self) -> bool {
        self.state == SegmentState::Flushed
    }

    pub fn open_label(&self) -> Option<&str> {
        match &self.state {
            SegmentState::Open { label, .. } => Some(label.as_str()),
            _ => None,
        }
    }

    pub fn start_time(&self) -> Option<f64> {
        match &self.state {
            SegmentState::Open { start_time, .. } => Some(*start_time),
            _ => None,
        }
    }

    fn open(&mut self, label: &str, now: f64) {
        debug!("Track {} opened '{}' at {:.2}", self.track_id, label, now);
        self.state = SegmentState::Open {
            label: label.to_string(),
            start_time: now,
        };
    }

    fn close(&self, end_time: f64) -> Option<Segment> {
        let SegmentState::Open { label, start_time } = &self.state else {
            return None;
        };
        let end_time = end_time.max(*start_time);
        let segment = Segment {
            track_id: self.track_id.clone(),
            label: label.clone(),
            start_time: *start_time,
            end_time,
            duration: end_time - start_time,
        };
        info!(
            "Track {} finished '{}' after {:.2}s",
            segment.track_id, segment.label, segment.duration
        );
        Some(segment)
    }
}
