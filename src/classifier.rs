// src/classifier.rs - Per-frame action classification strategies
use crate::config::{EngineConfig, RuleThresholds};
use crate::error::ModelError;
use crate::features::{self, FeatureVector, GeometricFeatures};
use crate::history::BoundedHistory;
use crate::model_bridge::{LabelMap, SequenceModel};
use crate::observation::Observation;
use std::fmt;
use tracing::warn;

pub const CLAPPING: &str = "Clapping";
pub const SITTING: &str = "Sitting";
pub const STANDING: &str = "Standing";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActionLabel {
    Unknown,
    InsufficientData,
    Named(String),
}

impl ActionLabel {
    pub fn named(name: impl Into<String>) -> Self {
        ActionLabel::Named(name.into())
    }

    /// Only named labels count as votes.
    pub fn is_action(&self) -> bool {
        matches!(self, ActionLabel::Named(_))
    }
}

impl fmt::Display for ActionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionLabel::Unknown => f.write_str("Unknown"),
            ActionLabel::InsufficientData => f.write_str("Insufficient Data"),
            ActionLabel::Named(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub label: ActionLabel,
    pub confidence: f64,
}

impl Classification {
    fn unknown() -> Self {
        Self {
            label: ActionLabel::Unknown,
            confidence: 0.0,
        }
    }

    fn insufficient() -> Self {
        Self {
            label: ActionLabel::InsufficientData,
            confidence: 0.0,
        }
    }
}

/// Keypoint history kept per track for windowed classification.
pub type KeypointHistory = BoundedHistory<FeatureVector>;

/// Buffers the last N keypoint vectors and defers to a trained sequence model.
pub struct WindowedClassifier {
    model: Box<dyn SequenceModel>,
    labels: LabelMap,
    window_length: usize,
    min_confidence: f64,
    expected_landmarks: usize,
    pad_missing: bool,
}

impl WindowedClassifier {
    /// Fails when the model and label mapping disagree on the class count.
    pub fn new(
        model: Box<dyn SequenceModel>,
        labels: LabelMap,
        config: &EngineConfig,
    ) -> Result<Self, ModelError> {
        if model.num_classes() != labels.len() {
            return Err(ModelError::LabelMismatch {
                model_classes: model.num_classes(),
                labels: labels.len(),
            });
        }

        Ok(Self {
            model,
            labels,
            window_length: config.window_length,
            min_confidence: config.min_confidence,
            expected_landmarks: config.expected_landmarks,
            pad_missing: config.pad_missing,
        })
    }

    fn classify(&self, fresh: bool, history: &KeypointHistory) -> Classification {
        if !fresh {
            return Classification::unknown();
        }
        let Some(window) = history.latest(self.window_length) else {
            return Classification::insufficient();
        };

        let scores = match self.model.predict(&window) {
            Ok(scores) => scores,
            Err(e) => {
                warn!("Sequence model failed: {}", e);
                return Classification::unknown();
            }
        };

        let best = scores
            .iter()
            .copied()
            .enumerate()
            .fold(None, |best: Option<(usize, f64)>, (i, score)| match best {
                Some((_, top)) if top >= score => best,
                _ => Some((i, score)),
            });

        let Some((class_id, confidence)) = best else {
            return Classification::unknown();
        };
        let Some(name) = self.labels.name(class_id) else {
            warn!(
                "Model returned {} scores but only {} labels are mapped",
                scores.len(),
                self.labels.len()
            );
            return Classification::unknown();
        };

        if confidence < self.min_confidence {
            return Classification {
                label: ActionLabel::Unknown,
                confidence,
            };
        }

        Classification {
            label: ActionLabel::named(name),
            confidence,
        }
    }
}

/// Single-frame geometric rules: clapping first, then sitting, then standing.
#[derive(Debug, Clone)]
pub struct RuleClassifier {
    thresholds: RuleThresholds,
}

impl RuleClassifier {
    pub fn new(thresholds: RuleThresholds) -> Self {
        Self { thresholds }
    }

    pub fn classify_features(&self, features: &GeometricFeatures) -> Classification {
        let t = &self.thresholds;

        // A clap overrides whatever the legs are doing
        if let Some(distance) = features.hand_distance {
            if distance < t.clap_distance {
                return matched(CLAPPING);
            }
        }

        let Some(posture) = features.posture else {
            return Classification::unknown();
        };

        if posture.torso_gap < t.sit_max_gap && posture.leg_angle < t.sit_max_leg_angle {
            matched(SITTING)
        } else if posture.leg_angle > t.stand_min_leg_angle && posture.torso_gap > t.stand_min_gap {
            matched(STANDING)
        } else {
            Classification::unknown()
        }
    }

    fn classify(&self, observation: Option<&Observation>) -> Classification {
        let features = features::extract_geometry(observation, self.thresholds.min_visibility);
        self.classify_features(&features)
    }
}

fn matched(name: &str) -> Classification {
    Classification {
        label: ActionLabel::named(name),
        confidence: 1.0,
    }
}

/// Classification strategy, chosen once at construction.
pub enum FrameClassifier {
    Windowed(WindowedClassifier),
    Rules(RuleClassifier),
}

impl FrameClassifier {
    /// Keypoint history capacity each track needs for this strategy.
    pub fn history_capacity(&self) -> usize {
        match self {
            FrameClassifier::Windowed(w) => w.window_length * 2,
            FrameClassifier::Rules(_) => 0,
        }
    }

    /// Vector to append to the track's keypoint history, if any.
    pub fn keypoints(&self, observation: Option<&Observation>) -> Option<FeatureVector> {
        match self {
            FrameClassifier::Windowed(w) => {
                features::extract_keypoints(observation, w.expected_landmarks, w.pad_missing)
            }
            FrameClassifier::Rules(_) => None,
        }
    }

    /// Pure read of the current frame and the track's history.
    pub fn classify(
        &self,
        observation: Option<&Observation>,
        history: &KeypointHistory,
    ) -> Classification {
        match self {
            FrameClassifier::Windowed(w) => {
                let fresh = w.pad_missing
                    || observation
                        .and_then(|o| o.pose.as_ref())
                        .map_or(false, |pose| !pose.is_empty());
                w.classify(fresh, history)
            }
            FrameClassifier::Rules(r) => r.classify(observation),
        }
    }
}
