// src/config.rs
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Geometric thresholds for the rule classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleThresholds {
    pub min_visibility: f64,
    pub clap_distance: f64,
    pub sit_max_gap: f64,
    pub sit_max_leg_angle: f64,
    pub stand_min_leg_angle: f64,
    pub stand_min_gap: f64,
}

impl Default for RuleThresholds {
    fn default() -> Self {
        Self {
            min_visibility: 0.6,
            clap_distance: 0.08,
            sit_max_gap: 0.25,
            sit_max_leg_angle: 130.0,
            stand_min_leg_angle: 140.0,
            stand_min_gap: 0.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Vectors per classification window; keypoint history holds twice this.
    pub window_length: usize,
    pub min_confidence: f64,
    pub stabilization_window: usize,
    pub min_confident_frames: usize,
    pub provisional_min_votes: usize,
    /// Seconds without an update before a track is expired.
    pub liveness_timeout: f64,
    /// Intermediate segments must last longer than this to be logged.
    pub min_segment_duration: f64,
    /// Applied by the frame source, upstream of the engine.
    pub frame_skip: usize,
    pub pad_missing: bool,
    pub expected_landmarks: usize,
    /// Tie-break order when several labels reach `min_confident_frames`.
    pub label_precedence: Vec<String>,
    pub rules: RuleThresholds,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window_length: 10,
            min_confidence: 0.3,
            stabilization_window: 20,
            min_confident_frames: 8,
            provisional_min_votes: 2,
            liveness_timeout: 1.0,
            min_segment_duration: 0.1,
            frame_skip: 2,
            pad_missing: false,
            expected_landmarks: 33,
            label_precedence: vec![
                "Clapping".to_string(),
                "Sitting".to_string(),
                "Standing".to_string(),
            ],
            rules: RuleThresholds::default(),
        }
    }
}

impl EngineConfig {
    /// Loads a JSON config; omitted fields keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
            ConfigError::Invalid {
                field,
                reason: reason.into(),
            }
        }

        if self.window_length == 0 {
            return Err(invalid("window_length", "must be at least 1"));
        }
        if self.stabilization_window == 0 {
            return Err(invalid("stabilization_window", "must be at least 1"));
        }
        if self.min_confident_frames == 0 || self.min_confident_frames > self.stabilization_window {
            return Err(invalid(
                "min_confident_frames",
                format!("must be within 1..={}", self.stabilization_window),
            ));
        }
        if self.provisional_min_votes == 0 {
            return Err(invalid("provisional_min_votes", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(invalid("min_confidence", "must be within [0, 1]"));
        }
        if !(self.liveness_timeout > 0.0) {
            return Err(invalid("liveness_timeout", "must be positive"));
        }
        if !(self.min_segment_duration >= 0.0) {
            return Err(invalid("min_segment_duration", "must not be negative"));
        }
        if self.frame_skip == 0 {
            return Err(invalid("frame_skip", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.rules.min_visibility) {
            return Err(invalid("rules.min_visibility", "must be within [0, 1]"));
        }
        Ok(())
    }
}
