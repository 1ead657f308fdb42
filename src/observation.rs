// src/observation.rs - Per-frame inputs handed to the engine by the host
use serde::{Deserialize, Serialize};
use std::fmt;

/// Body landmark indices of the 33-point pose topology.
pub mod pose_index {
    pub const LEFT_SHOULDER: usize = 11;
    pub const RIGHT_SHOULDER: usize = 12;
    pub const LEFT_WRIST: usize = 15;
    pub const RIGHT_WRIST: usize = 16;
    pub const LEFT_HIP: usize = 23;
    pub const RIGHT_HIP: usize = 24;
    pub const LEFT_KNEE: usize = 25;
    pub const RIGHT_KNEE: usize = 26;
    pub const LEFT_ANKLE: usize = 27;
    pub const RIGHT_ANKLE: usize = 28;
}

/// Wrist index inside a hand landmark set.
pub const HAND_WRIST: usize = 0;

fn full_visibility() -> f64 {
    1.0
}

/// A single 2D keypoint in normalized image coordinates.
///
/// Deserializes from either `{"x":..,"y":..,"visibility":..}` or `[x, y, visibility]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    #[serde(default = "full_visibility")]
    pub visibility: f64,
}

impl Landmark {
    pub fn new(x: f64, y: f64, visibility: f64) -> Self {
        Self { x, y, visibility }
    }
}

pub type LandmarkSet = Vec<Landmark>;

/// What the landmark extractor found for one tracked body in one frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    #[serde(default)]
    pub pose: Option<LandmarkSet>,
    #[serde(default)]
    pub hands: Vec<LandmarkSet>,
}

impl Observation {
    pub fn from_pose(pose: LandmarkSet) -> Self {
        Self {
            pose: Some(pose),
            hands: Vec::new(),
        }
    }

    pub fn with_hands(mut self, hands: Vec<LandmarkSet>) -> Self {
        self.hands = hands;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.pose.as_ref().map_or(true, |p| p.is_empty()) && self.hands.is_empty()
    }
}

/// Identity assigned by the external detector/tracker. Never invented by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TrackId {
    Int(i64),
    Name(String),
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackId::Int(id) => write!(f, "{}", id),
            TrackId::Name(name) => f.write_str(name),
        }
    }
}

impl From<i64> for TrackId {
    fn from(id: i64) -> Self {
        TrackId::Int(id)
    }
}

impl From<&str> for TrackId {
    fn from(name: &str) -> Self {
        TrackId::Name(name.to_string())
    }
}

/// One tracked body inside a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyObservation {
    pub track_id: TrackId,
    #[serde(flatten)]
    pub observation: Observation,
}

/// Everything the detector/tracker and landmark extractor produced for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub timestamp: f64,
    #[serde(default)]
    pub bodies: Vec<BodyObservation>,
}
