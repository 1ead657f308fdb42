// src/lib.rs
//! Turns per-frame pose observations of tracked bodies into timestamped
//! action segments ("person 7 was Sitting for 3.4s").

pub mod app;
pub mod classifier;
pub mod config;
pub mod data;
pub mod error;
pub mod features;
pub mod history;
pub mod model_bridge;
pub mod observation;
pub mod replay;
pub mod segment;
pub mod stabilizer;
pub mod tracking;

pub use app::{build_classifier, ClassifierKind, Session, SessionSummary};
pub use classifier::{ActionLabel, FrameClassifier};
pub use config::EngineConfig;
pub use observation::{Frame, Landmark, Observation, TrackId};
pub use segment::Segment;
pub use tracking::{TrackManager, TrackUpdate};
