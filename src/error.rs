// src/error.rs
use thiserror::Error;

// Loading or running the external sequence model
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Failed to read model file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
    #[error("Model expects feature vectors of length {expected}, got {found}")]
    Shape { expected: usize, found: usize },
    #[error("Model has {model_classes} classes but the label mapping has {labels}")]
    LabelMismatch { model_classes: usize, labels: usize },
    #[error("Model definition is empty: {0}")]
    Empty(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

// Segment sink failures, reported to the host but never fatal
#[derive(Error, Debug)]
pub enum LogError {
    #[error("Segment log I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Segment log CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Segment log JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("Failed to open observation stream {path}: {source}")]
    Open {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to read observation stream: {0}")]
    Read(#[from] std::io::Error),
    #[error("Malformed frame at line {line}: {source}")]
    Parse {
        line: usize,
        source: serde_json::Error,
    },
}
