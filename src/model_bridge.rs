// src/model_bridge.rs - Seam to the external sequence classifier
use crate::error::ModelError;
use crate::features::FeatureVector;
use serde::Deserialize;
use std::path::Path;

/// A trained model scoring a fixed-length window of keypoint vectors.
pub trait SequenceModel {
    fn num_classes(&self) -> usize;

    /// One score per class, indexed by class id. `window` is oldest first.
    fn predict(&self, window: &[&FeatureVector]) -> Result<Vec<f64>, ModelError>;
}

/// Class id to action name, as produced at training time.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelMap {
    classes: Vec<String>,
}

impl LabelMap {
    pub fn new(classes: Vec<String>) -> Self {
        Self { classes }
    }

    /// Reads a JSON array of class names.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let classes: Vec<String> = read_json(path.as_ref())?;
        if classes.is_empty() {
            return Err(ModelError::Empty(format!(
                "no classes in {}",
                path.as_ref().display()
            )));
        }
        Ok(Self { classes })
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn name(&self, class_id: usize) -> Option<&str> {
        self.classes.get(class_id).map(String::as_str)
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }
}

#[derive(Debug, Deserialize)]
struct TemplateFile {
    feature_len: usize,
    #[serde(default = "default_temperature")]
    temperature: f64,
    templates: Vec<Vec<f64>>,
}

fn default_temperature() -> f64 {
    0.05
}

/// Nearest-template model: the window is averaged into one vector and each
/// class is scored by a softmax over negative squared distances to its template.
#[derive(Debug, Clone)]
pub struct TemplateModel {
    feature_len: usize,
    temperature: f64,
    templates: Vec<Vec<f64>>,
}

impl TemplateModel {
    pub fn new(
        feature_len: usize,
        temperature: f64,
        templates: Vec<Vec<f64>>,
    ) -> Result<Self, ModelError> {
        if templates.is_empty() {
            return Err(ModelError::Empty("no class templates".to_string()));
        }
        if let Some(bad) = templates.iter().find(|t| t.len() != feature_len) {
            return Err(ModelError::Shape {
                expected: feature_len,
                found: bad.len(),
            });
        }
        if temperature <= 0.0 {
            return Err(ModelError::Empty(format!(
                "temperature must be positive, got {}",
                temperature
            )));
        }

        Ok(Self {
            feature_len,
            temperature,
            templates,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let file: TemplateFile = read_json(path.as_ref())?;
        Self::new(file.feature_len, file.temperature, file.templates)
    }
}

impl SequenceModel for TemplateModel {
    fn num_classes(&self) -> usize {
        self.templates.len()
    }

    fn predict(&self, window: &[&FeatureVector]) -> Result<Vec<f64>, ModelError> {
        if window.is_empty() {
            return Err(ModelError::Empty("empty window".to_string()));
        }

        let mut mean = vec![0.0; self.feature_len];
        for vector in window {
            if vector.len() != self.feature_len {
                return Err(ModelError::Shape {
                    expected: self.feature_len,
                    found: vector.len(),
                });
            }
            for (acc, value) in mean.iter_mut().zip(vector.as_slice()) {
                *acc += value;
            }
        }
        let n = window.len() as f64;
        mean.iter_mut().for_each(|v| *v /= n);

        let logits: Vec<f64> = self
            .templates
            .iter()
            .map(|template| {
                let dist: f64 = template
                    .iter()
                    .zip(&mean)
                    .map(|(t, m)| (t - m).powi(2))
                    .sum();
                -dist / self.temperature
            })
            .collect();

        // Shift by the max logit before exponentiating
        let max = logits.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
        let total: f64 = exps.iter().sum();
        Ok(exps.into_iter().map(|e| e / total).collect())
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, ModelError> {
    let text = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ModelError::Parse {
        path: path.display().to_string(),
        source,
    })
}
