//! Classifier backends and the hyperparameter / label-mapping types shared
//! by the classify stage and the grid search.

pub mod knn;
pub mod naive_bayes;

use std::collections::BTreeMap;
use std::fmt;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SocialMeterError};
use crate::pipeline::traits::ClassifierBackend;

pub use knn::{DistanceMetric, KNearestNeighbors, WeightScheme};
pub use naive_bayes::GaussianNaiveBayes;

// ─── Hyperparameters ────────────────────────────────────────────────────────

/// One hyperparameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(i) => Some(*i as f64),
            ParamValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_usize(&self) -> Option<usize> {
        match self {
            ParamValue::Int(i) if *i >= 0 => Some(*i as usize),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{b}"),
            ParamValue::Int(i) => write!(f, "{i}"),
            ParamValue::Float(x) => write!(f, "{x}"),
            ParamValue::Text(s) => f.write_str(s),
        }
    }
}

/// Named hyperparameters, ordered by name.
pub type ParamMap = BTreeMap<String, ParamValue>;

/// Shorthand for an invalid hyperparameter value.
pub(crate) fn bad_param(backend: &str, name: &str, value: &ParamValue, expected: &str) -> SocialMeterError {
    SocialMeterError::invalid_config(format!(
        "{backend}: parameter '{name}' = {value} is invalid, expected {expected}"
    ))
}

/// Apply every entry of `params` to `backend`.
pub fn apply_params(backend: &mut dyn ClassifierBackend, params: &ParamMap) -> Result<()> {
    for (name, value) in params {
        backend.set_param(name, value)?;
    }
    Ok(())
}

/// Build a backend by registry name (`gaussian_nb`, `knn`).
pub fn backend_from_name(name: &str) -> Result<Box<dyn ClassifierBackend>> {
    match name {
        "gaussian_nb" | "naive_bayes" => Ok(Box::new(GaussianNaiveBayes::new())),
        "knn" | "k_neighbors" => Ok(Box::new(KNearestNeighbors::new())),
        other => Err(SocialMeterError::invalid_config(format!(
            "unknown classifier '{other}'"
        ))),
    }
}

/// Names accepted by [`backend_from_name`].
pub const BACKEND_NAMES: &[&str] = &["gaussian_nb", "naive_bayes", "knn", "k_neighbors"];

/// Check that features and labels describe the same non-empty, rectangular
/// sample set. Returns the feature count.
pub(crate) fn check_training_set(features: &[Vec<f64>], labels: &[String]) -> Result<usize> {
    if features.is_empty() {
        return Err(SocialMeterError::data("training set is empty"));
    }
    if features.len() != labels.len() {
        return Err(SocialMeterError::data(format!(
            "{} feature rows but {} labels",
            features.len(),
            labels.len()
        )));
    }
    let width = features[0].len();
    if let Some(i) = features.iter().position(|row| row.len() != width) {
        return Err(SocialMeterError::data(format!(
            "row {i} has {} features, expected {width}",
            features[i].len()
        )));
    }
    Ok(width)
}

/// Stack validated training rows into a `(samples, features)` matrix.
pub(crate) fn training_matrix(features: &[Vec<f64>], labels: &[String]) -> Result<Array2<f64>> {
    let width = check_training_set(features, labels)?;
    let flat: Vec<f64> = features.iter().flatten().copied().collect();
    Array2::from_shape_vec((features.len(), width), flat)
        .map_err(|e| SocialMeterError::data(format!("feature rows do not form a matrix: {e}")))
}

// ─── Label mapping ──────────────────────────────────────────────────────────

/// Display strings for predicted labels.
///
/// Labels without an entry are written verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelMapping {
    labels: BTreeMap<String, String>,
}

impl LabelMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// The usual binary sentiment mapping: `0` → negative, `1` → positive.
    pub fn binary_sentiment() -> Self {
        Self::new().with("0", "negative").with("1", "positive")
    }

    pub fn with(mut self, label: impl Into<String>, display: impl Into<String>) -> Self {
        self.labels.insert(label.into(), display.into());
        self
    }

    pub fn map<'a>(&'a self, label: &'a str) -> &'a str {
        self.labels.get(label).map(String::as_str).unwrap_or(label)
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
