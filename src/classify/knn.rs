//! K-Nearest Neighbors classifier
//!
//! Majority vote over the `n_neighbors` closest training rows, optionally
//! weighted by inverse distance.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};

use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SocialMeterError};
use crate::pipeline::traits::ClassifierBackend;

use super::{bad_param, training_matrix, ParamMap, ParamValue};

/// Distance metric for KNN
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Euclidean distance (L2)
    #[default]
    Euclidean,
    /// Manhattan distance (L1)
    Manhattan,
}

impl DistanceMetric {
    fn as_str(&self) -> &'static str {
        match self {
            DistanceMetric::Euclidean => "euclidean",
            DistanceMetric::Manhattan => "manhattan",
        }
    }
}

/// Weighting scheme for neighbors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightScheme {
    /// All neighbors have equal weight
    #[default]
    Uniform,
    /// Closer neighbors have more weight (inverse distance)
    Distance,
}

impl WeightScheme {
    fn as_str(&self) -> &'static str {
        match self {
            WeightScheme::Uniform => "uniform",
            WeightScheme::Distance => "distance",
        }
    }
}

/// K-Nearest Neighbors Classifier
#[derive(Debug, Clone)]
pub struct KNearestNeighbors {
    n_neighbors: usize,
    metric: DistanceMetric,
    weights: WeightScheme,
    /// `(samples, features)`; empty until fitted
    x_train: Array2<f64>,
    y_train: Vec<String>,
}

impl Default for KNearestNeighbors {
    fn default() -> Self {
        Self::new()
    }
}

impl KNearestNeighbors {
    pub fn new() -> Self {
        Self {
            n_neighbors: 5,
            metric: DistanceMetric::Euclidean,
            weights: WeightScheme::Uniform,
            x_train: Array2::zeros((0, 0)),
            y_train: Vec::new(),
        }
    }

    pub fn with_k(mut self, k: usize) -> Self {
        self.n_neighbors = k.max(1);
        self
    }

    pub fn with_weights(mut self, weights: WeightScheme) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }
}

/// Max-heap entry for partial sort (keeps k smallest distances)
#[derive(PartialEq)]
struct DistIdx(f64, usize);

impl Eq for DistIdx {}
impl PartialOrd for DistIdx {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for DistIdx {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .partial_cmp(&other.0)
            .unwrap_or(Ordering::Equal)
            .then(self.1.cmp(&other.1))
    }
}

fn compute_distance(a: ArrayView1<f64>, b: ArrayView1<f64>, metric: DistanceMetric) -> f64 {
    let diff = &a - &b;
    match metric {
        DistanceMetric::Euclidean => diff.dot(&diff).sqrt(),
        DistanceMetric::Manhattan => diff.mapv(f64::abs).sum(),
    }
}

impl ClassifierBackend for KNearestNeighbors {
    fn name(&self) -> &str {
        "knn"
    }

    fn fit(&mut self, features: &[Vec<f64>], labels: &[String]) -> Result<()> {
        self.x_train = training_matrix(features, labels)?;
        self.y_train = labels.to_vec();
        Ok(())
    }

    fn predict_one(&self, row: &[f64]) -> Result<String> {
        if !self.is_fitted() {
            return Err(SocialMeterError::not_trained("knn has not been fitted"));
        }
        let width = self.x_train.ncols();
        if row.len() != width {
            return Err(SocialMeterError::data(format!(
                "expected {width} features, got {}",
                row.len()
            )));
        }

        // Find k nearest using a max-heap, O(n log k)
        let row = ArrayView1::from(row);
        let k = self.n_neighbors.min(self.x_train.nrows());
        let mut heap = BinaryHeap::with_capacity(k + 1);
        for (i, train) in self.x_train.rows().into_iter().enumerate() {
            let dist = compute_distance(row, train, self.metric);
            if heap.len() < k {
                heap.push(DistIdx(dist, i));
            } else if let Some(top) = heap.peek() {
                if dist < top.0 {
                    heap.pop();
                    heap.push(DistIdx(dist, i));
                }
            }
        }

        // Weighted vote; BTreeMap order makes ties resolve to the smallest label.
        let mut votes: BTreeMap<&str, f64> = BTreeMap::new();
        for DistIdx(dist, i) in heap {
            let weight = match self.weights {
                WeightScheme::Uniform => 1.0,
                WeightScheme::Distance => 1.0 / (dist + 1e-10),
            };
            *votes.entry(self.y_train[i].as_str()).or_insert(0.0) += weight;
        }
        votes
            .into_iter()
            .fold(None::<(&str, f64)>, |best, (label, w)| match best {
                Some((_, bw)) if w <= bw => best,
                _ => Some((label, w)),
            })
            .map(|(label, _)| label.to_string())
            .ok_or_else(|| SocialMeterError::backend("knn found no neighbors"))
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "n_neighbors" => match value.as_usize() {
                Some(k) if k >= 1 => self.n_neighbors = k,
                _ => return Err(bad_param(self.name(), name, value, "an integer >= 1")),
            },
            "weights" => {
                self.weights = match value.as_str() {
                    Some("uniform") => WeightScheme::Uniform,
                    Some("distance") => WeightScheme::Distance,
                    _ => {
                        return Err(bad_param(self.name(), name, value, "'uniform' or 'distance'"))
                    }
                }
            }
            "metric" => {
                self.metric = match value.as_str() {
                    Some("euclidean") => DistanceMetric::Euclidean,
                    Some("manhattan") => DistanceMetric::Manhattan,
                    _ => {
                        return Err(bad_param(
                            self.name(),
                            name,
                            value,
                            "'euclidean' or 'manhattan'",
                        ))
                    }
                }
            }
            other => {
                return Err(SocialMeterError::invalid_config(format!(
                    "knn has no parameter '{other}'"
                )))
            }
        }
        Ok(())
    }

    fn params(&self) -> ParamMap {
        let mut params = ParamMap::new();
        params.insert("n_neighbors".into(), ParamValue::Int(self.n_neighbors as i64));
        params.insert("weights".into(), ParamValue::Text(self.weights.as_str().into()));
        params.insert("metric".into(), ParamValue::Text(self.metric.as_str().into()));
        params
    }

    fn is_fitted(&self) -> bool {
        self.x_train.nrows() > 0
    }

    fn boxed_clone(&self) -> Box<dyn ClassifierBackend> {
        Box::new(self.clone())
    }
}
