//! Exhaustive hyperparameter search over a classifier backend.
//!
//! Each grid maps a parameter name to its candidate values; a search may hold
//! several grids, and every grid is expanded into its cartesian product. All
//! combinations share one feature matrix and one set of fold splits, and are
//! evaluated in parallel. Each rayon task owns its result, so nothing is
//! shared while scoring.

use std::collections::BTreeMap;

use rayon::prelude::*;
use tracing::{debug, info};

use super::kfold::{descending, run_folds, CrossValidationReport, KFold};
use crate::classify::{apply_params, ParamMap, ParamValue};
use crate::errors::{Result, SocialMeterError};
use crate::io::Corpus;
use crate::pipeline::runner::Pipeline;
use crate::pipeline::spec::RuntimeSpec;
use crate::pipeline::traits::{ClassifierBackend, StageType};

/// Candidate values per parameter name.
pub type ParamGrid = BTreeMap<String, Vec<ParamValue>>;

/// One evaluated parameter combination.
#[derive(Debug, Clone)]
pub struct GridPoint {
    pub params: ParamMap,
    pub outcome: Result<CrossValidationReport>,
}

impl GridPoint {
    /// Mean cross-validated accuracy; `None` when the point failed.
    pub fn mean(&self) -> Option<f64> {
        self.outcome
            .as_ref()
            .ok()
            .and_then(CrossValidationReport::mean)
    }
}

/// Grid search configuration.
#[derive(Debug, Clone, Default)]
pub struct GridSearch {
    grids: Vec<ParamGrid>,
    kfold: KFold,
    runtime: RuntimeSpec,
}

impl GridSearch {
    pub fn new(grids: Vec<ParamGrid>) -> Self {
        Self {
            grids,
            ..Self::default()
        }
    }

    pub fn with_kfold(mut self, kfold: KFold) -> Self {
        self.kfold = kfold;
        self
    }

    /// Cap the worker pool. Without a cap rayon's global pool is used.
    pub fn with_max_threads(mut self, max_threads: usize) -> Self {
        self.runtime.max_threads = Some(max_threads);
        self
    }

    /// Take fold count and threading from a spec's runtime section.
    pub fn with_runtime(mut self, runtime: &RuntimeSpec) -> Self {
        self.kfold = KFold::new(runtime.effective_folds());
        self.runtime = runtime.clone();
        self
    }

    pub fn grids(&self) -> &[ParamGrid] {
        &self.grids
    }

    /// Every parameter combination, grid by grid. Within a grid, the last
    /// parameter name (in sorted order) varies fastest. With no grids the
    /// single candidate is the empty map, which scores the backend as is.
    pub fn candidates(&self) -> Vec<ParamMap> {
        if self.grids.is_empty() {
            return vec![ParamMap::new()];
        }
        self.grids.iter().flat_map(expand).collect()
    }

    /// Search over `pipeline`'s classifier backend on `corpus`.
    pub fn search_pipeline(&self, pipeline: &Pipeline, corpus: &Corpus) -> Result<Vec<GridPoint>> {
        let classifier = pipeline.classifier().ok_or(SocialMeterError::NotReady {
            stages: vec![StageType::Classify],
        })?;
        let features = pipeline.extract_features(corpus.texts())?;
        self.search_backend(classifier.backend(), &features, corpus.labels())
    }

    /// Search over `backend` on a precomputed feature matrix.
    ///
    /// Returns points sorted by mean accuracy, best first; points whose
    /// parameters were rejected or whose folds all failed come last.
    pub fn search_backend(
        &self,
        backend: &dyn ClassifierBackend,
        features: &[Vec<f64>],
        labels: &[String],
    ) -> Result<Vec<GridPoint>> {
        if features.len() != labels.len() {
            return Err(SocialMeterError::data(format!(
                "{} feature rows but {} labels",
                features.len(),
                labels.len()
            )));
        }
        let splits = self.kfold.split(labels)?;
        let candidates = self.candidates();
        info!(
            candidates = candidates.len(),
            folds = splits.len(),
            threads = ?self.runtime.effective_threads(),
            "starting grid search"
        );

        let mut points = self.runtime.scoped(|| {
            candidates
                .into_par_iter()
                .map(|params| {
                    let mut model = backend.boxed_clone();
                    let outcome = apply_params(model.as_mut(), &params).and_then(|()| {
                        let report = run_folds(model.as_ref(), &splits, features, labels);
                        report.summary().map(|_| report)
                    });
                    debug!(params = ?params, ok = outcome.is_ok(), "grid point evaluated");
                    GridPoint { params, outcome }
                })
                .collect::<Vec<_>>()
        })?;

        points.sort_by(|a, b| descending(a.mean(), b.mean()));
        Ok(points)
    }
}

/// Cartesian product of one grid. An empty grid yields one empty map; a
/// parameter with no candidates yields nothing.
fn expand(grid: &ParamGrid) -> Vec<ParamMap> {
    grid.iter().fold(vec![ParamMap::new()], |acc, (name, values)| {
        acc.iter()
            .flat_map(|partial| {
                values.iter().map(move |value| {
                    let mut next = partial.clone();
                    next.insert(name.clone(), value.clone());
                    next
                })
            })
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::KNearestNeighbors;

    fn grid(entries: &[(&str, Vec<ParamValue>)]) -> ParamGrid {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn ints(values: &[i64]) -> Vec<ParamValue> {
        values.iter().map(|&v| ParamValue::Int(v)).collect()
    }

    fn texts(values: &[&str]) -> Vec<ParamValue> {
        values.iter().map(|v| ParamValue::Text(v.to_string())).collect()
    }

    #[test]
    fn test_expand_cartesian_product() {
        let search = GridSearch::new(vec![
            grid(&[
                ("n_neighbors", ints(&[1, 3])),
                ("weights", texts(&["uniform", "distance"])),
            ]),
            grid(&[("n_neighbors", ints(&[5]))]),
        ]);
        let candidates = search.candidates();
        assert_eq!(candidates.len(), 5);
        assert_eq!(candidates[0]["n_neighbors"], ParamValue::Int(1));
        assert_eq!(candidates[1]["weights"], ParamValue::Text("distance".into()));
        assert_eq!(candidates[4].len(), 1);
    }

    #[test]
    fn test_expand_edge_cases() {
        assert_eq!(expand(&ParamGrid::new()), vec![ParamMap::new()]);
        assert!(expand(&grid(&[("n_neighbors", vec![])])).is_empty());
    }

    fn clustered() -> (Vec<Vec<f64>>, Vec<String>) {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for i in 0..12 {
            let class = i % 2;
            features.push(vec![class as f64 * 5.0 + (i as f64) * 0.01]);
            labels.push(class.to_string());
        }
        (features, labels)
    }

    #[test]
    fn test_search_ranks_and_keeps_failures_last() {
        let (features, labels) = clustered();
        let search = GridSearch::new(vec![grid(&[
            ("n_neighbors", vec![ParamValue::Int(1), ParamValue::Text("x".into())]),
        ])])
        .with_kfold(KFold::new(3))
        .with_max_threads(2);

        let points = search
            .search_backend(&KNearestNeighbors::new(), &features, &labels)
            .unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].mean(), Some(1.0));
        assert_eq!(points[0].params["n_neighbors"], ParamValue::Int(1));
        assert!(points[1].outcome.as_ref().unwrap_err().is_configuration());
    }

    #[test]
    fn test_search_does_not_touch_backend() {
        let (features, labels) = clustered();
        let backend = KNearestNeighbors::new();
        let before = backend.params();
        GridSearch::new(vec![grid(&[("n_neighbors", ints(&[1, 3, 5]))])])
            .with_kfold(KFold::new(3))
            .search_backend(&backend, &features, &labels)
            .unwrap();
        assert_eq!(backend.params(), before);
        assert!(!backend.is_fitted());
    }

    #[test]
    fn test_no_grids_scores_current_params() {
        let (features, labels) = clustered();
        let search = GridSearch::new(Vec::new()).with_kfold(KFold::new(3));
        assert_eq!(search.candidates(), vec![ParamMap::new()]);

        let points = search
            .search_backend(&KNearestNeighbors::new().with_k(1), &features, &labels)
            .unwrap();
        assert_eq!(points.len(), 1);
        assert!(points[0].params.is_empty());
        assert_eq!(points[0].mean(), Some(1.0));
    }

    #[test]
    fn test_search_needs_a_classifier() {
        let err = GridSearch::default()
            .search_pipeline(&Pipeline::new(), &Corpus::default())
            .unwrap_err();
        assert!(err.is_not_ready());
    }
}
