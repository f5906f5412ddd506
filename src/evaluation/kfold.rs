//! K-fold splitting and cross-validated accuracy.
//!
//! Features are extracted once per pipeline through
//! [`Pipeline::extract_features`], the same code path `train` uses; each fold
//! then fits a fresh clone of the pipeline's backend.

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::{Result, SocialMeterError};
use crate::io::Corpus;
use crate::pipeline::runner::Pipeline;
use crate::pipeline::spec::{RuntimeSpec, DEFAULT_FOLDS};
use crate::pipeline::traits::{ClassifierBackend, StageType};

// ============================================================================
// Splitting
// ============================================================================

/// One train/test partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoldSplit {
    pub fold_idx: usize,
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
}

/// K-fold split configuration.
///
/// Stratified splitting (the default) keeps each fold's class balance close
/// to the corpus's. Without shuffling, splits are deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KFold {
    n_folds: usize,
    stratified: bool,
    shuffle: bool,
    random_state: Option<u64>,
}

impl Default for KFold {
    fn default() -> Self {
        Self {
            n_folds: DEFAULT_FOLDS,
            stratified: true,
            shuffle: false,
            random_state: None,
        }
    }
}

impl KFold {
    pub fn new(n_folds: usize) -> Self {
        Self {
            n_folds,
            ..Self::default()
        }
    }

    pub fn with_stratified(mut self, stratified: bool) -> Self {
        self.stratified = stratified;
        self
    }

    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// Seed for shuffling. Entropy-seeded when unset.
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn n_folds(&self) -> usize {
        self.n_folds
    }

    fn rng(&self) -> ChaCha8Rng {
        match self.random_state {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        }
    }

    /// Partition `labels.len()` samples into `n_folds` train/test splits.
    ///
    /// Every sample appears in exactly one test fold. Indices inside each
    /// split are ascending.
    pub fn split(&self, labels: &[String]) -> Result<Vec<FoldSplit>> {
        let n_samples = labels.len();
        if self.n_folds < 2 {
            return Err(SocialMeterError::invalid_config(format!(
                "n_folds must be at least 2, got {}",
                self.n_folds
            )));
        }
        if n_samples < self.n_folds {
            return Err(SocialMeterError::data(format!(
                "cannot split {n_samples} samples into {} folds",
                self.n_folds
            )));
        }

        let folds = if self.stratified {
            self.stratified_folds(labels)
        } else {
            self.plain_folds(n_samples)
        };

        Ok((0..self.n_folds)
            .map(|fold_idx| {
                let mut test_indices = folds[fold_idx].clone();
                test_indices.sort_unstable();
                let mut train_indices: Vec<usize> = folds
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != fold_idx)
                    .flat_map(|(_, f)| f.iter().copied())
                    .collect();
                train_indices.sort_unstable();
                FoldSplit {
                    fold_idx,
                    train_indices,
                    test_indices,
                }
            })
            .collect())
    }

    /// Contiguous blocks; the first `n % k` folds take one extra sample.
    fn plain_folds(&self, n_samples: usize) -> Vec<Vec<usize>> {
        let mut indices: Vec<usize> = (0..n_samples).collect();
        if self.shuffle {
            indices.shuffle(&mut self.rng());
        }
        let base = n_samples / self.n_folds;
        let remainder = n_samples % self.n_folds;
        let mut folds = Vec::with_capacity(self.n_folds);
        let mut current = 0;
        for i in 0..self.n_folds {
            let size = if i < remainder { base + 1 } else { base };
            folds.push(indices[current..current + size].to_vec());
            current += size;
        }
        folds
    }

    /// Deal each class round-robin across folds, continuing where the
    /// previous class stopped so fold sizes stay within one of each other.
    fn stratified_folds(&self, labels: &[String]) -> Vec<Vec<usize>> {
        let mut by_class: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (idx, label) in labels.iter().enumerate() {
            by_class.entry(label.as_str()).or_default().push(idx);
        }
        if self.shuffle {
            let mut rng = self.rng();
            for indices in by_class.values_mut() {
                indices.shuffle(&mut rng);
            }
        }

        let mut folds: Vec<Vec<usize>> = vec![Vec::new(); self.n_folds];
        let mut offset = 0;
        for indices in by_class.values() {
            for (i, &idx) in indices.iter().enumerate() {
                folds[(offset + i) % self.n_folds].push(idx);
            }
            offset += indices.len();
        }
        folds
    }
}

// ============================================================================
// Reports
// ============================================================================

/// Outcome of one fold.
#[derive(Debug, Clone, PartialEq)]
pub struct FoldResult {
    pub fold: usize,
    pub train_size: usize,
    pub test_size: usize,
    pub accuracy: Result<f64>,
}

/// Per-fold accuracies for one pipeline or backend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrossValidationReport {
    pub folds: Vec<FoldResult>,
}

impl CrossValidationReport {
    /// Accuracies of the folds that succeeded, in fold order.
    pub fn scores(&self) -> Vec<f64> {
        self.folds
            .iter()
            .filter_map(|f| f.accuracy.as_ref().ok().copied())
            .collect()
    }

    pub fn failures(&self) -> impl Iterator<Item = &FoldResult> {
        self.folds.iter().filter(|f| f.accuracy.is_err())
    }

    /// Mean accuracy over successful folds; `None` if none succeeded.
    pub fn mean(&self) -> Option<f64> {
        let scores = self.scores();
        if scores.is_empty() {
            return None;
        }
        Some(scores.iter().sum::<f64>() / scores.len() as f64)
    }

    /// Population standard deviation over successful folds.
    pub fn std_dev(&self) -> Option<f64> {
        let mean = self.mean()?;
        let scores = self.scores();
        let variance =
            scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / scores.len() as f64;
        Some(variance.sqrt())
    }

    /// `(mean_accuracy, std_dev)`. Fails only when every fold failed.
    pub fn summary(&self) -> Result<(f64, f64)> {
        match (self.mean(), self.std_dev()) {
            (Some(mean), Some(std)) => Ok((mean, std)),
            _ => Err(self
                .failures()
                .next()
                .and_then(|f| f.accuracy.clone().err())
                .unwrap_or_else(|| SocialMeterError::backend("no folds were evaluated"))),
        }
    }

    /// Two standard deviations, the usual "± error" printed next to the mean.
    pub fn error_margin(&self) -> Option<f64> {
        self.std_dev().map(|s| 2.0 * s)
    }

    /// `true` when every fold succeeded.
    pub fn is_complete(&self) -> bool {
        !self.folds.is_empty() && self.failures().next().is_none()
    }
}

/// One entry of [`CrossValidator::compare_pipelines`].
#[derive(Debug, Clone)]
pub struct RankedPipeline {
    /// Position in the input slice.
    pub index: usize,
    pub name: String,
    pub result: Result<CrossValidationReport>,
}

impl RankedPipeline {
    pub fn mean(&self) -> Option<f64> {
        self.result.as_ref().ok().and_then(CrossValidationReport::mean)
    }
}

// ============================================================================
// CrossValidator
// ============================================================================

/// Runs k-fold cross-validation over pipelines or bare backends.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrossValidator {
    kfold: KFold,
}

impl CrossValidator {
    pub fn new(kfold: KFold) -> Self {
        Self { kfold }
    }

    /// Stratified, unshuffled folds with `runtime`'s fold count.
    pub fn from_runtime(runtime: &RuntimeSpec) -> Self {
        Self::new(KFold::new(runtime.effective_folds()))
    }

    pub fn kfold(&self) -> &KFold {
        &self.kfold
    }

    /// Cross-validate `pipeline`'s classifier on `corpus`.
    ///
    /// The pipeline itself is never trained; each fold fits its own clone of
    /// the backend.
    pub fn validate_pipeline(
        &self,
        pipeline: &Pipeline,
        corpus: &Corpus,
    ) -> Result<CrossValidationReport> {
        let classifier = pipeline.classifier().ok_or(SocialMeterError::NotReady {
            stages: vec![StageType::Classify],
        })?;
        let features = pipeline.extract_features(corpus.texts())?;
        self.validate_backend(classifier.backend(), &features, corpus.labels())
    }

    /// Cross-validate `backend` on a precomputed feature matrix.
    ///
    /// Split errors are returned; fold errors are recorded in the report.
    pub fn validate_backend(
        &self,
        backend: &dyn ClassifierBackend,
        features: &[Vec<f64>],
        labels: &[String],
    ) -> Result<CrossValidationReport> {
        if features.len() != labels.len() {
            return Err(SocialMeterError::data(format!(
                "{} feature rows but {} labels",
                features.len(),
                labels.len()
            )));
        }
        let splits = self.kfold.split(labels)?;
        Ok(run_folds(backend, &splits, features, labels))
    }

    /// Validate each pipeline and rank them by mean accuracy, best first.
    ///
    /// Unnamed pipelines are reported as `pipeline-<index>`; pipelines whose
    /// validation failed rank last, in input order.
    pub fn compare_pipelines(&self, pipelines: &[Pipeline], corpus: &Corpus) -> Vec<RankedPipeline> {
        let mut ranked: Vec<RankedPipeline> = pipelines
            .iter()
            .enumerate()
            .map(|(index, pipeline)| {
                let name = pipeline
                    .name()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("pipeline-{index}"));
                let result = self.validate_pipeline(pipeline, corpus);
                if let Err(err) = &result {
                    warn!(pipeline = %name, error = %err, "validation failed");
                }
                RankedPipeline {
                    index,
                    name,
                    result,
                }
            })
            .collect();
        ranked.sort_by(|a, b| descending(a.mean(), b.mean()));
        ranked
    }
}

/// Order by score descending with `None` last. Stable sorts keep ties in
/// input order.
pub(crate) fn descending(a: Option<f64>, b: Option<f64>) -> std::cmp::Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.total_cmp(&a),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    }
}

fn gather<T: Clone>(values: &[T], indices: &[usize]) -> Vec<T> {
    indices.iter().map(|&i| values[i].clone()).collect()
}

/// Fit and score a clone of `backend` on every split.
pub(crate) fn run_folds(
    backend: &dyn ClassifierBackend,
    splits: &[FoldSplit],
    features: &[Vec<f64>],
    labels: &[String],
) -> CrossValidationReport {
    let folds = splits
        .iter()
        .map(|split| {
            let train_x = gather(features, &split.train_indices);
            let train_y = gather(labels, &split.train_indices);
            let test_x = gather(features, &split.test_indices);
            let test_y = gather(labels, &split.test_indices);

            let mut model = backend.boxed_clone();
            let accuracy = model
                .fit(&train_x, &train_y)
                .and_then(|()| model.score(&test_x, &test_y));
            match &accuracy {
                Ok(acc) => debug!(fold = split.fold_idx, accuracy = acc, "fold scored"),
                Err(err) => warn!(fold = split.fold_idx, error = %err, "fold failed"),
            }
            FoldResult {
                fold: split.fold_idx,
                train_size: split.train_indices.len(),
                test_size: split.test_indices.len(),
                accuracy,
            }
        })
        .collect();
    CrossValidationReport { folds }
}
