//! Stage and capability trait definitions for the pipeline.
//!
//! A pipeline has five stage boundaries, each named by a [`StageType`]. The
//! unit of work at every boundary is a [`StageModule`]; modules of one stage
//! type are collected by a typed [`Link`](super::link::Link), so a feature
//! module can never end up in the classifier link.
//!
//! The external collaborators a module wraps are one trait per capability:
//!
//! | Trait | Used by | Shipped implementations |
//! |-------|---------|-------------------------|
//! | [`InputSource`] | input stage | `MemorySource`, `JsonLinesSource` |
//! | [`TextTransformer`] | preprocess stage | normalizers, n-grams, stop words, tokens |
//! | [`FeatureExtractor`] | feature stage | word count, capitals, hashtags, ... |
//! | [`ClassifierBackend`] | classify stage | `GaussianNaiveBayes`, `KNearestNeighbors` |
//! | [`Sink`] | output stage | dict, console, CSV, collect |

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::classify::{ParamMap, ParamValue};
use crate::errors::Result;
use crate::types::{Item, Record, Schema, Value};

// ============================================================================
// StageType: the five fixed stage boundaries
// ============================================================================

/// One of the five pipeline stages, in dispatch order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageType {
    Input,
    Preprocess,
    FeatureExtract,
    Classify,
    Output,
}

impl StageType {
    /// Every stage in dispatch order.
    pub const ALL: [StageType; 5] = [
        StageType::Input,
        StageType::Preprocess,
        StageType::FeatureExtract,
        StageType::Classify,
        StageType::Output,
    ];

    /// Stable lowercase name, used in logs, spans and error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            StageType::Input => "input",
            StageType::Preprocess => "preprocess",
            StageType::FeatureExtract => "feature_extract",
            StageType::Classify => "classify",
            StageType::Output => "output",
        }
    }

    /// JSON pointer of this stage's section in a pipeline spec.
    pub fn spec_path(&self) -> &'static str {
        match self {
            StageType::Input => "/input",
            StageType::Preprocess => "/preprocess",
            StageType::FeatureExtract => "/features",
            StageType::Classify => "/classifier",
            StageType::Output => "/outputs",
        }
    }
}

impl fmt::Display for StageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// ModuleId: per-instance identity
// ============================================================================

static NEXT_MODULE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one module instance. Deep copies always get a fresh id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(u64);

impl ModuleId {
    /// Allocate a process-unique id.
    pub fn fresh() -> Self {
        Self(NEXT_MODULE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m{}", self.0)
    }
}

// ============================================================================
// StageModule: unit of pipeline work
// ============================================================================

/// A typed unit of pipeline work bound to exactly one stage.
///
/// # Contract
///
/// - **Preprocess / FeatureExtract** modules write exactly one derived field,
///   named by [`output_key`](Self::output_key).
/// - **Classify** modules write the classification field.
/// - **Output** modules may act outside the item and may consume it by
///   returning `Ok(None)`; any module returning `None` ends traversal.
/// - [`deep_copy`](Self::deep_copy) yields a module with a fresh
///   [`ModuleId`] that shares immutable configuration and clones mutable
///   state.
pub trait StageModule: Send {
    /// The stage this module type belongs to.
    const STAGE: StageType;

    fn id(&self) -> ModuleId;

    /// Name of the derived field this module writes, if any.
    fn output_key(&self) -> Option<&str> {
        None
    }

    /// Receive the pipeline's current schema.
    fn set_schema(&mut self, _schema: &Arc<Schema>) {}

    /// Process one item.
    fn process(&mut self, item: Item) -> Result<Option<Item>>;

    /// Independent copy with a fresh identity.
    fn deep_copy(&self) -> Self
    where
        Self: Sized;
}

// ============================================================================
// Capability traits
// ============================================================================

/// A preprocessing transform: text or tokens in, text or tokens out.
///
/// Input is whatever the previous preprocess step produced ([`Value::Text`]
/// or [`Value::Tokens`]); implementations must accept both.
pub trait TextTransformer: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn transform(&self, input: &Value) -> Result<Value>;
}

/// A pure `text → number` feature.
///
/// One instance is shared across a whole corpus and across deep copies, so
/// implementations must not hold per-call state.
pub trait FeatureExtractor: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn extract(&self, text: &str) -> f64;
}

/// A trainable classifier over dense numeric feature rows.
pub trait ClassifierBackend: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Fit on `features` (one row per sample) and parallel `labels`.
    fn fit(&mut self, features: &[Vec<f64>], labels: &[String]) -> Result<()>;

    /// Predict the label of one feature row.
    fn predict_one(&self, row: &[f64]) -> Result<String>;

    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<String>> {
        features.iter().map(|row| self.predict_one(row)).collect()
    }

    /// Fraction of rows whose prediction equals the given label.
    fn score(&self, features: &[Vec<f64>], labels: &[String]) -> Result<f64> {
        if features.is_empty() {
            return Ok(0.0);
        }
        let predicted = self.predict(features)?;
        let hits = predicted
            .iter()
            .zip(labels)
            .filter(|(p, y)| p == y)
            .count();
        Ok(hits as f64 / features.len() as f64)
    }

    /// Set one hyperparameter by name. Unknown names are configuration errors.
    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()>;

    /// Current hyperparameters.
    fn params(&self) -> ParamMap;

    fn is_fitted(&self) -> bool;

    fn boxed_clone(&self) -> Box<dyn ClassifierBackend>;
}

/// Final destination of a classified item.
pub trait Sink: Send + fmt::Debug {
    fn name(&self) -> &str;

    /// Consume an item. A returned item (possibly transformed) continues to
    /// the next sink and then the completion handler; `None` means consumed.
    fn consume(&mut self, item: Item) -> Result<Option<Item>>;

    fn boxed_clone(&self) -> Box<dyn Sink>;
}

/// Producer of raw records. Runs on its own thread during
/// [`Pipeline::start`](super::runner::Pipeline::start).
pub trait InputSource: Send + fmt::Debug {
    fn name(&self) -> &str;

    /// Push records into `intake` until exhausted or until `send` returns
    /// `false`.
    fn start(&mut self, intake: Intake) -> Result<()>;

    fn boxed_clone(&self) -> Box<dyn InputSource>;
}

// ============================================================================
// Intake: the input channel handle
// ============================================================================

/// Sending half of the input channel, handed to an [`InputSource`].
#[derive(Debug, Clone)]
pub struct Intake {
    tx: Sender<Record>,
}

impl Intake {
    pub(crate) fn new(tx: Sender<Record>) -> Self {
        Self { tx }
    }

    /// Submit one record. Returns `false` once the pipeline has stopped
    /// receiving; the source should then return.
    pub fn send(&self, record: Record) -> bool {
        self.tx.send(record).is_ok()
    }
}
