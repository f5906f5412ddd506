//! # socialmeter
//!
//! Composable sentiment-classification pipelines for social media text.
//!
//! A [`Pipeline`] moves each post through five stages in fixed order:
//! input → preprocess → feature extraction → classification → output. Every
//! stage holds an ordered list of interchangeable modules; attaching a module
//! extends the pipeline's output [`Schema`](types::Schema), which all stages
//! share.
//!
//! ## Features
//!
//! - **Discretized features**: bucket raw feature values with a small
//!   range-rule language (`"0_2"`, `"3<"`, `"-1-1"`)
//! - **Declarative pipelines**: build from a JSON [`PipelineSpec`] with
//!   every problem reported at once by the [`ValidationEngine`]
//! - **Validation harness**: stratified k-fold cross-validation, pipeline
//!   comparison and parallel grid search
//! - **Deep copies**: clone a pipeline's topology for side-by-side
//!   experiments

pub mod classify;
pub mod discretize;
pub mod errors;
pub mod evaluation;
pub mod features;
pub mod io;
pub mod nlp;
pub mod pipeline;
pub mod types;

// Re-export commonly used types
pub use errors::{Result, SocialMeterError};
pub use types::{Item, Record, Schema, Value};

pub use classify::{GaussianNaiveBayes, KNearestNeighbors, LabelMapping, ParamMap, ParamValue};
pub use discretize::{DiscreteRule, Discretizer};
pub use evaluation::{CrossValidationReport, CrossValidator, GridSearch, KFold};
pub use features::Feature;
pub use io::Corpus;
pub use pipeline::error_code::ErrorCode;
pub use pipeline::errors::{PipelineRuntimeError, PipelineSpecError};
pub use pipeline::spec::PipelineSpec;
pub use pipeline::validation::{ValidationEngine, ValidationReport};
pub use pipeline::{Pipeline, RunSummary, SpecPipelineBuilder, StageType};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
