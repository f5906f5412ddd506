//! Validation harness: k-fold cross-validation, pipeline comparison and
//! grid search over a pipeline's extracted features and classifier backend.

pub mod grid_search;
pub mod kfold;

pub use grid_search::{GridPoint, GridSearch, ParamGrid};
pub use kfold::{
    CrossValidationReport, CrossValidator, FoldResult, FoldSplit, KFold, RankedPipeline,
};
