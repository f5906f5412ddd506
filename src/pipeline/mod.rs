//! Pipeline composition, specification, validation, and execution.
//!
//! ## Submodules
//!
//! - [`traits`]: stage modules and the collaborator seams (extractors,
//!   transformers, classifier backends, sources, sinks)
//! - [`module`]: the five concrete stage modules
//! - [`link`]: the ordered module container for one stage
//! - [`runner`]: [`Pipeline`]: schema ownership, dispatch, training, copying
//! - [`observer`]: stage timing and debug hooks
//! - [`spec`], [`validation`], [`spec_builder`]: declarative JSON pipelines

pub mod error_code;
pub mod errors;
pub mod link;
pub mod module;
pub mod observer;
pub mod runner;
pub mod spec;
pub mod spec_builder;
pub mod traits;
pub mod validation;

pub use link::Link;
pub use module::{ClassifierModule, FeatureModule, InputModule, OutputModule, PreprocessModule};
pub use observer::{
    NoopObserver, PipelineObserver, StageOutcome, StageReport, StageTimingObserver,
};
pub use runner::{CompletionHandler, Pipeline, RunSummary};
pub use spec_builder::SpecPipelineBuilder;
pub use traits::{
    ClassifierBackend, FeatureExtractor, InputSource, Intake, ModuleId, Sink, StageModule,
    StageType, TextTransformer,
};
