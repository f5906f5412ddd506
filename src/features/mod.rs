//! Feature vocabulary: extractors, their discretization, and preprocessing
//! transforms.

pub mod extractors;
pub mod preprocessors;

use std::sync::Arc;

use crate::discretize::Discretizer;
use crate::pipeline::traits::FeatureExtractor;
use crate::types::Value;

pub use extractors::{
    AdjectiveCount, AdjectiveRatio, EmoticonSentiment, ExcessiveCapitals, ExcessivePunctuation,
    HashtagCount, NegationParity, WordCount,
};
pub use preprocessors::{
    HashtagNormalizer, MentionNormalizer, NGrams, PosTagTransform, StopWordFilter,
    TokenizeTransform,
};

/// An extractor plus its (possibly empty) discretizer.
///
/// Immutable once built; pipelines and their deep copies share one instance
/// through an `Arc`.
#[derive(Debug, Clone)]
pub struct Feature {
    extractor: Arc<dyn FeatureExtractor>,
    discretizer: Discretizer,
}

impl Feature {
    pub fn new(extractor: Arc<dyn FeatureExtractor>) -> Self {
        Self {
            extractor,
            discretizer: Discretizer::default(),
        }
    }

    pub fn with_discretizer(mut self, discretizer: Discretizer) -> Self {
        self.discretizer = discretizer;
        self
    }

    pub fn name(&self) -> &str {
        self.extractor.name()
    }

    pub fn discretizer(&self) -> &Discretizer {
        &self.discretizer
    }

    /// Raw value when no rules are configured, else the discretized label
    /// (or [`Value::NoMatch`]).
    pub fn extract(&self, text: &str) -> Value {
        self.discretizer.apply(self.extractor.extract(text))
    }
}
