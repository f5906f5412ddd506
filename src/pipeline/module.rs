//! The five concrete stage modules.
//!
//! | Module | Stage | Writes |
//! |--------|-------|--------|
//! | [`InputModule`] | input | nothing (gates items without text) |
//! | [`PreprocessModule`] | preprocess | one derived field |
//! | [`FeatureModule`] | feature_extract | one derived field |
//! | [`ClassifierModule`] | classify | `classification` |
//! | [`OutputModule`] | output | outside the item (sinks) |

use std::sync::Arc;

use tracing::debug;

use crate::classify::LabelMapping;
use crate::errors::{Result, SocialMeterError};
use crate::features::Feature;
use crate::types::{Item, Value, TEXT_FIELD};

use super::traits::{
    ClassifierBackend, InputSource, ModuleId, Sink, StageModule, StageType, TextTransformer,
};

// ============================================================================
// InputModule
// ============================================================================

/// Owns the input source and gates normalized items.
#[derive(Debug)]
pub struct InputModule {
    id: ModuleId,
    source: Option<Box<dyn InputSource>>,
    allow_empty_text: bool,
}

impl InputModule {
    pub fn new(source: Box<dyn InputSource>) -> Self {
        Self {
            id: ModuleId::fresh(),
            source: Some(source),
            allow_empty_text: false,
        }
    }

    /// Let items without text through instead of dropping them.
    pub fn allow_empty_text(mut self, allow: bool) -> Self {
        self.allow_empty_text = allow;
        self
    }

    pub fn source_name(&self) -> Option<&str> {
        self.source.as_ref().map(|s| s.name())
    }

    pub(crate) fn take_source(&mut self) -> Option<Box<dyn InputSource>> {
        self.source.take()
    }

    pub(crate) fn restore_source(&mut self, source: Box<dyn InputSource>) {
        self.source = Some(source);
    }
}

impl StageModule for InputModule {
    const STAGE: StageType = StageType::Input;

    fn id(&self) -> ModuleId {
        self.id
    }

    fn process(&mut self, item: Item) -> Result<Option<Item>> {
        let has_text = item.text().map(|t| !t.trim().is_empty()).unwrap_or(false);
        if !has_text && !self.allow_empty_text {
            debug!(module = %self.id, "dropping item without text");
            return Ok(None);
        }
        Ok(Some(item))
    }

    fn deep_copy(&self) -> Self {
        Self {
            id: ModuleId::fresh(),
            source: self.source.as_ref().map(|s| s.boxed_clone()),
            allow_empty_text: self.allow_empty_text,
        }
    }
}

// ============================================================================
// PreprocessModule
// ============================================================================

/// Applies a [`TextTransformer`] to the previous preprocess output (or to
/// `text`) and stores the result under its key.
#[derive(Debug, Clone)]
pub struct PreprocessModule {
    id: ModuleId,
    transformer: Arc<dyn TextTransformer>,
    key: String,
    source_key: String,
}

impl PreprocessModule {
    /// Keyed by the transformer's name.
    pub fn new(transformer: Arc<dyn TextTransformer>) -> Self {
        let key = transformer.name().to_string();
        Self::with_key(transformer, key)
    }

    pub fn with_key(transformer: Arc<dyn TextTransformer>, key: impl Into<String>) -> Self {
        Self {
            id: ModuleId::fresh(),
            transformer,
            key: key.into(),
            source_key: TEXT_FIELD.to_string(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn source_key(&self) -> &str {
        &self.source_key
    }

    pub(crate) fn bind_source(&mut self, key: &str) {
        self.source_key = key.to_string();
    }
}

impl StageModule for PreprocessModule {
    const STAGE: StageType = StageType::Preprocess;

    fn id(&self) -> ModuleId {
        self.id
    }

    fn output_key(&self) -> Option<&str> {
        Some(&self.key)
    }

    fn process(&mut self, mut item: Item) -> Result<Option<Item>> {
        let input = match item.get(&self.source_key) {
            Some(v) if !v.is_empty() => v.clone(),
            _ => item.get(TEXT_FIELD).cloned().unwrap_or_default(),
        };
        if input.is_empty() {
            return Ok(Some(item));
        }
        let output = self.transformer.transform(&input)?;
        item.set_derived(&self.key, output)?;
        Ok(Some(item))
    }

    fn deep_copy(&self) -> Self {
        Self {
            id: ModuleId::fresh(),
            ..self.clone()
        }
    }
}

// ============================================================================
// FeatureModule
// ============================================================================

/// Extracts one feature from the latest preprocessed text.
#[derive(Debug, Clone)]
pub struct FeatureModule {
    id: ModuleId,
    feature: Arc<Feature>,
    key: String,
    source_key: String,
}

impl FeatureModule {
    /// Keyed by the extractor's name.
    pub fn new(feature: Feature) -> Self {
        let key = feature.name().to_string();
        Self::with_key(feature, key)
    }

    pub fn with_key(feature: Feature, key: impl Into<String>) -> Self {
        Self {
            id: ModuleId::fresh(),
            feature: Arc::new(feature),
            key: key.into(),
            source_key: TEXT_FIELD.to_string(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn source_key(&self) -> &str {
        &self.source_key
    }

    pub fn feature(&self) -> &Arc<Feature> {
        &self.feature
    }

    pub(crate) fn bind_source(&mut self, key: &str) {
        self.source_key = key.to_string();
    }

    /// The feature value of raw text, bypassing the item.
    pub fn extract(&self, text: &str) -> Value {
        self.feature.extract(text)
    }
}

impl StageModule for FeatureModule {
    const STAGE: StageType = StageType::FeatureExtract;

    fn id(&self) -> ModuleId {
        self.id
    }

    fn output_key(&self) -> Option<&str> {
        Some(&self.key)
    }

    fn process(&mut self, mut item: Item) -> Result<Option<Item>> {
        let value = {
            let text = item
                .text_at(&self.source_key)
                .or_else(|| item.text_at(TEXT_FIELD))
                .ok_or_else(|| {
                    SocialMeterError::data(format!("no text to extract '{}' from", self.key))
                })?;
            self.feature.extract(&text)
        };
        item.set_derived(&self.key, value)?;
        Ok(Some(item))
    }

    fn deep_copy(&self) -> Self {
        Self {
            id: ModuleId::fresh(),
            ..self.clone()
        }
    }
}

// ============================================================================
// ClassifierModule
// ============================================================================

/// Wraps a [`ClassifierBackend`] and remembers the feature order it was
/// trained with.
#[derive(Debug)]
pub struct ClassifierModule {
    id: ModuleId,
    backend: Box<dyn ClassifierBackend>,
    feature_keys: Vec<String>,
    labels: LabelMapping,
}

impl ClassifierModule {
    pub fn new(backend: Box<dyn ClassifierBackend>) -> Self {
        Self {
            id: ModuleId::fresh(),
            backend,
            feature_keys: Vec::new(),
            labels: LabelMapping::default(),
        }
    }

    pub fn with_label_mapping(mut self, labels: LabelMapping) -> Self {
        self.labels = labels;
        self
    }

    pub fn backend(&self) -> &dyn ClassifierBackend {
        self.backend.as_ref()
    }

    pub fn backend_mut(&mut self) -> &mut dyn ClassifierBackend {
        self.backend.as_mut()
    }

    /// Feature keys in the order rows are assembled for prediction.
    pub fn feature_keys(&self) -> &[String] {
        &self.feature_keys
    }

    pub fn label_mapping(&self) -> &LabelMapping {
        &self.labels
    }

    pub fn is_trained(&self) -> bool {
        !self.feature_keys.is_empty() && self.backend.is_fitted()
    }

    /// Bind the feature order and fit the backend.
    pub fn train(
        &mut self,
        feature_keys: Vec<String>,
        features: &[Vec<f64>],
        labels: &[String],
    ) -> Result<()> {
        if let Some(row) = features.iter().find(|r| r.len() != feature_keys.len()) {
            return Err(SocialMeterError::data(format!(
                "feature row has {} values for {} keys",
                row.len(),
                feature_keys.len()
            )));
        }
        self.backend.fit(features, labels)?;
        self.feature_keys = feature_keys;
        Ok(())
    }

    /// Assemble `item`'s feature row in trained key order.
    pub fn feature_row(&self, item: &Item) -> Result<Vec<f64>> {
        self.feature_keys
            .iter()
            .map(|key| {
                item.get(key)
                    .ok_or_else(|| SocialMeterError::UnknownField { field: key.clone() })?
                    .as_feature()
            })
            .collect()
    }
}

impl StageModule for ClassifierModule {
    const STAGE: StageType = StageType::Classify;

    fn id(&self) -> ModuleId {
        self.id
    }

    fn process(&mut self, mut item: Item) -> Result<Option<Item>> {
        if !self.is_trained() {
            return Err(SocialMeterError::not_trained(format!(
                "{} must be trained before classifying",
                self.backend.name()
            )));
        }
        let row = self.feature_row(&item)?;
        let label = self.backend.predict_one(&row)?;
        let display = self.labels.map(&label).to_string();
        item.set_classification(Value::Text(display))?;
        Ok(Some(item))
    }

    fn deep_copy(&self) -> Self {
        Self {
            id: ModuleId::fresh(),
            backend: self.backend.boxed_clone(),
            feature_keys: self.feature_keys.clone(),
            labels: self.labels.clone(),
        }
    }
}

// ============================================================================
// OutputModule
// ============================================================================

/// Hands classified items to a [`Sink`].
#[derive(Debug)]
pub struct OutputModule {
    id: ModuleId,
    sink: Box<dyn Sink>,
}

impl OutputModule {
    pub fn new(sink: Box<dyn Sink>) -> Self {
        Self {
            id: ModuleId::fresh(),
            sink,
        }
    }

    pub fn sink_name(&self) -> &str {
        self.sink.name()
    }
}

impl StageModule for OutputModule {
    const STAGE: StageType = StageType::Output;

    fn id(&self) -> ModuleId {
        self.id
    }

    fn process(&mut self, item: Item) -> Result<Option<Item>> {
        self.sink.consume(item)
    }

    fn deep_copy(&self) -> Self {
        Self {
            id: ModuleId::fresh(),
            sink: self.sink.boxed_clone(),
        }
    }
}
