//! Spec-driven pipeline builder: maps a [`PipelineSpec`] to a [`Pipeline`].
//!
//! Runtime context that a JSON spec cannot carry (lexicons, emoticon tables,
//! custom sources and sinks) is supplied through `with_*` methods before
//! calling [`build`](SpecPipelineBuilder::build).
//!
//! # Usage
//!
//! ```ignore
//! let spec = PipelineSpec::from_json(json)?;
//! let sink = CollectSink::new();
//! let mut pipeline = SpecPipelineBuilder::new()
//!     .with_sink(Box::new(sink.clone()))
//!     .build_from_spec(&spec)?;
//! pipeline.train(&corpus)?;
//! pipeline.start()?;
//! ```

use std::sync::Arc;

use crate::classify::{apply_params, backend_from_name};
use crate::discretize::Discretizer;
use crate::errors::SocialMeterError;
use crate::features::{
    AdjectiveCount, AdjectiveRatio, EmoticonSentiment, ExcessiveCapitals, ExcessivePunctuation,
    Feature, HashtagCount, HashtagNormalizer, MentionNormalizer, NGrams, NegationParity,
    PosTagTransform, StopWordFilter, TokenizeTransform, WordCount,
};
use crate::io::{ConsoleSink, CsvSink, DictFormatSink, JsonLinesSource, MemorySource};
use crate::nlp::{EmoticonTable, MemoryLexicon, SentimentLexicon, StopwordList};
use crate::pipeline::error_code::ErrorCode;
use crate::pipeline::errors::PipelineSpecError;
use crate::pipeline::module::{ClassifierModule, FeatureModule, InputModule, PreprocessModule};
use crate::pipeline::runner::Pipeline;
use crate::pipeline::spec::{
    ClassifierSpec, FeatureSpec, FeatureType, InputSpec, InputType, OutputSpec, OutputType,
    PipelineSpec, PreprocessSpec, PreprocessType,
};
use crate::pipeline::traits::{FeatureExtractor, InputSource, Sink, TextTransformer};
use crate::pipeline::validation::ValidationEngine;
use crate::types::Schema;

type SpecResult<T> = std::result::Result<T, PipelineSpecError>;

/// Convert a module construction failure into a spec error at `path`.
fn module_error(path: impl Into<String>, err: SocialMeterError) -> PipelineSpecError {
    let code = match &err {
        SocialMeterError::InvalidRule { .. } => ErrorCode::InvalidRule,
        SocialMeterError::DuplicateField { .. } | SocialMeterError::FieldConflict { .. } => {
            ErrorCode::DuplicateKey
        }
        _ => ErrorCode::InvalidValue,
    };
    PipelineSpecError::new(code, path, err.to_string())
}

fn unknown_module(path: String, kind: &str, known: &[&str]) -> PipelineSpecError {
    PipelineSpecError::new(
        ErrorCode::UnknownModule,
        path,
        format!("unknown module type \"{kind}\""),
    )
    .with_hint(format!("Known types: {}", known.join(", ")))
}

// ─── SpecPipelineBuilder ───────────────────────────────────────────────────

/// Fluent builder that maps a [`PipelineSpec`] to a [`Pipeline`].
///
/// The builder is reusable: every call to [`build`](Self::build) produces an
/// independent pipeline, cloning any supplied source and sinks.
#[derive(Default)]
pub struct SpecPipelineBuilder {
    /// Lexicon for `adjective_ratio`. Falls back to the spec's `path`, then
    /// to [`MemoryLexicon::basic_english`].
    lexicon: Option<Arc<dyn SentimentLexicon>>,
    /// Table for `emoticon_sentiment` when the spec gives no `path`.
    emoticons: Option<Arc<EmoticonTable>>,
    /// Stop words for `stop_words` modules without a `language`.
    stopwords: Option<Arc<StopwordList>>,
    /// Overrides the spec's input module.
    input_source: Option<Box<dyn InputSource>>,
    /// Appended after the spec's outputs.
    sinks: Vec<Box<dyn Sink>>,
}

impl SpecPipelineBuilder {
    /// Create a new builder with empty defaults.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lexicon(mut self, lexicon: Arc<dyn SentimentLexicon>) -> Self {
        self.lexicon = Some(lexicon);
        self
    }

    pub fn with_emoticons(mut self, table: Arc<EmoticonTable>) -> Self {
        self.emoticons = Some(table);
        self
    }

    pub fn with_stopwords(mut self, stopwords: Arc<StopwordList>) -> Self {
        self.stopwords = Some(stopwords);
        self
    }

    /// Use `source` instead of whatever the spec's `input` names.
    pub fn with_input_source(mut self, source: Box<dyn InputSource>) -> Self {
        self.input_source = Some(source);
        self
    }

    /// Chain `sink` after the spec's outputs.
    pub fn with_sink(mut self, sink: Box<dyn Sink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Build a pipeline from `spec` without running validation first.
    ///
    /// Fails on the first module that cannot be constructed.
    pub fn build(&self, spec: &PipelineSpec) -> SpecResult<Pipeline> {
        // ── Schema ────────────────────────────────────────────────────
        let mut schema = Schema::new();
        for (i, field) in spec.schema.input_fields.iter().enumerate() {
            schema = schema
                .with_input_field(field)
                .map_err(|e| module_error(format!("/schema/input_fields/{i}"), e))?;
        }
        let mut pipeline = Pipeline::with_schema(schema);
        if let Some(name) = &spec.name {
            pipeline.set_name(name);
        }

        // ── Input ─────────────────────────────────────────────────────
        let allow_empty = spec.input.as_ref().is_some_and(|i| i.allow_empty_text);
        let source = match (&self.input_source, &spec.input) {
            (Some(source), _) => Some(source.boxed_clone()),
            (None, Some(input)) => Some(self.make_input(input)?),
            (None, None) => None,
        };
        if let Some(source) = source {
            pipeline.set_input_module(InputModule::new(source).allow_empty_text(allow_empty));
        }

        // ── Preprocess ────────────────────────────────────────────────
        for (i, p) in spec.preprocess.iter().enumerate() {
            let path = format!("/preprocess/{i}");
            let transformer = self.make_transformer(&path, p)?;
            pipeline
                .add_preprocess_module(PreprocessModule::with_key(transformer, p.key()))
                .map_err(|e| module_error(format!("{path}/key"), e))?;
        }

        // ── Features ──────────────────────────────────────────────────
        for (i, f) in spec.features.iter().enumerate() {
            let path = format!("/features/{i}");
            let extractor = self.make_extractor(&path, f)?;
            let discretizer = Discretizer::new(&f.rules, &f.labels)
                .map_err(|e| module_error(format!("{path}/rules"), e))?;
            let feature = Feature::new(extractor).with_discretizer(discretizer);
            pipeline
                .add_feature_module(FeatureModule::with_key(feature, f.key()))
                .map_err(|e| module_error(format!("{path}/key"), e))?;
        }

        // ── Classifier ────────────────────────────────────────────────
        if let Some(classifier) = &spec.classifier {
            pipeline.set_classifier(Self::make_classifier(classifier)?);
        }

        // ── Outputs ───────────────────────────────────────────────────
        for (i, o) in spec.outputs.iter().enumerate() {
            pipeline.add_output_sink(Self::make_sink(format!("/outputs/{i}"), o)?);
        }
        for sink in &self.sinks {
            pipeline.add_output_sink(sink.boxed_clone());
        }

        Ok(pipeline)
    }

    /// Validate `spec`, then build it.
    ///
    /// Returns the first validation error, if any. Warnings do not block the
    /// build.
    pub fn build_from_spec(&self, spec: &PipelineSpec) -> SpecResult<Pipeline> {
        let report = ValidationEngine::with_defaults().validate(spec);
        if let Some(err) = report.errors().next() {
            return Err(err.clone());
        }
        self.build(spec)
    }

    fn make_input(&self, spec: &InputSpec) -> SpecResult<Box<dyn InputSource>> {
        match InputType::from_name(&spec.kind) {
            Some(InputType::Memory) => Ok(Box::new(MemorySource::default())),
            Some(InputType::JsonLines) => match &spec.path {
                Some(path) => Ok(Box::new(JsonLinesSource::new(path))),
                None => Err(PipelineSpecError::new(
                    ErrorCode::InvalidValue,
                    "/input/path",
                    "json_lines input requires a path",
                )),
            },
            None => Err(unknown_module("/input/type".into(), &spec.kind, InputType::NAMES)),
        }
    }

    fn make_transformer(
        &self,
        path: &str,
        spec: &PreprocessSpec,
    ) -> SpecResult<Arc<dyn TextTransformer>> {
        let Some(kind) = PreprocessType::from_name(&spec.kind) else {
            return Err(unknown_module(
                format!("{path}/type"),
                &spec.kind,
                PreprocessType::NAMES,
            ));
        };
        let transformer: Arc<dyn TextTransformer> = match kind {
            PreprocessType::HashtagNormalizer => {
                Arc::new(HashtagNormalizer::new().map_err(|e| module_error(path, e))?)
            }
            PreprocessType::MentionNormalizer => {
                Arc::new(MentionNormalizer::new().map_err(|e| module_error(path, e))?)
            }
            PreprocessType::Ngrams => Arc::new(
                NGrams::new(spec.n.unwrap_or(0))
                    .map_err(|e| module_error(format!("{path}/n"), e))?,
            ),
            PreprocessType::StopWords => {
                let stopwords = match (&spec.language, &self.stopwords) {
                    (Some(language), _) => Arc::new(
                        StopwordList::for_language(language)
                            .map_err(|e| module_error(format!("{path}/language"), e))?,
                    ),
                    (None, Some(list)) => Arc::clone(list),
                    (None, None) => Arc::new(StopwordList::english()),
                };
                Arc::new(StopWordFilter::new(stopwords))
            }
            PreprocessType::Tokenize => Arc::new(TokenizeTransform::new()),
            PreprocessType::PosTag => Arc::new(PosTagTransform::new()),
        };
        Ok(transformer)
    }

    fn make_extractor(
        &self,
        path: &str,
        spec: &FeatureSpec,
    ) -> SpecResult<Arc<dyn FeatureExtractor>> {
        let Some(kind) = FeatureType::from_name(&spec.kind) else {
            return Err(unknown_module(
                format!("{path}/type"),
                &spec.kind,
                FeatureType::NAMES,
            ));
        };
        let extractor: Arc<dyn FeatureExtractor> = match kind {
            FeatureType::AdjectiveCount => Arc::new(AdjectiveCount::new()),
            FeatureType::AdjectiveRatio => {
                let lexicon: Arc<dyn SentimentLexicon> = match (&self.lexicon, &spec.path) {
                    (Some(lexicon), _) => Arc::clone(lexicon),
                    (None, Some(file)) => Arc::new(
                        MemoryLexicon::from_path(file)
                            .map_err(|e| module_error(format!("{path}/path"), e))?,
                    ),
                    (None, None) => Arc::new(MemoryLexicon::basic_english()),
                };
                Arc::new(AdjectiveRatio::new(lexicon))
            }
            FeatureType::ExcessiveCapitals => Arc::new(ExcessiveCapitals::new()),
            FeatureType::ExcessivePunctuation => Arc::new(ExcessivePunctuation::new()),
            FeatureType::HashtagCount => {
                Arc::new(HashtagCount::new().map_err(|e| module_error(path, e))?)
            }
            FeatureType::NegationParity => Arc::new(NegationParity::new()),
            FeatureType::WordCount => Arc::new(WordCount::new()),
            FeatureType::EmoticonSentiment => {
                let table = match (&spec.path, &self.emoticons) {
                    (Some(file), _) => Arc::new(
                        EmoticonTable::from_path(file)
                            .map_err(|e| module_error(format!("{path}/path"), e))?,
                    ),
                    (None, Some(table)) => Arc::clone(table),
                    (None, None) => {
                        return Err(PipelineSpecError::new(
                            ErrorCode::InvalidValue,
                            path,
                            "emoticon_sentiment requires an emoticon table",
                        )
                        .with_hint(
                            "Set \"path\" or supply one via SpecPipelineBuilder::with_emoticons()",
                        ))
                    }
                };
                Arc::new(EmoticonSentiment::new(table))
            }
        };
        Ok(extractor)
    }

    fn make_classifier(spec: &ClassifierSpec) -> SpecResult<ClassifierModule> {
        let mut backend = backend_from_name(&spec.kind).map_err(|_| {
            unknown_module(
                "/classifier/type".into(),
                &spec.kind,
                crate::classify::BACKEND_NAMES,
            )
        })?;
        apply_params(backend.as_mut(), &spec.params)
            .map_err(|e| module_error("/classifier/params", e))?;
        let module = ClassifierModule::new(backend);
        Ok(match &spec.labels {
            Some(labels) => module.with_label_mapping(labels.clone()),
            None => module,
        })
    }

    fn make_sink(path: String, spec: &OutputSpec) -> SpecResult<Box<dyn Sink>> {
        match OutputType::from_name(&spec.kind) {
            Some(OutputType::DictFormat) => Ok(Box::new(DictFormatSink::new())),
            Some(OutputType::Console) => Ok(Box::new(ConsoleSink::new())),
            Some(OutputType::Csv) => match &spec.path {
                Some(file) => Ok(Box::new(CsvSink::new(file))),
                None => Err(PipelineSpecError::new(
                    ErrorCode::InvalidValue,
                    format!("{path}/path"),
                    "csv output requires a path",
                )),
            },
            None => Err(unknown_module(
                format!("{path}/type"),
                &spec.kind,
                OutputType::NAMES,
            )),
        }
    }
}
