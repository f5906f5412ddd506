//! Pipeline runner: owns one link per stage and drives items through them.
//!
//! A [`Pipeline`] is assembled by attaching modules stage by stage. Attaching
//! a preprocess or feature module appends its output key to the pipeline's
//! [`Schema`] and re-propagates the schema to every link.
//!
//! # Dispatch
//!
//! Each arriving record is normalized against the schema and passed
//! synchronously through input → preprocess → features → classifier →
//! output, then handed to the completion handler unless a sink consumed it.
//! [`Pipeline::dispatch_with`] and [`Pipeline::start_with`] notify a
//! [`PipelineObserver`] at each stage boundary.
//!
//! # Input seam
//!
//! [`Pipeline::start`] runs the input source on its own thread. Records come
//! back over an `mpsc` channel and are dispatched on the calling thread until
//! the source stops.

use std::fmt;
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::{Result, SocialMeterError};
use crate::io::Corpus;
use crate::pipeline::error_code::ErrorCode;
use crate::pipeline::link::Link;
use crate::pipeline::module::{
    ClassifierModule, FeatureModule, InputModule, OutputModule, PreprocessModule,
};
use crate::pipeline::observer::{
    NoopObserver, PipelineObserver, StageClock, StageOutcome, StageReportBuilder,
};
use crate::pipeline::traits::{InputSource, Intake, Sink, StageModule, StageType};
use crate::types::{Item, Record, Schema, TEXT_FIELD};

// ---------------------------------------------------------------------------
// Tracing support
// ---------------------------------------------------------------------------

/// Enter a tracing span for a pipeline stage.
macro_rules! trace_stage {
    ($name:expr) => {
        let _span = tracing::info_span!("pipeline_stage", stage = $name).entered();
    };
}

/// Callback receiving every item that reaches the end of the pipeline.
pub type CompletionHandler = Box<dyn FnMut(&Item) + Send>;

/// Counts for one [`Pipeline::start`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Records received from the input source.
    pub received: usize,
    /// Items that reached the completion handler.
    pub completed: usize,
    /// Items dropped by the input stage or consumed by a sink.
    pub consumed: usize,
    /// Items skipped after a non-fatal stage error.
    pub failed: usize,
}

// ============================================================================
// Pipeline
// ============================================================================

/// The five-stage sentiment pipeline.
///
/// | Stage | Link | Required |
/// |-------|------|----------|
/// | input | [`InputModule`] (singleton) | yes |
/// | preprocess | [`PreprocessModule`]s | no |
/// | feature_extract | [`FeatureModule`]s | yes |
/// | classify | [`ClassifierModule`] (singleton) | yes |
/// | output | [`OutputModule`]s | yes |
pub struct Pipeline {
    name: Option<String>,
    schema: Arc<Schema>,
    input: Link<InputModule>,
    preprocess: Link<PreprocessModule>,
    features: Link<FeatureModule>,
    classifier: Link<ClassifierModule>,
    output: Link<OutputModule>,
    handler: Option<CompletionHandler>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("schema", &self.schema)
            .field("input", &self.input)
            .field("preprocess", &self.preprocess)
            .field("features", &self.features)
            .field("classifier", &self.classifier)
            .field("output", &self.output)
            .field("handler", &self.handler.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    /// An empty pipeline over the default schema (`text`, `classification`).
    pub fn new() -> Self {
        Self::with_schema(Schema::new())
    }

    /// An empty pipeline whose schema already declares extra input fields.
    pub fn with_schema(schema: Schema) -> Self {
        let schema = Arc::new(schema);
        Self {
            name: None,
            input: Link::new(Arc::clone(&schema)),
            preprocess: Link::new(Arc::clone(&schema)),
            features: Link::new(Arc::clone(&schema)),
            classifier: Link::new(Arc::clone(&schema)),
            output: Link::new(Arc::clone(&schema)),
            schema,
            handler: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    // ─── Attachment ─────────────────────────────────────────────────────

    /// Attach (or replace) the input source.
    pub fn set_input_source(&mut self, source: Box<dyn InputSource>) {
        self.set_input_module(InputModule::new(source));
    }

    pub fn set_input_module(&mut self, module: InputModule) {
        self.input.replace(module);
    }

    /// Append a preprocess module.
    ///
    /// The module reads the previous preprocess output (or `text`), and every
    /// feature module is rebound to read this module's output.
    pub fn add_preprocess_module(&mut self, mut module: PreprocessModule) -> Result<()> {
        let source = self.last_preprocess_key();
        module.bind_source(&source);
        self.extend_schema(module.key())?;
        let key = module.key().to_string();
        self.preprocess.add_module(module);
        for feature in self.features.modules_mut() {
            feature.bind_source(&key);
        }
        self.propagate_schema();
        Ok(())
    }

    /// Append a feature module; its key becomes the next schema field.
    pub fn add_feature_module(&mut self, mut module: FeatureModule) -> Result<()> {
        module.bind_source(&self.last_preprocess_key());
        self.extend_schema(module.key())?;
        self.features.add_module(module);
        self.propagate_schema();
        Ok(())
    }

    /// Attach (or replace) the classifier.
    pub fn set_classifier(&mut self, module: ClassifierModule) {
        self.classifier.replace(module);
    }

    /// Replace every output sink with `sink`.
    pub fn set_output_sink(&mut self, sink: Box<dyn Sink>) {
        self.output.replace(OutputModule::new(sink));
    }

    /// Chain another sink after the existing ones.
    pub fn add_output_sink(&mut self, sink: Box<dyn Sink>) {
        self.output.add_module(OutputModule::new(sink));
    }

    /// Called with every item that survives the output stage.
    pub fn set_completion_handler<F>(&mut self, handler: F)
    where
        F: FnMut(&Item) + Send + 'static,
    {
        self.handler = Some(Box::new(handler));
    }

    pub fn clear_completion_handler(&mut self) {
        self.handler = None;
    }

    fn last_preprocess_key(&self) -> String {
        self.preprocess
            .modules()
            .last()
            .map(|m| m.key().to_string())
            .unwrap_or_else(|| TEXT_FIELD.to_string())
    }

    fn extend_schema(&mut self, key: &str) -> Result<()> {
        let mut schema = (*self.schema).clone();
        schema.add_derived(key)?;
        self.schema = Arc::new(schema);
        Ok(())
    }

    fn propagate_schema(&mut self) {
        self.input.set_schema(Arc::clone(&self.schema));
        self.preprocess.set_schema(Arc::clone(&self.schema));
        self.features.set_schema(Arc::clone(&self.schema));
        self.classifier.set_schema(Arc::clone(&self.schema));
        self.output.set_schema(Arc::clone(&self.schema));
    }

    // ─── Inspection ─────────────────────────────────────────────────────

    pub fn input_link(&self) -> &Link<InputModule> {
        &self.input
    }

    pub fn preprocess_link(&self) -> &Link<PreprocessModule> {
        &self.preprocess
    }

    pub fn feature_link(&self) -> &Link<FeatureModule> {
        &self.features
    }

    pub fn output_link(&self) -> &Link<OutputModule> {
        &self.output
    }

    pub fn classifier(&self) -> Option<&ClassifierModule> {
        self.classifier.first()
    }

    pub fn classifier_mut(&mut self) -> Option<&mut ClassifierModule> {
        self.classifier.first_mut()
    }

    /// Feature keys in attachment order; the classifier trains on this order.
    pub fn feature_keys(&self) -> Vec<String> {
        self.features.output_keys()
    }

    pub fn is_trained(&self) -> bool {
        self.classifier().is_some_and(ClassifierModule::is_trained)
    }

    /// Stages with nothing attached. Preprocessing is optional.
    pub fn unattached_stages(&self) -> Vec<StageType> {
        let mut missing = Vec::new();
        if !self.input.is_ready() {
            missing.push(StageType::Input);
        }
        if !self.features.is_ready() {
            missing.push(StageType::FeatureExtract);
        }
        if !self.classifier.is_ready() {
            missing.push(StageType::Classify);
        }
        if !self.output.is_ready() {
            missing.push(StageType::Output);
        }
        missing
    }

    pub fn is_ready(&self) -> bool {
        self.unattached_stages().is_empty()
    }

    /// Fail with `NotReady` naming every unattached stage.
    pub fn check_ready(&self) -> Result<()> {
        let stages = self.unattached_stages();
        if stages.is_empty() {
            Ok(())
        } else {
            Err(SocialMeterError::NotReady { stages })
        }
    }

    // ─── Dispatch ───────────────────────────────────────────────────────

    /// Drive one raw record through every stage.
    ///
    /// Returns the final item, or `None` if the input stage dropped it or a
    /// sink consumed it.
    pub fn dispatch(&mut self, record: Record) -> Result<Option<Item>> {
        self.dispatch_with(record, &mut NoopObserver)
    }

    /// [`dispatch`](Self::dispatch) with stage-boundary callbacks.
    pub fn dispatch_with<O: PipelineObserver>(
        &mut self,
        record: Record,
        observer: &mut O,
    ) -> Result<Option<Item>> {
        self.check_ready()?;
        self.dispatch_inner(record, observer)
    }

    fn dispatch_inner<O: PipelineObserver>(
        &mut self,
        record: Record,
        observer: &mut O,
    ) -> Result<Option<Item>> {
        let item = Item::from_record(Arc::clone(&self.schema), &record);

        let Some(item) = run_stage(&mut self.input, item, observer)? else {
            return Ok(None);
        };
        let Some(item) = run_stage(&mut self.preprocess, item, observer)? else {
            return Ok(None);
        };
        let Some(item) = run_stage(&mut self.features, item, observer)? else {
            return Ok(None);
        };
        let Some(item) = run_stage(&mut self.classifier, item, observer)? else {
            return Ok(None);
        };
        let Some(item) = run_stage(&mut self.output, item, observer)? else {
            return Ok(None);
        };

        if let Some(handler) = self.handler.as_mut() {
            handler(&item);
        }
        Ok(Some(item))
    }

    /// Run the input source until it stops, dispatching every record.
    pub fn start(&mut self) -> Result<RunSummary> {
        self.start_with(&mut NoopObserver)
    }

    /// [`start`](Self::start) with stage-boundary callbacks.
    ///
    /// Fails with `NotReady` before anything runs if a required stage is
    /// unattached. A classifier failure aborts the run; other per-item errors
    /// are logged, counted and skipped.
    pub fn start_with<O: PipelineObserver>(&mut self, observer: &mut O) -> Result<RunSummary> {
        self.check_ready()?;
        let mut source = self
            .input
            .first_mut()
            .and_then(InputModule::take_source)
            .ok_or_else(|| SocialMeterError::NotReady {
                stages: vec![StageType::Input],
            })?;

        info!(
            pipeline = self.name().unwrap_or("pipeline"),
            source = source.name(),
            "starting pipeline"
        );

        let (tx, rx) = mpsc::channel();
        let intake = Intake::new(tx);

        let (dispatched, joined) = thread::scope(|scope| {
            let producer = scope.spawn(move || {
                let result = source.start(intake);
                (source, result)
            });
            let dispatched = self.drain(rx, observer);
            (dispatched, producer.join())
        });

        let source_result = match joined {
            Ok((source, result)) => {
                if let Some(input) = self.input.first_mut() {
                    input.restore_source(source);
                }
                result
            }
            Err(_) => Err(SocialMeterError::internal("input source thread panicked")),
        };

        let summary = dispatched?;
        source_result?;
        info!(
            received = summary.received,
            completed = summary.completed,
            consumed = summary.consumed,
            failed = summary.failed,
            "input source finished"
        );
        Ok(summary)
    }

    fn drain<O: PipelineObserver>(
        &mut self,
        rx: Receiver<Record>,
        observer: &mut O,
    ) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        for record in rx {
            summary.received += 1;
            match self.dispatch_inner(record, observer) {
                Ok(Some(_)) => summary.completed += 1,
                Ok(None) => summary.consumed += 1,
                Err(err) if is_fatal(&err) => {
                    warn!(error = %err, "aborting pipeline run");
                    return Err(err);
                }
                Err(err) => {
                    summary.failed += 1;
                    warn!(error = %err, "skipping item");
                }
            }
        }
        Ok(summary)
    }

    // ─── Training ───────────────────────────────────────────────────────

    /// Feature matrix for `texts`, one row per text in feature-link order.
    ///
    /// Runs only the feature link: input, preprocess and output are bypassed.
    /// Rows are computed in parallel; their order matches `texts`.
    pub fn extract_features(&self, texts: &[String]) -> Result<Vec<Vec<f64>>> {
        if self.features.is_empty() {
            return Err(SocialMeterError::NotReady {
                stages: vec![StageType::FeatureExtract],
            });
        }
        trace_stage!(StageType::FeatureExtract.as_str());
        let modules = self.features.modules();
        texts
            .par_iter()
            .map(|text| {
                modules
                    .iter()
                    .map(|m| m.extract(text).as_feature())
                    .collect::<Result<Vec<f64>>>()
            })
            .collect()
    }

    /// Extract features from every corpus text and fit the classifier on them.
    pub fn train(&mut self, corpus: &Corpus) -> Result<()> {
        if !self.classifier.is_ready() {
            return Err(SocialMeterError::NotReady {
                stages: vec![StageType::Classify],
            });
        }
        let matrix = self.extract_features(corpus.texts())?;
        let keys = self.feature_keys();
        debug!(
            rows = matrix.len(),
            features = keys.len(),
            "training classifier"
        );
        match self.classifier.first_mut() {
            Some(classifier) => classifier.train(keys, &matrix, corpus.labels()),
            None => Err(SocialMeterError::NotReady {
                stages: vec![StageType::Classify],
            }),
        }
    }

    // ─── Copying ────────────────────────────────────────────────────────

    /// A fully independent pipeline: schema copied, every link deep-copied.
    ///
    /// The completion handler is not carried over.
    pub fn deep_copy(&self) -> Self {
        let schema = Arc::new((*self.schema).clone());
        let mut copy = Self {
            name: self.name.clone(),
            schema,
            input: self.input.deep_copy(),
            preprocess: self.preprocess.deep_copy(),
            features: self.features.deep_copy(),
            classifier: self.classifier.deep_copy(),
            output: self.output.deep_copy(),
            handler: None,
        };
        copy.propagate_schema();
        copy
    }
}

/// Run one link, reporting its boundaries to `observer`.
fn run_stage<M, O>(link: &mut Link<M>, item: Item, observer: &mut O) -> Result<Option<Item>>
where
    M: StageModule,
    O: PipelineObserver,
{
    let stage = M::STAGE;
    trace_stage!(stage.as_str());
    observer.on_stage_start(stage);
    let clock = StageClock::start();
    let result = link.process(item);
    let outcome = match &result {
        Ok(Some(_)) => StageOutcome::Passed,
        Ok(None) => StageOutcome::Consumed,
        Err(_) => StageOutcome::Failed,
    };
    let report = StageReportBuilder::new(clock.elapsed(), outcome)
        .modules(link.len())
        .build();
    observer.on_stage_end(stage, &report);
    result
}

/// Classifier failures stop a live run.
fn is_fatal(err: &SocialMeterError) -> bool {
    match err {
        SocialMeterError::Stage(rt) => {
            rt.stage == StageType::Classify.as_str()
                || matches!(rt.code, ErrorCode::BackendFailed | ErrorCode::NotTrained)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{GaussianNaiveBayes, LabelMapping};
    use crate::features::{ExcessiveCapitals, Feature, TokenizeTransform, WordCount};
    use crate::io::{CollectSink, MemorySource};
    use crate::pipeline::observer::StageTimingObserver;
    use crate::types::Value;
    use std::sync::Mutex;

    fn record(text: &str) -> Record {
        let mut r = Record::new();
        r.insert("text".into(), serde_json::Value::String(text.into()));
        r
    }

    fn corpus() -> Corpus {
        Corpus::new(
            vec![
                "I AM SO ANGRY".into(),
                "WHY IS THIS BROKEN".into(),
                "STOP IT NOW".into(),
                "a calm quiet morning".into(),
                "we had a lovely lunch".into(),
                "the sun is nice today".into(),
            ],
            ["0", "0", "0", "1", "1", "1"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
        .unwrap()
    }

    fn ready_pipeline(records: Vec<Record>) -> (Pipeline, CollectSink) {
        let sink = CollectSink::new();
        let mut p = Pipeline::new().with_name("test");
        p.set_input_source(Box::new(MemorySource::new(records)));
        p.add_feature_module(FeatureModule::new(Feature::new(Arc::new(
            ExcessiveCapitals::new(),
        ))))
        .unwrap();
        p.set_classifier(
            ClassifierModule::new(Box::new(GaussianNaiveBayes::new()))
                .with_label_mapping(LabelMapping::binary_sentiment()),
        );
        p.set_output_sink(Box::new(sink.clone()));
        (p, sink)
    }

    #[test]
    fn test_empty_pipeline_names_every_required_stage() {
        let mut p = Pipeline::new();
        match p.start().unwrap_err() {
            SocialMeterError::NotReady { stages } => assert_eq!(
                stages,
                vec![
                    StageType::Input,
                    StageType::FeatureExtract,
                    StageType::Classify,
                    StageType::Output
                ]
            ),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_output_only() {
        let (mut p, _) = ready_pipeline(Vec::new());
        p.output = Link::new(Arc::clone(&p.schema));
        assert_eq!(p.unattached_stages(), vec![StageType::Output]);
        assert!(p.dispatch(record("x")).unwrap_err().is_not_ready());
    }

    #[test]
    fn test_schema_grows_in_attachment_order() {
        let mut p = Pipeline::new();
        let before = p.schema().len();
        for key in ["a", "b", "c"] {
            p.add_feature_module(FeatureModule::with_key(
                Feature::new(Arc::new(WordCount::new())),
                key,
            ))
            .unwrap();
        }
        assert_eq!(p.schema().len(), before + 3);
        let derived: Vec<&str> = p.schema().derived_keys().collect();
        assert_eq!(derived, vec!["a", "b", "c"]);
        assert_eq!(p.feature_keys(), vec!["a", "b", "c"]);
        // Every link sees the same schema.
        assert!(Arc::ptr_eq(p.feature_link().schema(), p.schema()));
        assert!(Arc::ptr_eq(p.output_link().schema(), p.schema()));
    }

    #[test]
    fn test_duplicate_feature_key_rejected() {
        let mut p = Pipeline::new();
        let wc = || FeatureModule::new(Feature::new(Arc::new(WordCount::new())));
        p.add_feature_module(wc()).unwrap();
        let err = p.add_feature_module(wc()).unwrap_err();
        assert!(matches!(err, SocialMeterError::DuplicateField { .. }));
        assert_eq!(p.feature_link().len(), 1);
    }

    #[test]
    fn test_preprocess_rebinds_feature_sources() {
        let mut p = Pipeline::new();
        p.add_feature_module(FeatureModule::new(Feature::new(Arc::new(WordCount::new()))))
            .unwrap();
        assert_eq!(p.feature_link().modules()[0].source_key(), "text");
        p.add_preprocess_module(PreprocessModule::new(Arc::new(TokenizeTransform::new())))
            .unwrap();
        assert_eq!(p.feature_link().modules()[0].source_key(), "tokenize");
        assert_eq!(p.preprocess_link().modules()[0].source_key(), "text");
    }

    #[test]
    fn test_dispatch_before_training_fails() {
        let (mut p, _) = ready_pipeline(Vec::new());
        match p.dispatch(record("HELLO")).unwrap_err() {
            SocialMeterError::Stage(rt) => {
                assert_eq!(rt.code, ErrorCode::NotTrained);
                assert_eq!(rt.stage, "classify");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_train_and_dispatch() {
        let (mut p, sink) = ready_pipeline(Vec::new());
        p.train(&corpus()).unwrap();
        assert!(p.is_trained());

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_by_handler = Arc::clone(&seen);
        p.set_completion_handler(move |item| {
            seen_by_handler
                .lock()
                .unwrap()
                .push(item.classification().clone());
        });

        let out = p.dispatch(record("WHAT ON EARTH")).unwrap().unwrap();
        assert_eq!(out.classification(), &Value::Text("negative".into()));
        let out = p.dispatch(record("what a pleasant day")).unwrap().unwrap();
        assert_eq!(out.classification(), &Value::Text("positive".into()));

        assert_eq!(sink.len(), 2);
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_input_stage_drops_empty_text() {
        let (mut p, sink) = ready_pipeline(Vec::new());
        p.train(&corpus()).unwrap();
        let mut r = Record::new();
        r.insert("user".into(), serde_json::Value::String("x".into()));
        assert!(p.dispatch(r).unwrap().is_none());
        assert!(sink.is_empty());
    }

    #[test]
    fn test_observer_sees_every_stage() {
        let (mut p, _) = ready_pipeline(Vec::new());
        p.train(&corpus()).unwrap();
        let mut obs = StageTimingObserver::new();
        p.dispatch_with(record("LOUD"), &mut obs).unwrap();
        let stages: Vec<StageType> = obs.reports().iter().map(|(s, _)| *s).collect();
        assert_eq!(stages, StageType::ALL.to_vec());
        assert!(obs
            .reports()
            .iter()
            .all(|(_, r)| r.outcome() == StageOutcome::Passed));
    }

    #[test]
    fn test_start_drains_source() {
        let records = vec![record("ANGRY WORDS"), record(""), record("soft words")];
        let (mut p, sink) = ready_pipeline(records);
        p.train(&corpus()).unwrap();
        let summary = p.start().unwrap();
        assert_eq!(
            summary,
            RunSummary {
                received: 3,
                completed: 2,
                consumed: 1,
                failed: 0
            }
        );
        assert_eq!(sink.len(), 2);
        // The source is restored, so the pipeline can run again.
        assert_eq!(p.input_link().first().unwrap().source_name(), Some("memory"));
        assert_eq!(p.start().unwrap().received, 3);
    }

    #[test]
    fn test_start_untrained_aborts() {
        let (mut p, sink) = ready_pipeline(vec![record("one"), record("two")]);
        assert!(matches!(
            p.start().unwrap_err(),
            SocialMeterError::Stage(_)
        ));
        assert!(sink.is_empty());
    }

    #[test]
    fn test_extract_features_keeps_row_order() {
        let (p, _) = ready_pipeline(Vec::new());
        let texts: Vec<String> = vec!["ALL CAPS".into(), "no caps".into()];
        assert_eq!(p.extract_features(&texts).unwrap(), vec![vec![1.0], vec![0.0]]);
        // Pure: a second run is identical.
        assert_eq!(
            p.extract_features(&texts).unwrap(),
            p.extract_features(&texts).unwrap()
        );
    }

    #[test]
    fn test_deep_copy_is_independent() {
        let (p, _) = ready_pipeline(Vec::new());
        let mut copy = p.deep_copy();
        copy.add_feature_module(FeatureModule::new(Feature::new(Arc::new(WordCount::new()))))
            .unwrap();
        assert_eq!(p.feature_link().len(), 1);
        assert_eq!(copy.feature_link().len(), 2);
        assert_eq!(p.schema().len() + 1, copy.schema().len());
        assert_ne!(
            p.feature_link().modules()[0].id(),
            copy.feature_link().modules()[0].id()
        );
        assert_eq!(copy.name(), Some("test"));
    }
}
