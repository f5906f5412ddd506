//! Integration tests for socialmeter

use std::io::Write;
use std::sync::{Arc, Mutex};

use socialmeter::classify::ParamValue;
use socialmeter::evaluation::{ParamGrid, RankedPipeline};
use socialmeter::features::{ExcessiveCapitals, ExcessivePunctuation, WordCount};
use socialmeter::io::{CollectSink, DictFormatSink, JsonLinesSource, MemorySource};
use socialmeter::pipeline::traits::FeatureExtractor;
use socialmeter::pipeline::{ClassifierModule, FeatureModule, StageTimingObserver};
use socialmeter::*;

/// Ten short posts, half shouted (negative) and half calm (positive).
const TRAINING_CSV: &str = "\
id,label,source,text
1,0,twitter,I HATE MONDAYS
2,1,twitter,what a lovely morning
3,0,twitter,THIS IS THE WORST
4,1,twitter,\"so nice, really\"
5,0,twitter,STOP CALLING ME
6,1,twitter,had a calm walk today
7,0,twitter,WHY IS IT BROKEN AGAIN
8,1,twitter,the tea is good
9,0,twitter,NOBODY LISTENS
10,1,twitter,enjoying the quiet evening
";

fn corpus() -> Corpus {
    Corpus::from_reader(TRAINING_CSV.as_bytes()).unwrap()
}

fn record(json: &str) -> Record {
    serde_json::from_str(json).unwrap()
}

fn caps_pipeline(name: &str) -> Pipeline {
    let mut p = Pipeline::new().with_name(name);
    p.add_feature_module(FeatureModule::new(Feature::new(Arc::new(
        ExcessiveCapitals::new(),
    ))))
    .unwrap();
    p.set_classifier(
        ClassifierModule::new(Box::new(GaussianNaiveBayes::new()))
            .with_label_mapping(LabelMapping::binary_sentiment()),
    );
    p
}

// ─── Discretized features ───────────────────────────────────────────────────

#[test]
fn test_word_count_buckets() {
    let feature = Feature::new(Arc::new(WordCount::new()))
        .with_discretizer(Discretizer::new(&["0_2", "3<"], &[0, 1]).unwrap());

    assert_eq!(feature.extract("just two"), Value::Label(0));
    // `<bound><` means `bound < v`, strictly. A three-word post such as
    // "I am happy" therefore matches neither rule; it is not counted as `3<`.
    assert_eq!(feature.extract("I am happy"), Value::NoMatch);
    assert_eq!(feature.extract("one two three"), Value::NoMatch);
    assert_eq!(feature.extract("one two three four"), Value::Label(1));
}

#[test]
fn test_first_matching_rule_wins() {
    let d = Discretizer::new(&["0_10", "5_5"], &[1, 2]).unwrap();
    assert_eq!(d.apply(5.0), Value::Label(1));
}

#[test]
fn test_excessive_capitals_ratio() {
    let caps = ExcessiveCapitals::new();
    assert_eq!(caps.extract("THIS IS ONLY LOUD."), 1.0);
    assert_eq!(caps.extract("This is a normal sentence."), 0.0);
}

// ─── Corpus loading ─────────────────────────────────────────────────────────

#[test]
fn test_corpus_from_csv_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(TRAINING_CSV.as_bytes()).unwrap();
    file.flush().unwrap();

    let corpus = Corpus::from_path(file.path()).unwrap();
    assert_eq!(corpus.len(), 10);
    assert_eq!(corpus.labels()[0], "0");
    assert_eq!(corpus.texts()[0], "I HATE MONDAYS");
    assert_eq!(corpus.texts()[3], "so nice, really");
}

// ─── Pipeline lifecycle ─────────────────────────────────────────────────────

#[test]
fn test_train_and_dispatch() {
    let mut p = caps_pipeline("caps");
    p.set_input_source(Box::new(MemorySource::default()));
    p.set_output_sink(Box::new(DictFormatSink::new()));
    p.train(&corpus()).unwrap();

    let loud = p
        .dispatch(record(r#"{"text": "I CANNOT BELIEVE THIS"}"#))
        .unwrap()
        .unwrap();
    assert_eq!(loud.classification(), &Value::Text("negative".into()));

    let calm = p
        .dispatch(record(r#"{"text": "a pleasant surprise"}"#))
        .unwrap()
        .unwrap();
    assert_eq!(calm.classification(), &Value::Text("positive".into()));
}

#[test]
fn test_start_reads_json_lines_and_calls_handler() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, r#"{{"text": "YOU RUINED IT", "user": "a"}}"#).unwrap();
    writeln!(file, r#"{{"message": "such a nice day", "user": "b"}}"#).unwrap();
    writeln!(file, "garbage").unwrap();
    writeln!(file, r#"{{"user": "c"}}"#).unwrap();
    file.flush().unwrap();

    let mut p = Pipeline::with_schema(Schema::new().with_input_field("user").unwrap());
    p.add_feature_module(FeatureModule::new(Feature::new(Arc::new(
        ExcessiveCapitals::new(),
    ))))
    .unwrap();
    p.set_classifier(
        ClassifierModule::new(Box::new(GaussianNaiveBayes::new()))
            .with_label_mapping(LabelMapping::binary_sentiment()),
    );
    p.set_input_source(Box::new(JsonLinesSource::new(file.path())));
    let sink = CollectSink::new();
    p.set_output_sink(Box::new(sink.clone()));

    let seen = Arc::new(Mutex::new(Vec::new()));
    let handler_seen = Arc::clone(&seen);
    p.set_completion_handler(move |item: &Item| {
        let user = item.get("user").map(|v| v.to_string()).unwrap_or_default();
        handler_seen.lock().unwrap().push(user);
    });

    p.train(&corpus()).unwrap();
    let mut observer = StageTimingObserver::new();
    let summary = p.start_with(&mut observer).unwrap();

    // The record without text is dropped by the input stage.
    assert_eq!(summary.received, 3);
    assert_eq!(summary.completed, 2);
    assert_eq!(summary.failed, 0);
    assert_eq!(*seen.lock().unwrap(), vec!["a", "b"]);

    let items = sink.take();
    assert_eq!(items[0].classification(), &Value::Text("negative".into()));
    assert_eq!(items[1].text(), Some("such a nice day"));
    assert!(!observer.reports().is_empty());
}

#[test]
fn test_start_requires_every_stage() {
    let mut p = caps_pipeline("incomplete");
    match p.start().unwrap_err() {
        SocialMeterError::NotReady { stages } => {
            assert_eq!(stages, vec![StageType::Input, StageType::Output])
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_deep_copy_is_independent() {
    let original = caps_pipeline("original");
    let mut copy = original.deep_copy();
    copy.add_feature_module(FeatureModule::new(Feature::new(Arc::new(WordCount::new()))))
        .unwrap();
    copy.train(&corpus()).unwrap();

    assert_eq!(original.feature_keys(), vec!["excessive_capitals"]);
    assert_eq!(copy.feature_keys(), vec!["excessive_capitals", "word_count"]);
    assert!(!original.schema().contains("word_count"));
    assert!(!original.is_trained());
    assert!(copy.is_trained());
}

#[test]
fn test_classifier_keeps_training_key_order() {
    let mut p = caps_pipeline("two");
    p.add_feature_module(FeatureModule::new(Feature::new(Arc::new(
        ExcessivePunctuation::new(),
    ))))
    .unwrap();
    p.train(&corpus()).unwrap();
    let classifier = p.classifier().unwrap();
    assert_eq!(
        classifier.feature_keys(),
        &["excessive_capitals".to_string(), "excessive_punctuation".to_string()]
    );
}

// ─── Declarative pipelines ─────────────────────────────────────────────────

#[test]
fn test_spec_pipeline_end_to_end() {
    let spec = PipelineSpec::from_json(
        r#"{
            "v": 1,
            "name": "from-spec",
            "input": { "type": "memory" },
            "preprocess": [{ "type": "mention_normalizer" }],
            "features": [
                { "type": "excessive_capitals", "rules": ["0.5<", "0.5>"], "labels": [0, 1] }
            ],
            "classifier": {
                "type": "knn",
                "params": { "n_neighbors": 3 },
                "labels": { "0": "negative", "1": "positive" }
            },
            "outputs": [{ "type": "dict_format" }]
        }"#,
    )
    .unwrap();
    let report = ValidationEngine::with_defaults().validate(&spec);
    assert!(report.is_empty(), "{:?}", report.diagnostics);

    let sink = CollectSink::new();
    let mut p = SpecPipelineBuilder::new()
        .with_input_source(Box::new(MemorySource::from_texts(&[
            "@bob THIS IS A DISASTER",
            "@bob thanks, it was lovely",
        ])))
        .with_sink(Box::new(sink.clone()))
        .build_from_spec(&spec)
        .unwrap();
    p.train(&corpus()).unwrap();
    let summary = p.start().unwrap();
    assert_eq!(summary.completed, 2);

    let labels: Vec<String> = sink
        .items()
        .iter()
        .map(|i| i.classification().to_string())
        .collect();
    assert_eq!(labels, vec!["negative", "positive"]);
}

#[test]
fn test_spec_errors_are_all_reported() {
    let spec = PipelineSpec::from_json(
        r#"{
            "v": 1,
            "strict": true,
            "features": [
                { "type": "word_count", "rules": ["0_2", "oops"], "labels": [0, 1] },
                { "type": "word_count" }
            ],
            "classifier": { "type": "svm" },
            "runtime": { "max_threads": 0 },
            "extra": true
        }"#,
    )
    .unwrap();
    let report = ValidationEngine::with_defaults().validate(&spec);
    let mut codes: Vec<ErrorCode> = report.errors().map(|e| e.code).collect();
    codes.sort_by_key(|c| c.as_str());
    assert_eq!(
        codes,
        vec![
            ErrorCode::DuplicateKey,
            ErrorCode::InvalidRule,
            ErrorCode::LimitExceeded,
            ErrorCode::UnknownField,
            ErrorCode::UnknownModule,
        ]
    );
    let err = SpecPipelineBuilder::new().build_from_spec(&spec).unwrap_err();
    assert_eq!(err.code, ErrorCode::UnknownModule);
}

// ─── Validation harness ────────────────────────────────────────────────────

#[test]
fn test_five_fold_validation_on_balanced_corpus() {
    let p = caps_pipeline("caps");
    let report = CrossValidator::new(KFold::default())
        .validate_pipeline(&p, &corpus())
        .unwrap();
    assert_eq!(report.folds.len(), 5);
    let (mean, std) = report.summary().unwrap();
    assert!((0.0..=1.0).contains(&mean));
    assert!(std >= 0.0);
    // Validation never trains the pipeline itself.
    assert!(!p.is_trained());
}

#[test]
fn test_compare_pipelines_ranks_best_first() {
    let caps = caps_pipeline("caps");
    let mut words = Pipeline::new();
    words
        .add_feature_module(FeatureModule::new(Feature::new(Arc::new(WordCount::new()))))
        .unwrap();
    words.set_classifier(ClassifierModule::new(Box::new(GaussianNaiveBayes::new())));
    let broken = Pipeline::new().with_name("no-features");

    let ranked = CrossValidator::new(KFold::new(5)).compare_pipelines(
        &[broken, words, caps],
        &corpus(),
    );
    let names: Vec<&str> = ranked.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names.len(), 3);
    assert_eq!(names[0], "caps");
    assert_eq!(ranked[0].mean(), Some(1.0));
    assert!(names.contains(&"pipeline-1"));

    let last: &RankedPipeline = &ranked[2];
    assert_eq!(last.name, "no-features");
    assert!(last.result.as_ref().unwrap_err().is_not_ready());
}

#[test]
fn test_grid_search_over_pipeline() {
    let mut p = Pipeline::new().with_name("knn");
    p.add_feature_module(FeatureModule::new(Feature::new(Arc::new(
        ExcessiveCapitals::new(),
    ))))
    .unwrap();
    p.set_classifier(ClassifierModule::new(Box::new(KNearestNeighbors::new())));

    let mut grid = ParamGrid::new();
    grid.insert(
        "n_neighbors".into(),
        vec![ParamValue::Int(1), ParamValue::Int(3)],
    );
    grid.insert(
        "weights".into(),
        vec![
            ParamValue::Text("uniform".into()),
            ParamValue::Text("distance".into()),
        ],
    );

    let points = GridSearch::new(vec![grid])
        .with_kfold(KFold::new(5))
        .with_max_threads(2)
        .search_pipeline(&p, &corpus())
        .unwrap();
    assert_eq!(points.len(), 4);
    for pair in points.windows(2) {
        assert!(pair[0].mean() >= pair[1].mean());
    }
    assert!(points.iter().all(|pt| pt.outcome.is_ok()));
}
