//! Pipeline specification types.
//!
//! A [`PipelineSpec`] describes which modules to attach to each pipeline
//! stage, runtime limits for the validation harness, and strictness settings.
//! These types are the input to the
//! [`ValidationEngine`](super::validation::ValidationEngine) and the
//! [`SpecPipelineBuilder`](super::spec_builder::SpecPipelineBuilder).
//!
//! # JSON shape
//!
//! ```json
//! {
//!   "v": 1,
//!   "name": "caps-and-length",
//!   "schema": { "input_fields": ["user"] },
//!   "input": { "type": "json_lines", "path": "posts.jsonl" },
//!   "preprocess": [{ "type": "hashtag_normalizer" }],
//!   "features": [
//!     { "type": "word_count", "rules": ["0_2", "3<"], "labels": [0, 1] },
//!     { "type": "excessive_capitals", "key": "caps" }
//!   ],
//!   "classifier": {
//!     "type": "gaussian_nb",
//!     "params": { "var_smoothing": 1e-9 },
//!     "labels": { "0": "negative", "1": "positive" }
//!   },
//!   "outputs": [{ "type": "dict_format" }],
//!   "runtime": { "n_folds": 5, "max_threads": 4 },
//!   "strict": false
//! }
//! ```
//!
//! Module `type` names are plain strings so that validation can report every
//! unknown name at once instead of failing at the first during parsing.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::classify::{LabelMapping, ParamMap};
use crate::errors::{Result, SocialMeterError};

/// The only spec version understood by this crate.
pub const SPEC_VERSION: u32 = 1;

/// Default fold count for cross-validation.
pub const DEFAULT_FOLDS: usize = 5;

/// Top-level pipeline specification (v1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSpec {
    /// Spec version (currently `1`).
    pub v: u32,

    /// Name reported by pipeline comparisons.
    #[serde(default)]
    pub name: Option<String>,

    /// Extra input fields kept from raw records.
    #[serde(default)]
    pub schema: SchemaSpec,

    /// Input source. May be omitted for pipelines used only for training and
    /// validation, or supplied through the builder.
    #[serde(default)]
    pub input: Option<InputSpec>,

    /// Preprocess modules, applied in order.
    #[serde(default)]
    pub preprocess: Vec<PreprocessSpec>,

    /// Feature modules, in classifier column order.
    #[serde(default)]
    pub features: Vec<FeatureSpec>,

    #[serde(default)]
    pub classifier: Option<ClassifierSpec>,

    /// Output sinks, chained in order.
    #[serde(default)]
    pub outputs: Vec<OutputSpec>,

    /// Runtime execution limits.
    #[serde(default)]
    pub runtime: RuntimeSpec,

    /// If `true`, unrecognized fields are errors; if `false`, warnings.
    #[serde(default)]
    pub strict: bool,

    /// Captures any fields not recognized by the schema.
    /// Used by the strict-mode validation rule.
    #[serde(flatten)]
    pub unknown_fields: HashMap<String, serde_json::Value>,
}

impl PipelineSpec {
    /// Parse a spec from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Schema additions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaSpec {
    /// Record fields to keep alongside `text` (e.g. `user`, `id`).
    #[serde(default)]
    pub input_fields: Vec<String>,

    #[serde(flatten)]
    pub unknown_fields: HashMap<String, serde_json::Value>,
}

// ─── Module specs ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputSpec {
    #[serde(rename = "type")]
    pub kind: String,

    /// File to read (`json_lines`).
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Keep items that arrive without text.
    #[serde(default)]
    pub allow_empty_text: bool,

    #[serde(flatten)]
    pub unknown_fields: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessSpec {
    #[serde(rename = "type")]
    pub kind: String,

    /// Output key; defaults to the type name.
    #[serde(default)]
    pub key: Option<String>,

    /// Gram size (`ngrams`).
    #[serde(default)]
    pub n: Option<usize>,

    /// Stop word language code (`stop_words`); English when absent.
    #[serde(default)]
    pub language: Option<String>,

    #[serde(flatten)]
    pub unknown_fields: HashMap<String, serde_json::Value>,
}

impl PreprocessSpec {
    pub fn key(&self) -> &str {
        self.key.as_deref().unwrap_or(&self.kind)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSpec {
    #[serde(rename = "type")]
    pub kind: String,

    /// Output key; defaults to the type name.
    #[serde(default)]
    pub key: Option<String>,

    /// Discrete-format rules, first match wins.
    #[serde(default)]
    pub rules: Vec<String>,

    /// One label per rule.
    #[serde(default)]
    pub labels: Vec<i64>,

    /// Lexicon or emoticon file (`adjective_ratio`, `emoticon_sentiment`).
    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(flatten)]
    pub unknown_fields: HashMap<String, serde_json::Value>,
}

impl FeatureSpec {
    pub fn key(&self) -> &str {
        self.key.as_deref().unwrap_or(&self.kind)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierSpec {
    #[serde(rename = "type")]
    pub kind: String,

    /// Backend hyperparameters.
    #[serde(default)]
    pub params: ParamMap,

    /// Display names for backend labels.
    #[serde(default)]
    pub labels: Option<LabelMapping>,

    #[serde(flatten)]
    pub unknown_fields: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSpec {
    #[serde(rename = "type")]
    pub kind: String,

    /// File to append to (`csv`).
    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(flatten)]
    pub unknown_fields: HashMap<String, serde_json::Value>,
}

// ─── Module type enums ──────────────────────────────────────────────────────

/// Input source kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputType {
    /// Empty in-memory source; records are dispatched by the caller.
    Memory,
    /// Newline-delimited JSON file.
    JsonLines,
}

impl InputType {
    pub const NAMES: &'static [&'static str] = &["memory", "json_lines"];

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "memory" => Some(Self::Memory),
            "json_lines" => Some(Self::JsonLines),
            _ => None,
        }
    }
}

/// Preprocess transform kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreprocessType {
    HashtagNormalizer,
    MentionNormalizer,
    Ngrams,
    StopWords,
    Tokenize,
    PosTag,
}

impl PreprocessType {
    pub const NAMES: &'static [&'static str] = &[
        "hashtag_normalizer",
        "mention_normalizer",
        "ngrams",
        "stop_words",
        "tokenize",
        "pos_tag",
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "hashtag_normalizer" => Some(Self::HashtagNormalizer),
            "mention_normalizer" => Some(Self::MentionNormalizer),
            "ngrams" => Some(Self::Ngrams),
            "stop_words" => Some(Self::StopWords),
            "tokenize" => Some(Self::Tokenize),
            "pos_tag" => Some(Self::PosTag),
            _ => None,
        }
    }
}

/// Feature extractor kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureType {
    AdjectiveCount,
    AdjectiveRatio,
    ExcessiveCapitals,
    ExcessivePunctuation,
    HashtagCount,
    NegationParity,
    WordCount,
    EmoticonSentiment,
}

impl FeatureType {
    pub const NAMES: &'static [&'static str] = &[
        "adjective_count",
        "adjective_ratio",
        "excessive_capitals",
        "excessive_punctuation",
        "hashtag_count",
        "negation_parity",
        "word_count",
        "emoticon_sentiment",
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "adjective_count" => Some(Self::AdjectiveCount),
            "adjective_ratio" => Some(Self::AdjectiveRatio),
            "excessive_capitals" => Some(Self::ExcessiveCapitals),
            "excessive_punctuation" => Some(Self::ExcessivePunctuation),
            "hashtag_count" => Some(Self::HashtagCount),
            "negation_parity" => Some(Self::NegationParity),
            "word_count" => Some(Self::WordCount),
            "emoticon_sentiment" => Some(Self::EmoticonSentiment),
            _ => None,
        }
    }
}

/// Output sink kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputType {
    DictFormat,
    Console,
    Csv,
}

impl OutputType {
    pub const NAMES: &'static [&'static str] = &["dict_format", "console", "csv"];

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "dict_format" => Some(Self::DictFormat),
            "console" => Some(Self::Console),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }
}

// ─── Runtime spec ─────────────────────────────────────────────────────────

/// Runtime limits and threading controls for the validation harness.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeSpec {
    /// Maximum number of Rayon threads for parallel work.
    /// `None` uses Rayon's default (all logical cores).
    #[serde(default)]
    pub max_threads: Option<usize>,

    /// Disable parallelism entirely (equivalent to `max_threads: 1`).
    /// When `true`, overrides `max_threads`.
    #[serde(default)]
    pub single_thread: bool,

    /// Cross-validation fold count. Defaults to [`DEFAULT_FOLDS`].
    #[serde(default)]
    pub n_folds: Option<usize>,

    /// Captures any fields not recognized by the schema.
    #[serde(flatten)]
    pub unknown_fields: HashMap<String, serde_json::Value>,
}

impl RuntimeSpec {
    /// Resolve the effective thread count.
    ///
    /// - `single_thread == true` → `Some(1)`
    /// - `max_threads == Some(n)` → `Some(n)`
    /// - otherwise → `None` (use Rayon default)
    pub fn effective_threads(&self) -> Option<usize> {
        if self.single_thread {
            Some(1)
        } else {
            self.max_threads
        }
    }

    pub fn effective_folds(&self) -> usize {
        self.n_folds.unwrap_or(DEFAULT_FOLDS)
    }

    /// Build a scoped Rayon thread pool matching this config.
    ///
    /// Returns `None` when no thread limit is set (use global pool).
    pub fn build_thread_pool(&self) -> Result<Option<rayon::ThreadPool>> {
        self.effective_threads()
            .map(|n| {
                rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .build()
                    .map_err(|e| SocialMeterError::internal(format!("thread pool: {e}")))
            })
            .transpose()
    }

    /// Execute `f` within a scoped Rayon thread pool matching this config.
    ///
    /// If no thread limit is set, `f` runs directly (using the global pool).
    /// Otherwise `f` runs inside [`rayon::ThreadPool::install`], so any
    /// `par_iter()` within `f` uses the scoped pool.
    pub fn scoped<R: Send>(&self, f: impl FnOnce() -> R + Send) -> Result<R> {
        Ok(match self.build_thread_pool()? {
            Some(pool) => pool.install(f),
            None => f(),
        })
    }
}
