//! Validation engine for pipeline specifications.
//!
//! The engine runs all registered [`ValidationRule`]s against a
//! [`PipelineSpec`] and collects every diagnostic into a [`ValidationReport`].
//! It never short-circuits on the first error, so users see all problems at
//! once.
//!
//! # Quick start
//!
//! ```rust,ignore
//! use socialmeter::pipeline::validation::ValidationEngine;
//!
//! let engine = ValidationEngine::with_defaults();
//! let report = engine.validate(&spec);
//! if report.has_errors() {
//!     for err in report.errors() {
//!         eprintln!("{err}");
//!     }
//! }
//! ```

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use super::error_code::ErrorCode;
use super::errors::PipelineSpecError;
use super::spec::*;
use crate::classify::backend_from_name;
use crate::discretize::{DiscreteRule, RESERVED_LABEL};
use crate::nlp::StopwordList;
use crate::types::{CLASSIFICATION_FIELD, TEXT_FIELD};

// ─── Severity ───────────────────────────────────────────────────────────────

/// Whether a diagnostic is a hard error or a soft warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

// ─── Diagnostic ─────────────────────────────────────────────────────────────

/// A single validation finding: a [`PipelineSpecError`] plus its severity.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationDiagnostic {
    pub severity: Severity,
    #[serde(flatten)]
    pub error: PipelineSpecError,
}

impl ValidationDiagnostic {
    pub fn error(err: PipelineSpecError) -> Self {
        Self {
            severity: Severity::Error,
            error: err,
        }
    }

    pub fn warning(err: PipelineSpecError) -> Self {
        Self {
            severity: Severity::Warning,
            error: err,
        }
    }
}

// ─── Report ─────────────────────────────────────────────────────────────────

/// Collected diagnostics from running all validation rules.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub diagnostics: Vec<ValidationDiagnostic>,
}

impl ValidationReport {
    /// Iterate over error-severity diagnostics.
    pub fn errors(&self) -> impl Iterator<Item = &PipelineSpecError> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .map(|d| &d.error)
    }

    /// Iterate over warning-severity diagnostics.
    pub fn warnings(&self) -> impl Iterator<Item = &PipelineSpecError> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .map(|d| &d.error)
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Returns `true` if there are no errors (warnings are acceptable).
    pub fn is_valid(&self) -> bool {
        !self.has_errors()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

// ─── Rule trait ─────────────────────────────────────────────────────────────

/// A single validation rule that inspects a [`PipelineSpec`] and returns
/// zero or more diagnostics.
///
/// Rules are stateless and must be `Send + Sync` so a long-lived engine can
/// be shared across threads.
pub trait ValidationRule: Send + Sync {
    /// Short, stable identifier for this rule (e.g., `"discrete_rules"`).
    fn name(&self) -> &str;

    /// Inspect `spec` and return any findings.
    fn validate(&self, spec: &PipelineSpec) -> Vec<ValidationDiagnostic>;
}

// ─── Engine ─────────────────────────────────────────────────────────────────

/// Runs a set of [`ValidationRule`]s against a [`PipelineSpec`] and collects
/// all diagnostics into a [`ValidationReport`].
pub struct ValidationEngine {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl ValidationEngine {
    /// Create an empty engine with no rules.
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Create an engine pre-loaded with the default rule set.
    pub fn with_defaults() -> Self {
        let mut engine = Self::new();
        engine.add_rule(Box::new(VersionRule));
        engine.add_rule(Box::new(RequiredStagesRule));
        engine.add_rule(Box::new(ModuleTypesRule));
        engine.add_rule(Box::new(DiscreteRulesRule));
        engine.add_rule(Box::new(DuplicateKeysRule));
        engine.add_rule(Box::new(ModuleParamsRule));
        engine.add_rule(Box::new(RuntimeLimitsRule));
        engine.add_rule(Box::new(UnknownFieldsRule));
        engine
    }

    /// Register an additional rule.
    pub fn add_rule(&mut self, rule: Box<dyn ValidationRule>) {
        self.rules.push(rule);
    }

    /// Names of the registered rules, in run order.
    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Run all rules against `spec` and return the collected report.
    pub fn validate(&self, spec: &PipelineSpec) -> ValidationReport {
        let mut report = ValidationReport::default();
        for rule in &self.rules {
            report.diagnostics.extend(rule.validate(spec));
        }
        report
    }
}

impl Default for ValidationEngine {
    fn default() -> Self {
        Self::with_defaults()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  Concrete rules
// ═══════════════════════════════════════════════════════════════════════════

// ─── 1. Spec version ────────────────────────────────────────────────────────

struct VersionRule;

impl ValidationRule for VersionRule {
    fn name(&self) -> &str {
        "version"
    }

    fn validate(&self, spec: &PipelineSpec) -> Vec<ValidationDiagnostic> {
        if spec.v == SPEC_VERSION {
            return vec![];
        }
        vec![ValidationDiagnostic::error(
            PipelineSpecError::new(
                ErrorCode::InvalidValue,
                "/v",
                format!("unsupported spec version {}", spec.v),
            )
            .with_hint(format!("Set \"v\": {SPEC_VERSION}")),
        )]
    }
}

// ─── 2. Required stages ─────────────────────────────────────────────────────

/// Features and a classifier are required. Input and outputs can be supplied
/// by the builder, so their absence is only a warning.
struct RequiredStagesRule;

impl ValidationRule for RequiredStagesRule {
    fn name(&self) -> &str {
        "required_stages"
    }

    fn validate(&self, spec: &PipelineSpec) -> Vec<ValidationDiagnostic> {
        let mut out = Vec::new();
        if spec.features.is_empty() {
            out.push(ValidationDiagnostic::error(
                PipelineSpecError::new(
                    ErrorCode::MissingStage,
                    "/features",
                    "at least one feature module is required",
                )
                .with_hint(format!("Add a feature: {}", FeatureType::NAMES.join(", "))),
            ));
        }
        if spec.classifier.is_none() {
            out.push(ValidationDiagnostic::error(
                PipelineSpecError::new(
                    ErrorCode::MissingStage,
                    "/classifier",
                    "a classifier module is required",
                )
                .with_hint("Add {\"type\": \"gaussian_nb\"} or {\"type\": \"knn\"}"),
            ));
        }
        if spec.input.is_none() {
            out.push(ValidationDiagnostic::warning(
                PipelineSpecError::new(ErrorCode::MissingStage, "/input", "no input module")
                    .with_hint("Supply one with SpecPipelineBuilder::with_input_source"),
            ));
        }
        if spec.outputs.is_empty() {
            out.push(ValidationDiagnostic::warning(
                PipelineSpecError::new(ErrorCode::MissingStage, "/outputs", "no output module")
                    .with_hint("Supply one with SpecPipelineBuilder::with_sink"),
            ));
        }
        out
    }
}

// ─── 3. Module type names ───────────────────────────────────────────────────

struct ModuleTypesRule;

impl ModuleTypesRule {
    fn check(path: String, kind: &str, known: &[&str]) -> Option<ValidationDiagnostic> {
        if known.contains(&kind) {
            return None;
        }
        Some(ValidationDiagnostic::error(
            PipelineSpecError::new(
                ErrorCode::UnknownModule,
                path,
                format!("unknown module type \"{kind}\""),
            )
            .with_hint(format!("Known types: {}", known.join(", "))),
        ))
    }
}

impl ValidationRule for ModuleTypesRule {
    fn name(&self) -> &str {
        "module_types"
    }

    fn validate(&self, spec: &PipelineSpec) -> Vec<ValidationDiagnostic> {
        let mut out = Vec::new();
        if let Some(input) = &spec.input {
            out.extend(Self::check("/input/type".into(), &input.kind, InputType::NAMES));
        }
        for (i, p) in spec.preprocess.iter().enumerate() {
            out.extend(Self::check(
                format!("/preprocess/{i}/type"),
                &p.kind,
                PreprocessType::NAMES,
            ));
        }
        for (i, f) in spec.features.iter().enumerate() {
            out.extend(Self::check(
                format!("/features/{i}/type"),
                &f.kind,
                FeatureType::NAMES,
            ));
        }
        if let Some(classifier) = &spec.classifier {
            out.extend(Self::check(
                "/classifier/type".into(),
                &classifier.kind,
                crate::classify::BACKEND_NAMES,
            ));
        }
        for (i, o) in spec.outputs.iter().enumerate() {
            out.extend(Self::check(
                format!("/outputs/{i}/type"),
                &o.kind,
                OutputType::NAMES,
            ));
        }
        out
    }
}

// ─── 4. Discrete-format rules ───────────────────────────────────────────────

struct DiscreteRulesRule;

impl ValidationRule for DiscreteRulesRule {
    fn name(&self) -> &str {
        "discrete_rules"
    }

    fn validate(&self, spec: &PipelineSpec) -> Vec<ValidationDiagnostic> {
        let mut out = Vec::new();
        for (i, feature) in spec.features.iter().enumerate() {
            for (j, rule) in feature.rules.iter().enumerate() {
                if let Err(err) = rule.parse::<DiscreteRule>() {
                    out.push(ValidationDiagnostic::error(
                        PipelineSpecError::new(
                            ErrorCode::InvalidRule,
                            format!("/features/{i}/rules/{j}"),
                            err.to_string(),
                        )
                        .with_hint("Use lo-hi, lo_hi, bound< or bound>"),
                    ));
                }
            }
            for (j, _) in feature.labels.iter().enumerate().filter(|(_, &l)| l == RESERVED_LABEL) {
                out.push(ValidationDiagnostic::error(
                    PipelineSpecError::new(
                        ErrorCode::InvalidValue,
                        format!("/features/{i}/labels/{j}"),
                        format!("label {RESERVED_LABEL} is reserved for values no rule matches"),
                    )
                    .with_hint("Pick another label; unmatched values already encode as -1"),
                ));
            }
            if feature.rules.len() != feature.labels.len() {
                out.push(ValidationDiagnostic::error(
                    PipelineSpecError::new(
                        ErrorCode::InvalidValue,
                        format!("/features/{i}/labels"),
                        format!(
                            "{} rule(s) but {} label(s)",
                            feature.rules.len(),
                            feature.labels.len()
                        ),
                    )
                    .with_hint("Give exactly one label per rule"),
                ));
            }
        }
        out
    }
}

// ─── 5. Unique output keys ──────────────────────────────────────────────────

struct DuplicateKeysRule;

impl ValidationRule for DuplicateKeysRule {
    fn name(&self) -> &str {
        "duplicate_keys"
    }

    fn validate(&self, spec: &PipelineSpec) -> Vec<ValidationDiagnostic> {
        let mut out = Vec::new();
        let mut seen: HashSet<&str> = [TEXT_FIELD, CLASSIFICATION_FIELD].into_iter().collect();

        let keys = spec
            .schema
            .input_fields
            .iter()
            .enumerate()
            .map(|(i, k)| (format!("/schema/input_fields/{i}"), k.as_str()))
            .chain(
                spec.preprocess
                    .iter()
                    .enumerate()
                    .map(|(i, p)| (format!("/preprocess/{i}/key"), p.key())),
            )
            .chain(
                spec.features
                    .iter()
                    .enumerate()
                    .map(|(i, f)| (format!("/features/{i}/key"), f.key())),
            );

        for (path, key) in keys {
            if !seen.insert(key) {
                out.push(ValidationDiagnostic::error(
                    PipelineSpecError::new(
                        ErrorCode::DuplicateKey,
                        path,
                        format!("key \"{key}\" is already in the schema"),
                    )
                    .with_hint("Give the module a distinct \"key\""),
                ));
            }
        }
        out
    }
}

// ─── 6. Per-module parameters ───────────────────────────────────────────────

struct ModuleParamsRule;

impl ModuleParamsRule {
    fn invalid(path: String, message: impl Into<String>, hint: &str) -> ValidationDiagnostic {
        ValidationDiagnostic::error(
            PipelineSpecError::new(ErrorCode::InvalidValue, path, message).with_hint(hint),
        )
    }
}

impl ValidationRule for ModuleParamsRule {
    fn name(&self) -> &str {
        "module_params"
    }

    fn validate(&self, spec: &PipelineSpec) -> Vec<ValidationDiagnostic> {
        let mut out = Vec::new();

        if let Some(input) = &spec.input {
            if InputType::from_name(&input.kind) == Some(InputType::JsonLines)
                && input.path.is_none()
            {
                out.push(Self::invalid(
                    "/input/path".into(),
                    "json_lines input requires a path",
                    "Set \"path\" to a newline-delimited JSON file",
                ));
            }
        }

        for (i, p) in spec.preprocess.iter().enumerate() {
            match PreprocessType::from_name(&p.kind) {
                Some(PreprocessType::Ngrams) if !p.n.is_some_and(|n| n > 0) => {
                    out.push(Self::invalid(
                        format!("/preprocess/{i}/n"),
                        "ngrams requires n > 0",
                        "Set \"n\" to the gram size, e.g. 2",
                    ));
                }
                Some(PreprocessType::StopWords) => {
                    if let Some(language) = &p.language {
                        if let Err(err) = StopwordList::for_language(language) {
                            out.push(Self::invalid(
                                format!("/preprocess/{i}/language"),
                                err.to_string(),
                                "Use one of en, de, fr, es, it, pt, nl, sv, da, fi",
                            ));
                        }
                    }
                }
                _ => {}
            }
        }

        if let Some(classifier) = &spec.classifier {
            if let Ok(mut backend) = backend_from_name(&classifier.kind) {
                for (name, value) in &classifier.params {
                    if let Err(err) = backend.set_param(name, value) {
                        out.push(Self::invalid(
                            format!("/classifier/params/{name}"),
                            err.to_string(),
                            "Check the parameter name and value type",
                        ));
                    }
                }
            }
        }

        for (i, o) in spec.outputs.iter().enumerate() {
            if OutputType::from_name(&o.kind) == Some(OutputType::Csv) && o.path.is_none() {
                out.push(Self::invalid(
                    format!("/outputs/{i}/path"),
                    "csv output requires a path",
                    "Set \"path\" to the file to append to",
                ));
            }
        }
        out
    }
}

// ─── 7. Runtime limits must be positive when set ────────────────────────────

struct RuntimeLimitsRule;

impl ValidationRule for RuntimeLimitsRule {
    fn name(&self) -> &str {
        "runtime_limits"
    }

    fn validate(&self, spec: &PipelineSpec) -> Vec<ValidationDiagnostic> {
        let mut out = Vec::new();

        if spec.runtime.max_threads == Some(0) {
            out.push(ValidationDiagnostic::error(
                PipelineSpecError::new(
                    ErrorCode::LimitExceeded,
                    "/runtime/max_threads",
                    "max_threads must be greater than 0",
                )
                .with_hint("Remove max_threads to use all cores, or set it to a positive value"),
            ));
        }
        if let Some(n) = spec.runtime.n_folds {
            if n < 2 {
                out.push(ValidationDiagnostic::error(
                    PipelineSpecError::new(
                        ErrorCode::LimitExceeded,
                        "/runtime/n_folds",
                        format!("n_folds must be at least 2, got {n}"),
                    )
                    .with_hint(format!("Remove n_folds to use {DEFAULT_FOLDS}")),
                ));
            }
        }

        out
    }
}

// ─── 8. Unknown fields (strict → error, non-strict → warning) ──────────────

struct UnknownFieldsRule;

impl UnknownFieldsRule {
    /// Collect unknown-field diagnostics at the given JSON pointer `path`
    /// from a `HashMap` of extra fields captured by `#[serde(flatten)]`.
    fn check_unknowns(
        path: &str,
        unknowns: &HashMap<String, serde_json::Value>,
        strict: bool,
    ) -> Vec<ValidationDiagnostic> {
        let mut keys: Vec<&String> = unknowns.keys().collect();
        keys.sort();
        keys.into_iter()
            .map(|key| {
                let diag_fn = if strict {
                    ValidationDiagnostic::error
                } else {
                    ValidationDiagnostic::warning
                };
                diag_fn(
                    PipelineSpecError::new(
                        ErrorCode::UnknownField,
                        format!("{path}/{key}"),
                        format!("unrecognized field \"{key}\""),
                    )
                    .with_hint("Check spelling or remove this field"),
                )
            })
            .collect()
    }
}

impl ValidationRule for UnknownFieldsRule {
    fn name(&self) -> &str {
        "unknown_fields"
    }

    fn validate(&self, spec: &PipelineSpec) -> Vec<ValidationDiagnostic> {
        let strict = spec.strict;
        let mut out = Vec::new();
        out.extend(Self::check_unknowns("", &spec.unknown_fields, strict));
        out.extend(Self::check_unknowns(
            "/schema",
            &spec.schema.unknown_fields,
            strict,
        ));
        if let Some(input) = &spec.input {
            out.extend(Self::check_unknowns("/input", &input.unknown_fields, strict));
        }
        for (i, p) in spec.preprocess.iter().enumerate() {
            out.extend(Self::check_unknowns(
                &format!("/preprocess/{i}"),
                &p.unknown_fields,
                strict,
            ));
        }
        for (i, f) in spec.features.iter().enumerate() {
            out.extend(Self::check_unknowns(
                &format!("/features/{i}"),
                &f.unknown_fields,
                strict,
            ));
        }
        if let Some(classifier) = &spec.classifier {
            out.extend(Self::check_unknowns(
                "/classifier",
                &classifier.unknown_fields,
                strict,
            ));
        }
        for (i, o) in spec.outputs.iter().enumerate() {
            out.extend(Self::check_unknowns(
                &format!("/outputs/{i}"),
                &o.unknown_fields,
                strict,
            ));
        }
        out.extend(Self::check_unknowns(
            "/runtime",
            &spec.runtime.unknown_fields,
            strict,
        ));
        out
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════════
