//! Pipeline error types for spec validation and dispatch failures.
//!
//! - [`PipelineSpecError`]: problems found while validating a
//!   [`PipelineSpec`](super::spec::PipelineSpec) (bad discrete-format rules,
//!   duplicate feature keys, unknown module types, ...)
//! - [`PipelineRuntimeError`]: a module failed while an item was being
//!   dispatched through a running pipeline
//!
//! Both carry a stable [`ErrorCode`], a JSON pointer `path` locating the
//! module (`/features/1`, `/classifier`), a human-readable `message`, and an
//! optional `hint`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::error_code::ErrorCode;
use super::traits::StageType;
use crate::errors::SocialMeterError;

// ─── Spec (build-time) errors ───────────────────────────────────────────────

/// A validation error found in a pipeline spec before any pipeline is built.
///
/// # Display format
///
/// ```text
/// [invalid_rule] /features/0/rules/1: Rule '3<5' matches no known format
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("[{code}] {path}: {message}")]
pub struct PipelineSpecError {
    /// Stable error code for programmatic matching.
    pub code: ErrorCode,

    /// JSON pointer into the spec identifying the problematic location.
    pub path: String,

    /// Human-readable description of the problem.
    pub message: String,

    /// Optional suggestion for how to fix the problem.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl PipelineSpecError {
    /// Create a new spec error.
    pub fn new(code: ErrorCode, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            path: path.into(),
            message: message.into(),
            hint: None,
        }
    }

    /// Attach a hint suggesting how to fix the problem.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

// ─── Runtime (dispatch-time) errors ─────────────────────────────────────────

/// A failure that occurred while a module processed an item.
///
/// # Display format
///
/// ```text
/// [not_trained] /classifier/0 (stage: classify): Classifier not trained: ...
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("[{code}] {path} (stage: {stage}): {message}")]
pub struct PipelineRuntimeError {
    /// Stable error code for programmatic matching.
    pub code: ErrorCode,

    /// JSON pointer identifying the failing module, e.g. `/features/2`.
    pub path: String,

    /// Name of the stage that failed (e.g., `"feature_extract"`).
    pub stage: String,

    /// Human-readable description of the failure.
    pub message: String,

    /// Optional suggestion for how to fix or work around the failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl PipelineRuntimeError {
    /// Create a new runtime error.
    pub fn new(
        code: ErrorCode,
        path: impl Into<String>,
        stage: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code,
            path: path.into(),
            stage: stage.into(),
            message: message.into(),
            hint: None,
        }
    }

    /// Attach a hint suggesting how to fix or work around the failure.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Wrap a module failure, locating it by stage and position in its link.
    pub fn from_module(stage: StageType, index: usize, err: &SocialMeterError) -> Self {
        let code = match err {
            SocialMeterError::NotTrained { .. } => ErrorCode::NotTrained,
            SocialMeterError::Backend { .. } => ErrorCode::BackendFailed,
            SocialMeterError::UnknownField { .. } => ErrorCode::UnknownField,
            SocialMeterError::FieldConflict { .. } => ErrorCode::DuplicateKey,
            _ => ErrorCode::StageFailed,
        };
        let runtime = Self::new(
            code,
            format!("{}/{}", stage.spec_path(), index),
            stage.as_str(),
            err.to_string(),
        );
        match code {
            ErrorCode::NotTrained => {
                runtime.with_hint("Call Pipeline::train before starting or dispatching")
            }
            _ => runtime,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ─── PipelineSpecError ──────────────────────────────────────────────

    #[test]
    fn test_spec_error_display() {
        let err = PipelineSpecError::new(
            ErrorCode::MissingStage,
            "/classifier",
            "A classifier module is required",
        );
        assert_eq!(
            err.to_string(),
            "[missing_stage] /classifier: A classifier module is required"
        );
    }

    #[test]
    fn test_spec_error_json_format() {
        let err = PipelineSpecError::new(
            ErrorCode::InvalidRule,
            "/features/0/rules/1",
            "Rule '3<5' matches no known format",
        )
        .with_hint("Use lo_hi, lo-hi, bound< or bound>");

        let value: serde_json::Value = serde_json::to_value(&err).unwrap();
        assert_eq!(value["code"], "invalid_rule");
        assert_eq!(value["path"], "/features/0/rules/1");
        assert_eq!(value["hint"], "Use lo_hi, lo-hi, bound< or bound>");
    }

    #[test]
    fn test_spec_error_without_hint_omits_field() {
        let err = PipelineSpecError::new(ErrorCode::DuplicateKey, "/features/2", "dup");
        let value: serde_json::Value = serde_json::to_value(&err).unwrap();
        assert!(value.get("hint").is_none());
    }

    // ─── PipelineRuntimeError ───────────────────────────────────────────

    #[test]
    fn test_runtime_error_from_not_trained() {
        let err = PipelineRuntimeError::from_module(
            StageType::Classify,
            0,
            &SocialMeterError::not_trained("no feature keys bound"),
        );
        assert_eq!(err.code, ErrorCode::NotTrained);
        assert_eq!(err.path, "/classifier/0");
        assert_eq!(err.stage, "classify");
        assert!(err.hint.is_some());
        assert!(err.to_string().starts_with("[not_trained] /classifier/0 (stage: classify)"));
    }

    #[test]
    fn test_runtime_error_serde_roundtrip() {
        let err = PipelineRuntimeError::from_module(
            StageType::FeatureExtract,
            2,
            &SocialMeterError::data("feature is not numeric"),
        );
        let json = serde_json::to_string(&err).unwrap();
        let back: PipelineRuntimeError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, err);
        assert_eq!(back.path, "/features/2");
    }
}
