//! Error types for socialmeter
//!
//! This module defines the error type used throughout the library. Variants
//! fall into four families that callers handle differently:
//!
//! - **configuration** errors are reported at call time and never coerced
//!   into defaults (bad discrete-format rules, missing config keys, a
//!   classifier used before training);
//! - **data** errors describe a malformed item or corpus row;
//! - **backend** errors come from a classifier fit/predict;
//! - **readiness** errors name the pipeline stages that are still unattached.

use thiserror::Error;

use crate::pipeline::errors::PipelineRuntimeError;
use crate::pipeline::traits::StageType;

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, SocialMeterError>;

/// Main error type for socialmeter
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SocialMeterError {
    /// A discrete-format rule string could not be parsed
    #[error("Invalid discrete format rule '{rule}': {message}")]
    InvalidRule { rule: String, message: String },

    /// Configuration validation failed
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// A configuration file is missing a required section or key
    #[error("Missing configuration key '{key}' in section '{section}'")]
    MissingConfigKey { section: String, key: String },

    /// A classifier was asked to predict before it was trained
    #[error("Classifier not trained: {message}")]
    NotTrained { message: String },

    /// A schema field name was added twice
    #[error("Duplicate schema field '{field}'")]
    DuplicateField { field: String },

    /// An item was asked to store a field its schema does not declare
    #[error("Unknown field '{field}'")]
    UnknownField { field: String },

    /// A derived field was written twice
    #[error("Field '{field}' was already written")]
    FieldConflict { field: String },

    /// Malformed item data
    #[error("Data error: {message}")]
    Data { message: String },

    /// A corpus row is malformed
    #[error("Corpus line {line}: {message}")]
    CorpusRow { line: usize, message: String },

    /// The classifier backend failed to fit or predict
    #[error("Backend error: {message}")]
    Backend { message: String },

    /// One or more pipeline stages have no module attached
    #[error("Pipeline not ready, unattached stage(s): {}", join_stages(.stages))]
    NotReady { stages: Vec<StageType> },

    /// A module failed while an item was being dispatched
    #[error(transparent)]
    Stage(#[from] PipelineRuntimeError),

    /// I/O failure (file access, input source thread)
    #[error("I/O error: {message}")]
    Io { message: String },

    /// JSON / CSV serialization or deserialization error
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Internal error (should not occur in normal usage)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

fn join_stages(stages: &[StageType]) -> String {
    stages
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl SocialMeterError {
    /// Create an invalid rule error
    pub fn invalid_rule(rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidRule {
            rule: rule.into(),
            message: message.into(),
        }
    }

    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a missing config key error
    pub fn missing_config_key(section: impl Into<String>, key: impl Into<String>) -> Self {
        Self::MissingConfigKey {
            section: section.into(),
            key: key.into(),
        }
    }

    /// Create a not-trained error
    pub fn not_trained(message: impl Into<String>) -> Self {
        Self::NotTrained {
            message: message.into(),
        }
    }

    /// Create a data error
    pub fn data(message: impl Into<String>) -> Self {
        Self::Data {
            message: message.into(),
        }
    }

    /// Create a corpus row error
    pub fn corpus_row(line: usize, message: impl Into<String>) -> Self {
        Self::CorpusRow {
            line,
            message: message.into(),
        }
    }

    /// Create a backend error
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Create an I/O error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Check if this error is a setup problem the caller must fix before
    /// running again
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidRule { .. }
                | Self::InvalidConfig { .. }
                | Self::MissingConfigKey { .. }
                | Self::NotTrained { .. }
                | Self::DuplicateField { .. }
        )
    }

    /// Check if this error describes malformed input data
    pub fn is_data(&self) -> bool {
        matches!(
            self,
            Self::UnknownField { .. }
                | Self::FieldConflict { .. }
                | Self::Data { .. }
                | Self::CorpusRow { .. }
        )
    }

    /// Check if this error indicates unattached pipeline stages
    pub fn is_not_ready(&self) -> bool {
        matches!(self, Self::NotReady { .. })
    }
}

impl From<serde_json::Error> for SocialMeterError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

impl From<csv::Error> for SocialMeterError {
    fn from(err: csv::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

impl From<std::io::Error> for SocialMeterError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}

impl From<regex::Error> for SocialMeterError {
    fn from(err: regex::Error) -> Self {
        Self::internal(format!("pattern failed to compile: {err}"))
    }
}
