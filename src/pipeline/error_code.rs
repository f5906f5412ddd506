//! Stable error codes shared by spec-validation and runtime errors.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Machine-readable error code.
///
/// Codes serialize as `snake_case` strings and are part of the public
/// contract: adding variants is fine, renaming them is a breaking change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// A required stage has no module.
    MissingStage,
    /// A field holds a value outside its allowed range.
    InvalidValue,
    /// A discrete-format rule string could not be parsed.
    InvalidRule,
    /// Two modules (or schema fields) share the same key.
    DuplicateKey,
    /// A field was not recognized by the schema.
    UnknownField,
    /// A module type name is not known to the builder.
    UnknownModule,
    /// A runtime limit was exceeded or is not positive.
    LimitExceeded,
    /// Spec validation failed (aggregate).
    ValidationFailed,
    /// A module failed while processing an item.
    StageFailed,
    /// A classifier was used before training.
    NotTrained,
    /// The classifier backend returned an error.
    BackendFailed,
}

impl ErrorCode {
    /// The `snake_case` name used in JSON and in `Display`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingStage => "missing_stage",
            Self::InvalidValue => "invalid_value",
            Self::InvalidRule => "invalid_rule",
            Self::DuplicateKey => "duplicate_key",
            Self::UnknownField => "unknown_field",
            Self::UnknownModule => "unknown_module",
            Self::LimitExceeded => "limit_exceeded",
            Self::ValidationFailed => "validation_failed",
            Self::StageFailed => "stage_failed",
            Self::NotTrained => "not_trained",
            Self::BackendFailed => "backend_failed",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_serde() {
        for code in [
            ErrorCode::MissingStage,
            ErrorCode::InvalidRule,
            ErrorCode::DuplicateKey,
            ErrorCode::BackendFailed,
        ] {
            let json = serde_json::to_string(&code).unwrap();
            assert_eq!(json, format!("\"{}\"", code));
        }
    }
}
