//! Error types for imputation pipeline composition and execution.
//!
//! Composition failures are configuration errors: they always name the
//! offending column and are never corrected silently. Errors raised while a
//! composed pipeline runs come from the stage collaborators and are passed
//! through unchanged.
//!
//! Errors serialize as `{ code, message }` so they can be emitted as JSON by
//! the CLI.

use crate::config::ConfigValidationError;
use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for the imputation composer.
#[derive(Error, Debug)]
pub enum ImputeError {
    /// No column requests were supplied.
    #[error("At least one column must be requested for imputation")]
    EmptyRequest,

    /// Two requests share the same output column name.
    #[error("Output column '{0}' is requested more than once")]
    DuplicateOutputName(String),

    /// Source column was not found in the input schema.
    #[error("Source column '{0}' not found in dataset")]
    ColumnNotFound(String),

    /// The missing-value indicator cannot be merged into the value column.
    #[error(
        "Cannot emit an indicator for column '{column}': Boolean is not representable as {item_type}"
    )]
    IncompatibleIndicator { column: String, item_type: String },

    /// Per-slot imputation was requested for a vector without a fixed length.
    #[error(
        "Column '{0}' is a variable-length vector; per-slot imputation is not possible, use whole-column imputation"
    )]
    SlotImputationUnsupported(String),

    /// Configuration file failed validation.
    #[error(transparent)]
    Validation(#[from] ConfigValidationError),

    /// The replacer cannot apply a strategy to a column of this type.
    #[error("Cannot replace missing values in column '{column}' with {strategy}: unsupported for {item_type}")]
    ReplacementUnsupported {
        column: String,
        strategy: String,
        item_type: String,
    },

    /// A stage collaborator failed while transforming data.
    #[error("{stage} stage failed: {reason}")]
    StageFailed { stage: String, reason: String },

    /// A pipeline was applied to data whose schema differs from the one it was composed for.
    #[error("Input schema does not match the composed pipeline: {0}")]
    SchemaMismatch(String),

    /// An assembled pipeline violated its own post-conditions.
    #[error("Internal invariant violated: {0}")]
    InternalInvariant(String),

    /// Several columns failed planning.
    #[error("{} columns failed planning: {}", .0.len(), join_messages(.0))]
    Multiple(Vec<ImputeError>),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<ImputeError>,
    },
}

fn join_messages(errors: &[ImputeError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl ImputeError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        ImputeError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Get a stable error code for programmatic handling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::EmptyRequest => "EMPTY_REQUEST",
            Self::DuplicateOutputName(_) => "DUPLICATE_OUTPUT_NAME",
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::IncompatibleIndicator { .. } => "INCOMPATIBLE_INDICATOR",
            Self::SlotImputationUnsupported(_) => "SLOT_IMPUTATION_UNSUPPORTED",
            Self::Validation(_) => "INVALID_CONFIG",
            Self::ReplacementUnsupported { .. } => "REPLACEMENT_UNSUPPORTED",
            Self::StageFailed { .. } => "STAGE_FAILED",
            Self::SchemaMismatch(_) => "SCHEMA_MISMATCH",
            Self::InternalInvariant(_) => "INTERNAL_ERROR",
            Self::Multiple(_) => "MULTIPLE_ERRORS",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Check if this error was caused by the caller's request rather than by
    /// the data or by a bug.
    pub fn is_configuration_error(&self) -> bool {
        match self {
            Self::EmptyRequest
            | Self::DuplicateOutputName(_)
            | Self::ColumnNotFound(_)
            | Self::IncompatibleIndicator { .. }
            | Self::SlotImputationUnsupported(_)
            | Self::Validation(_) => true,
            Self::Multiple(errors) => errors.iter().all(|e| e.is_configuration_error()),
            Self::WithContext { source, .. } => source.is_configuration_error(),
            _ => false,
        }
    }

    /// Check if this error signals a planner bug.
    pub fn is_internal(&self) -> bool {
        match self {
            Self::InternalInvariant(_) => true,
            Self::WithContext { source, .. } => source.is_internal(),
            _ => false,
        }
    }
}

impl Serialize for ImputeError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("ImputeError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for imputation operations.
pub type Result<T> = std::result::Result<T, ImputeError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| ImputeError::Polars(e).with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        assert_eq!(ImputeError::EmptyRequest.error_code(), "EMPTY_REQUEST");
        assert_eq!(
            ImputeError::ColumnNotFound("age".to_string()).error_code(),
            "COLUMN_NOT_FOUND"
        );
    }

    #[test]
    fn test_is_configuration_error() {
        assert!(ImputeError::DuplicateOutputName("age".to_string()).is_configuration_error());
        assert!(ImputeError::SlotImputationUnsupported("v".to_string()).is_configuration_error());
        assert!(!ImputeError::InternalInvariant("bad".to_string()).is_configuration_error());
        assert!(
            !ImputeError::StageFailed {
                stage: "Replacer".to_string(),
                reason: "boom".to_string()
            }
            .is_configuration_error()
        );
    }

    #[test]
    fn test_multiple_is_configuration_when_all_are() {
        let error = ImputeError::Multiple(vec![
            ImputeError::ColumnNotFound("a".to_string()),
            ImputeError::SlotImputationUnsupported("b".to_string()),
        ]);
        assert!(error.is_configuration_error());
        assert!(error.to_string().starts_with("2 columns failed planning"));
        assert!(error.to_string().contains("'a'"));
    }

    #[test]
    fn test_error_serialization() {
        let error = ImputeError::ColumnNotFound("Age".to_string());
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("COLUMN_NOT_FOUND"));
        assert!(json.contains("Age"));
    }

    #[test]
    fn test_with_context() {
        let error = ImputeError::InternalInvariant("names differ".to_string())
            .with_context("While assembling");
        assert!(error.to_string().contains("While assembling"));
        assert_eq!(error.error_code(), "INTERNAL_ERROR");
        assert!(error.is_internal());
    }
}
