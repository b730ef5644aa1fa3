//! Configuration types for imputation requests.
//!
//! A composition call takes an ordered list of [`ColumnRequest`]s and one
//! [`PipelineDefaults`]. Every optional field of a request falls back to the
//! matching default, and that resolution happens exactly once per request.
//!
//! [`ImputeConfig`] bundles both into a JSON document for the CLI.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// How missing values are replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum StrategyKind {
    /// The type's zero value (0, empty text, false, zero instant)
    #[default]
    #[serde(alias = "Def", alias = "default", alias = "def")]
    Default,
    /// The mean of the observed values
    #[serde(alias = "mean")]
    Mean,
    /// The smallest observed value
    #[serde(alias = "Min", alias = "min", alias = "minimum")]
    Minimum,
    /// The largest observed value
    #[serde(alias = "Max", alias = "max", alias = "maximum")]
    Maximum,
}

impl StrategyKind {
    /// Whether the strategy needs statistics over observed values.
    pub fn is_statistical(&self) -> bool {
        !matches!(self, StrategyKind::Default)
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StrategyKind::Default => "default",
            StrategyKind::Mean => "mean",
            StrategyKind::Minimum => "minimum",
            StrategyKind::Maximum => "maximum",
        };
        f.write_str(name)
    }
}

impl FromStr for StrategyKind {
    type Err = ConfigValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" | "def" => Ok(StrategyKind::Default),
            "mean" => Ok(StrategyKind::Mean),
            "minimum" | "min" => Ok(StrategyKind::Minimum),
            "maximum" | "max" => Ok(StrategyKind::Maximum),
            _ => Err(ConfigValidationError::UnknownStrategy(s.to_string())),
        }
    }
}

/// Pipeline-wide fallbacks for unset request fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineDefaults {
    /// Replacement strategy.
    /// Default: `StrategyKind::Default`
    pub strategy: StrategyKind,

    /// Whether vector columns are imputed per slot.
    /// Variable-length vectors always fall back to whole-column imputation
    /// when their request leaves this unset.
    /// Default: true
    pub impute_by_slot: bool,

    /// Whether a missing-value indicator is merged into each output.
    /// Default: true
    pub emit_indicator: bool,
}

impl Default for PipelineDefaults {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::default(),
            impute_by_slot: true,
            emit_indicator: true,
        }
    }
}

impl PipelineDefaults {
    /// Create a new defaults builder.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let defaults = PipelineDefaults::builder()
    ///     .strategy(StrategyKind::Mean)
    ///     .emit_indicator(false)
    ///     .build();
    /// ```
    pub fn builder() -> PipelineDefaultsBuilder {
        PipelineDefaultsBuilder::default()
    }
}

/// Builder for [`PipelineDefaults`] with fluent API.
#[derive(Debug, Default)]
pub struct PipelineDefaultsBuilder {
    strategy: Option<StrategyKind>,
    impute_by_slot: Option<bool>,
    emit_indicator: Option<bool>,
}

impl PipelineDefaultsBuilder {
    /// Set the default replacement strategy.
    pub fn strategy(mut self, strategy: StrategyKind) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Set whether vector columns are imputed per slot by default.
    pub fn impute_by_slot(mut self, by_slot: bool) -> Self {
        self.impute_by_slot = Some(by_slot);
        self
    }

    /// Set whether indicators are emitted by default.
    pub fn emit_indicator(mut self, emit: bool) -> Self {
        self.emit_indicator = Some(emit);
        self
    }

    /// Build the defaults.
    pub fn build(self) -> PipelineDefaults {
        let fallback = PipelineDefaults::default();
        PipelineDefaults {
            strategy: self.strategy.unwrap_or(fallback.strategy),
            impute_by_slot: self.impute_by_slot.unwrap_or(fallback.impute_by_slot),
            emit_indicator: self.emit_indicator.unwrap_or(fallback.emit_indicator),
        }
    }
}

/// One imputation request.
///
/// Unset fields fall back to [`PipelineDefaults`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRequest {
    /// Name of the column produced in the output.
    #[serde(alias = "name")]
    pub output: String,

    /// Name of the column read from the input. Defaults to `output`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<StrategyKind>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impute_by_slot: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emit_indicator: Option<bool>,
}

impl ColumnRequest {
    /// Request imputation of `output` in place (the source has the same name).
    pub fn new(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            source: None,
            strategy: None,
            impute_by_slot: None,
            emit_indicator: None,
        }
    }

    /// Read values from a differently named source column.
    pub fn from_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn strategy(mut self, strategy: StrategyKind) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn impute_by_slot(mut self, by_slot: bool) -> Self {
        self.impute_by_slot = Some(by_slot);
        self
    }

    pub fn emit_indicator(mut self, emit: bool) -> Self {
        self.emit_indicator = Some(emit);
        self
    }

    /// The column read from the input.
    pub fn source_name(&self) -> &str {
        self.source.as_deref().unwrap_or(&self.output)
    }
}

/// Parse a CLI column spec of the form `output` or `output=source`.
impl FromStr for ColumnRequest {
    type Err = ConfigValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (output, source) = match s.split_once('=') {
            Some((output, source)) => (output.trim(), Some(source.trim())),
            None => (s.trim(), None),
        };
        if output.is_empty() || source.is_some_and(str::is_empty) {
            return Err(ConfigValidationError::MalformedColumnSpec(s.to_string()));
        }
        let request = ColumnRequest::new(output);
        Ok(match source {
            Some(source) => request.from_source(source),
            None => request,
        })
    }
}

/// A complete imputation configuration as stored on disk.
///
/// ```json
/// {
///   "defaults": { "strategy": "Mean", "emit_indicator": false },
///   "columns": [
///     { "output": "age" },
///     { "output": "income_filled", "source": "income", "strategy": "max", "emit_indicator": true }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImputeConfig {
    #[serde(default)]
    pub defaults: PipelineDefaults,
    pub columns: Vec<ColumnRequest>,
}

impl ImputeConfig {
    /// Parse and validate a configuration from JSON text.
    pub fn from_json_str(json: &str) -> crate::error::Result<Self> {
        let config: ImputeConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> crate::error::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        validate_requests(&self.columns)
    }
}

/// Reject requests with blank output or source names.
pub fn validate_requests(requests: &[ColumnRequest]) -> Result<(), ConfigValidationError> {
    for (index, request) in requests.iter().enumerate() {
        if request.output.trim().is_empty() {
            return Err(ConfigValidationError::EmptyColumnName {
                index,
                field: "output".to_string(),
            });
        }
        if request.source.as_deref().is_some_and(|s| s.trim().is_empty()) {
            return Err(ConfigValidationError::EmptyColumnName {
                index,
                field: "source".to_string(),
            });
        }
    }
    Ok(())
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Request #{index} has an empty {field} column name")]
    EmptyColumnName { index: usize, field: String },

    #[error("Unknown replacement strategy '{0}' (expected default, mean, min or max)")]
    UnknownStrategy(String),

    #[error("Malformed column spec '{0}' (expected 'output' or 'output=source')")]
    MalformedColumnSpec(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pipeline_defaults() {
        let defaults = PipelineDefaults::default();
        assert_eq!(defaults.strategy, StrategyKind::Default);
        assert!(defaults.impute_by_slot);
        assert!(defaults.emit_indicator);
    }

    #[test]
    fn test_builder_custom_values() {
        let defaults = PipelineDefaults::builder()
            .strategy(StrategyKind::Maximum)
            .impute_by_slot(false)
            .emit_indicator(false)
            .build();

        assert_eq!(defaults.strategy, StrategyKind::Maximum);
        assert!(!defaults.impute_by_slot);
        assert!(!defaults.emit_indicator);
    }

    #[test]
    fn test_strategy_aliases() {
        assert_eq!("min".parse::<StrategyKind>().unwrap(), StrategyKind::Minimum);
        assert_eq!("Minimum".parse::<StrategyKind>().unwrap(), StrategyKind::Minimum);
        assert_eq!("MAX".parse::<StrategyKind>().unwrap(), StrategyKind::Maximum);
        assert_eq!("def".parse::<StrategyKind>().unwrap(), StrategyKind::Default);
        assert!(matches!(
            "median".parse::<StrategyKind>(),
            Err(ConfigValidationError::UnknownStrategy(_))
        ));
    }

    #[test]
    fn test_column_spec_parsing() {
        let request: ColumnRequest = "age".parse().unwrap();
        assert_eq!(request.output, "age");
        assert_eq!(request.source_name(), "age");

        let request: ColumnRequest = "age_filled=age".parse().unwrap();
        assert_eq!(request.output, "age_filled");
        assert_eq!(request.source_name(), "age");

        assert!("=age".parse::<ColumnRequest>().is_err());
        assert!("age=".parse::<ColumnRequest>().is_err());
    }

    #[test]
    fn test_impute_config_from_json() {
        let json = r#"{
            "defaults": { "strategy": "Mean", "emit_indicator": false },
            "columns": [
                { "output": "age" },
                { "name": "income_filled", "source": "income", "strategy": "max", "impute_by_slot": false }
            ]
        }"#;

        let config = ImputeConfig::from_json_str(json).expect("Should deserialize config JSON");

        assert_eq!(config.defaults.strategy, StrategyKind::Mean);
        assert!(!config.defaults.emit_indicator);
        // Unspecified defaults keep their built-in values
        assert!(config.defaults.impute_by_slot);
        assert_eq!(config.columns.len(), 2);
        assert_eq!(config.columns[0].strategy, None);
        assert_eq!(config.columns[1].output, "income_filled");
        assert_eq!(config.columns[1].source_name(), "income");
        assert_eq!(config.columns[1].strategy, Some(StrategyKind::Maximum));
        assert_eq!(config.columns[1].impute_by_slot, Some(false));
    }

    #[test]
    fn test_validation_rejects_empty_names() {
        let json = r#"{ "columns": [ { "output": "ok" }, { "output": "  " } ] }"#;
        let result = ImputeConfig::from_json_str(json);

        assert!(matches!(
            result,
            Err(crate::error::ImputeError::Validation(
                ConfigValidationError::EmptyColumnName { index: 1, .. }
            ))
        ));
    }

    #[test]
    fn test_request_serialization_skips_unset_fields() {
        let request = ColumnRequest::new("age").strategy(StrategyKind::Mean);
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(json, r#"{"output":"age","strategy":"Mean"}"#);
    }
}
