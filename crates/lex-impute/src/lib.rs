//! Missing-Value Imputation Pipelines
//!
//! A schema-aware composer that turns per-column imputation requests into a
//! small, ordered pipeline of polars stages.
//!
//! # Overview
//!
//! For each requested column the composer:
//!
//! - **Resolves the request** against the pipeline defaults (strategy,
//!   per-slot vs whole-column imputation, indicator emission)
//! - **Checks the column's shape**: variable-length vectors can only be
//!   imputed as a whole
//! - **Checks the indicator**: a boolean missing-value flag must be
//!   representable in the value column's item type so the two can be merged
//! - **Allocates temporary names** that collide with nothing in the schema
//!
//! The plans are then grouped into at most five stages, always in the order
//! Indicator → Coercer → Replacer → Merger → Dropper. Empty groups are
//! omitted.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use lex_impute::{ColumnRequest, DatasetView, PipelineComposer, StrategyKind};
//! use polars::prelude::*;
//!
//! let df = df![
//!     "age" => [Some(31.0), None, Some(45.0)],
//!     "city" => [Some("Oslo"), None, Some("Lima")],
//! ]?;
//! let input = DatasetView::new(df);
//!
//! let requests = vec![
//!     ColumnRequest::new("age").strategy(StrategyKind::Mean),
//!     ColumnRequest::new("city").emit_indicator(false),
//! ];
//!
//! let pipeline = PipelineComposer::default().compose(&requests, &input)?;
//! println!("{}", pipeline.describe());
//!
//! // Only `age` and `city` are kept; `age` is now a Vector<Float64, 2>: [value, is_missing]
//! let output = pipeline.apply(&input)?;
//! ```
//!
//! # Configuration
//!
//! Requests and defaults can also be loaded from JSON with
//! [`ImputeConfig::from_json_file`]:
//!
//! ```json
//! {
//!   "defaults": { "strategy": "mean", "emit_indicator": false },
//!   "columns": [
//!     { "output": "age" },
//!     { "output": "pixels_filled", "source": "pixels", "impute_by_slot": true }
//!   ]
//! }
//! ```

pub mod config;
pub mod error;
pub mod pipeline;
pub mod planner;
pub mod schema;
pub mod stages;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use config::{
    ColumnRequest, ConfigValidationError, ImputeConfig, PipelineDefaults, PipelineDefaultsBuilder,
    StrategyKind,
};
pub use error::{ImputeError, Result as ImputeResult, ResultExt};
pub use pipeline::{
    ComposedPipeline, PipelineAssembler, PipelineComposer, PipelineComposerBuilder, StageGroup,
    compose,
};
pub use planner::{ColumnPlanner, TempNameAllocator, TypeCompatibilityChecker};
pub use schema::{ColumnSchema, DatasetView, SchemaColumn, SchemaView};
pub use stages::{PolarsStageFactory, Stage, StageFactory, StageKind};
pub use types::{ColumnPlan, ColumnShape, ColumnType, IndicatorPlan, ItemKind, PipelineSummary};
