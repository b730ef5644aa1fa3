//! Stage collaborators.
//!
//! A stage receives a batch of same-kind instructions and layers one
//! transformation over a [`DatasetView`]. Every instruction reads from the
//! stage's input view, never from another instruction's output. A stage
//! that writes a column removes any existing column of that name and appends
//! the new one at the end.
//!
//! The composer never builds stages directly; it goes through a
//! [`StageFactory`]. [`PolarsStageFactory`] provides the polars
//! implementations in this module.

mod coercer;
mod dropper;
mod indicator;
mod merger;
mod replacer;

pub use coercer::Coercer;
pub use dropper::Dropper;
pub use indicator::Indicator;
pub use merger::Merger;
pub use replacer::Replacer;

use crate::config::StrategyKind;
use crate::error::{Result, ResultExt};
use crate::schema::{ColumnSchema, DatasetView};
use crate::types::ItemKind;
use polars::prelude::DataFrame;
use serde::Serialize;
use std::fmt;

/// The five stage kinds, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Indicator,
    Coercer,
    Replacer,
    Merger,
    Dropper,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// =============================================================================
// Instructions
// =============================================================================

/// Add a boolean column marking which values of `source` are missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndicatorInstruction {
    pub source: String,
    pub output: String,
}

/// Re-type `column` in place to `target` items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoerceInstruction {
    pub column: String,
    pub target: ItemKind,
}

/// Fill missing values of `source` into `output`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplaceInstruction {
    pub source: String,
    pub output: String,
    pub strategy: StrategyKind,
    pub impute_by_slot: bool,
}

/// One tagged input of a merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergePart {
    pub tag: String,
    pub column: String,
}

/// Concatenate the parts, in order, into one vector column `output`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeInstruction {
    pub output: String,
    pub parts: Vec<MergePart>,
}

/// Remove `columns`, then move `output_order` to the end in that order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DropInstruction {
    pub columns: Vec<String>,
    pub output_order: Vec<String>,
}

// =============================================================================
// Stage Trait
// =============================================================================

/// A transformation applied to a dataset view.
pub trait Stage: Send + Sync + fmt::Debug {
    fn kind(&self) -> StageKind;

    /// Schema produced by this stage, computed without touching data.
    fn output_schema(&self, input: &ColumnSchema) -> Result<ColumnSchema>;

    /// Transform a frame whose columns are described by `input`.
    fn transform(&self, frame: &DataFrame, input: &ColumnSchema) -> Result<DataFrame>;

    /// Layer this stage over `input`.
    fn apply(&self, input: &DatasetView) -> Result<DatasetView> {
        let schema = self.output_schema(input.schema())?;
        let frame = self
            .transform(input.frame(), input.schema())
            .context(format!("{} stage", self.kind()))?;
        DatasetView::from_parts(frame, schema)
    }
}

/// Builds stage collaborators from instruction batches.
pub trait StageFactory: Send + Sync {
    fn indicator(&self, instructions: Vec<IndicatorInstruction>) -> Box<dyn Stage>;

    fn coercer(&self, instructions: Vec<CoerceInstruction>) -> Box<dyn Stage>;

    fn replacer(&self, instructions: Vec<ReplaceInstruction>) -> Box<dyn Stage>;

    fn merger(&self, instructions: Vec<MergeInstruction>) -> Box<dyn Stage>;

    fn dropper(&self, instruction: DropInstruction) -> Box<dyn Stage>;
}

/// Factory for the polars stage implementations.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolarsStageFactory;

impl StageFactory for PolarsStageFactory {
    fn indicator(&self, instructions: Vec<IndicatorInstruction>) -> Box<dyn Stage> {
        Box::new(Indicator::new(instructions))
    }

    fn coercer(&self, instructions: Vec<CoerceInstruction>) -> Box<dyn Stage> {
        Box::new(Coercer::new(instructions))
    }

    fn replacer(&self, instructions: Vec<ReplaceInstruction>) -> Box<dyn Stage> {
        Box::new(Replacer::new(instructions))
    }

    fn merger(&self, instructions: Vec<MergeInstruction>) -> Box<dyn Stage> {
        Box::new(Merger::new(instructions))
    }

    fn dropper(&self, instruction: DropInstruction) -> Box<dyn Stage> {
        Box::new(Dropper::new(instruction))
    }
}

/// Build a [`crate::error::ImputeError::StageFailed`] for `kind`.
pub(crate) fn stage_error(kind: StageKind, err: impl fmt::Display) -> crate::error::ImputeError {
    crate::error::ImputeError::StageFailed {
        stage: kind.to_string(),
        reason: err.to_string(),
    }
}
