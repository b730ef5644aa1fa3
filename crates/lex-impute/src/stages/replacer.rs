//! Missing-value replacement stage.
//!
//! Statistics are polars reductions over the observed values in their
//! physical representation, and only nulls are written: observed values keep
//! their exact bits. The replacement value is cast back to the item dtype,
//! rounded first for integral kinds when it is a mean. Text only supports the
//! default (empty string).

use super::{ReplaceInstruction, Stage, StageKind};
use crate::config::StrategyKind;
use crate::error::{ImputeError, Result};
use crate::schema::{ColumnSchema, SchemaColumn};
use crate::types::{ColumnType, ItemKind, KindCategory};
use crate::utils::{column_series, fill_nulls_cyclic, fill_nulls_with, put_column};
use polars::prelude::*;
use tracing::{debug, warn};

/// Fills missing values using a [`StrategyKind`], per slot or per column.
#[derive(Debug, Clone)]
pub struct Replacer {
    instructions: Vec<ReplaceInstruction>,
}

impl Replacer {
    pub fn new(instructions: Vec<ReplaceInstruction>) -> Self {
        Self { instructions }
    }

    /// Whether `strategy` can be applied to items of `kind`.
    pub fn supports(kind: ItemKind, strategy: StrategyKind) -> bool {
        match kind.category() {
            KindCategory::Numeric | KindCategory::TimeSpan | KindCategory::DateTime => true,
            KindCategory::Boolean => strategy != StrategyKind::Mean,
            KindCategory::Text => strategy == StrategyKind::Default,
            KindCategory::Other => false,
        }
    }

    fn check_supported(instruction: &ReplaceInstruction, column_type: &ColumnType) -> Result<()> {
        if instruction.impute_by_slot && !column_type.has_known_length() {
            return Err(ImputeError::SlotImputationUnsupported(instruction.source.clone()));
        }
        if Self::supports(column_type.item, instruction.strategy) {
            Ok(())
        } else {
            Err(ImputeError::ReplacementUnsupported {
                column: instruction.source.clone(),
                strategy: instruction.strategy.to_string(),
                item_type: column_type.to_string(),
            })
        }
    }

    fn replace(instruction: &ReplaceInstruction, series: &Series, kind: ItemKind) -> Result<Series> {
        let filled = match series.dtype() {
            DataType::Array(_, width) => Self::replace_array(instruction, series, kind, *width)?,
            DataType::List(_) => {
                // Variable-length vectors are always imputed as a whole
                let observed = series.explode(true)?;
                let fill = Self::fill_for(&observed, instruction, kind, None)?;
                series
                    .list()?
                    .apply_to_inner(&|values: Series| fill_nulls_with(&values, &fill))?
                    .into_series()
            }
            _ => {
                let fill = Self::fill_for(series, instruction, kind, None)?;
                fill_nulls_with(series, &fill)?
            }
        };
        Ok(filled.with_name(instruction.output.as_str().into()))
    }

    fn replace_array(
        instruction: &ReplaceInstruction,
        series: &Series,
        kind: ItemKind,
        width: usize,
    ) -> Result<Series> {
        // Values of the non-null rows, row-major: position % width is the slot
        let observed = series.filter(&series.is_not_null())?.explode(true)?;

        let fills = if instruction.impute_by_slot {
            let mut fills = Vec::with_capacity(width);
            for slot in 0..width {
                let positions: Vec<IdxSize> = (slot..observed.len())
                    .step_by(width)
                    .map(|i| i as IdxSize)
                    .collect();
                let values = observed.take(&IdxCa::from_vec(PlSmallStr::EMPTY, positions))?;
                fills.push(Self::fill_for(&values, instruction, kind, Some(slot))?);
            }
            fills
        } else {
            vec![Self::fill_for(&observed, instruction, kind, None)?]
        };

        Ok(series
            .array()?
            .apply_to_inner(&|values: Series| fill_nulls_cyclic(&values, &fills))?
            .into_series())
    }

    /// Replacement value for one slot (or the whole column), as a one-row
    /// series of the observed dtype.
    fn fill_for(
        observed: &Series,
        instruction: &ReplaceInstruction,
        kind: ItemKind,
        slot: Option<usize>,
    ) -> PolarsResult<Series> {
        if let Some(fill) = statistic(observed, instruction.strategy, kind)? {
            return Ok(fill);
        }
        match slot {
            Some(slot) => warn!(
                "No observed values in slot {} of '{}'; using default for {}",
                slot, instruction.source, instruction.strategy
            ),
            None => warn!(
                "No observed values in '{}'; using default for {}",
                instruction.source, instruction.strategy
            ),
        }
        default_value(observed.dtype())
    }
}

/// `strategy` over the observed values, or `None` when a statistic is
/// required but nothing was observed.
fn statistic(observed: &Series, strategy: StrategyKind, kind: ItemKind) -> PolarsResult<Option<Series>> {
    let dtype = observed.dtype();
    if !strategy.is_statistical() {
        return default_value(dtype).map(Some);
    }
    if observed.null_count() == observed.len() {
        return Ok(None);
    }

    let physical = observed.to_physical_repr();
    let value = match strategy {
        StrategyKind::Minimum => physical.min_reduce()?.into_series(PlSmallStr::EMPTY),
        StrategyKind::Maximum => physical.max_reduce()?.into_series(PlSmallStr::EMPTY),
        _ => {
            let Some(mean) = physical.mean() else {
                return Ok(None);
            };
            let mean = if kind.is_integral() { mean.round() } else { mean };
            Series::new(PlSmallStr::EMPTY, [mean])
        }
    };
    Ok(Some(value.cast(&dtype.to_physical())?.cast(dtype)?))
}

/// Zero, empty text, false or the zero instant, as a one-row series of `dtype`.
fn default_value(dtype: &DataType) -> PolarsResult<Series> {
    let zero = match dtype {
        DataType::String => Series::new(PlSmallStr::EMPTY, [""]),
        _ => Series::new(PlSmallStr::EMPTY, [0i32]).cast(&dtype.to_physical())?,
    };
    zero.cast(dtype)
}

impl Stage for Replacer {
    fn kind(&self) -> StageKind {
        StageKind::Replacer
    }

    fn output_schema(&self, input: &ColumnSchema) -> Result<ColumnSchema> {
        let mut schema = input.clone();
        for instruction in &self.instructions {
            let source = input.require(&instruction.source)?;
            Self::check_supported(instruction, &source.column_type)?;
            let mut column = SchemaColumn::new(instruction.output.as_str(), source.column_type);
            column.slot_names = source.slot_names.clone();
            schema.put(column);
        }
        Ok(schema)
    }

    fn transform(&self, frame: &DataFrame, input: &ColumnSchema) -> Result<DataFrame> {
        let mut produced = Vec::with_capacity(self.instructions.len());
        for instruction in &self.instructions {
            let column_type = input.require(&instruction.source)?.column_type;
            Self::check_supported(instruction, &column_type)?;

            let series = column_series(frame, &instruction.source)?;
            debug!(
                "Replacer: '{}' -> '{}' with {} ({}, {} missing)",
                instruction.source,
                instruction.output,
                instruction.strategy,
                if instruction.impute_by_slot { "by slot" } else { "whole column" },
                series.null_count()
            );
            produced.push(Self::replace(instruction, &series, column_type.item)?);
        }

        let mut df = frame.clone();
        for series in produced {
            put_column(&mut df, series)?;
        }
        Ok(df)
    }
}
