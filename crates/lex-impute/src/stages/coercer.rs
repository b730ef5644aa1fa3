//! Item type coercion stage.

use super::{CoerceInstruction, Stage, StageKind, stage_error};
use crate::error::Result;
use crate::planner::TypeCompatibilityChecker;
use crate::schema::ColumnSchema;
use crate::types::{ColumnShape, ColumnType};
use crate::utils::{column_series, shaped_dtype};
use polars::prelude::*;
use tracing::debug;

/// Re-types columns in place, keeping their shape and position.
#[derive(Debug, Clone)]
pub struct Coercer {
    instructions: Vec<CoerceInstruction>,
}

impl Coercer {
    pub fn new(instructions: Vec<CoerceInstruction>) -> Self {
        Self { instructions }
    }

    fn target_dtype(column_type: &ColumnType) -> DataType {
        let item = column_type.item.to_dtype();
        match column_type.shape {
            ColumnShape::Scalar => shaped_dtype(item, None),
            ColumnShape::Vector { len } => shaped_dtype(item, Some(len)),
        }
    }
}

impl Stage for Coercer {
    fn kind(&self) -> StageKind {
        StageKind::Coercer
    }

    fn output_schema(&self, input: &ColumnSchema) -> Result<ColumnSchema> {
        let mut schema = input.clone();
        for instruction in &self.instructions {
            let current = input.require(&instruction.column)?.column_type;
            let conversion = TypeCompatibilityChecker::can_represent(current.item, instruction.target);
            if !conversion.possible {
                return Err(stage_error(
                    self.kind(),
                    format!(
                        "cannot convert '{}' from {} to {}",
                        instruction.column, current.item, instruction.target
                    ),
                ));
            }
            schema.retype(&instruction.column, current.with_item(instruction.target))?;
        }
        Ok(schema)
    }

    fn transform(&self, frame: &DataFrame, input: &ColumnSchema) -> Result<DataFrame> {
        let mut produced = Vec::with_capacity(self.instructions.len());
        for instruction in &self.instructions {
            let current = input.require(&instruction.column)?.column_type;
            let target = Self::target_dtype(&current.with_item(instruction.target));
            debug!("Coercer: '{}' -> {:?}", instruction.column, target);

            let series = column_series(frame, &instruction.column)?;
            let coerced = series
                .cast(&target)?
                .with_name(instruction.column.as_str().into());
            produced.push(coerced);
        }

        let mut df = frame.clone();
        for series in produced {
            let name = series.name().to_string();
            df.replace(&name, series)?;
        }
        Ok(df)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DatasetView, SchemaView};
    use crate::types::ItemKind;

    #[test]
    fn test_boolean_to_float_in_place() {
        let df = df![
            "flag" => [true, false],
            "other" => [1, 2],
        ]
        .unwrap();
        let stage = Coercer::new(vec![CoerceInstruction {
            column: "flag".to_string(),
            target: ItemKind::Float64,
        }]);

        let out = stage.apply(&DatasetView::new(df)).unwrap();

        assert_eq!(out.schema().column_names(), vec!["flag", "other"]);
        let flag = out.frame().column("flag").unwrap();
        assert_eq!(flag.dtype(), &DataType::Float64);
        assert_eq!(flag.get(0).unwrap().try_extract::<f64>().unwrap(), 1.0);
        assert_eq!(flag.get(1).unwrap().try_extract::<f64>().unwrap(), 0.0);
    }

    #[test]
    fn test_boolean_vector_to_int() {
        let list = Series::new(
            "flags".into(),
            &[
                Series::new("".into(), &[true, false]),
                Series::new("".into(), &[false, false]),
            ],
        );
        let array = list
            .cast(&DataType::Array(Box::new(DataType::Boolean), 2))
            .unwrap();
        let df = DataFrame::new(vec![array.into_column()]).unwrap();
        let stage = Coercer::new(vec![CoerceInstruction {
            column: "flags".to_string(),
            target: ItemKind::Int32,
        }]);

        let out = stage.apply(&DatasetView::new(df)).unwrap();

        assert_eq!(
            out.frame().column("flags").unwrap().dtype(),
            &DataType::Array(Box::new(DataType::Int32), 2)
        );
    }

    #[test]
    fn test_impossible_conversion_fails() {
        let df = df!["flag" => [true, false]].unwrap();
        let stage = Coercer::new(vec![CoerceInstruction {
            column: "flag".to_string(),
            target: ItemKind::Datetime,
        }]);

        let result = stage.apply(&DatasetView::new(df));
        assert!(matches!(result, Err(crate::error::ImputeError::StageFailed { .. })));
    }
}
