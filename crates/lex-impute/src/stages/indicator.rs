//! Missing-value indicator stage.

use super::{IndicatorInstruction, Stage, StageKind};
use crate::error::Result;
use crate::schema::{ColumnSchema, SchemaColumn};
use crate::types::ItemKind;
use crate::utils::{column_series, put_column};
use polars::prelude::*;
use tracing::debug;

/// Adds one boolean column per source, true where the source value is null.
///
/// Vector sources yield vectors of the same shape with one flag per slot.
#[derive(Debug, Clone)]
pub struct Indicator {
    instructions: Vec<IndicatorInstruction>,
}

impl Indicator {
    pub fn new(instructions: Vec<IndicatorInstruction>) -> Self {
        Self { instructions }
    }

    fn indicate(series: &Series, output: &str) -> PolarsResult<Series> {
        let is_null = |values: Series| -> PolarsResult<Series> { Ok(values.is_null().into_series()) };
        let flags = match series.dtype() {
            DataType::Array(_, _) => series.array()?.apply_to_inner(&is_null)?.into_series(),
            DataType::List(_) => series.list()?.apply_to_inner(&is_null)?.into_series(),
            _ => series.is_null().into_series(),
        };
        Ok(flags.with_name(output.into()))
    }
}

impl Stage for Indicator {
    fn kind(&self) -> StageKind {
        StageKind::Indicator
    }

    fn output_schema(&self, input: &ColumnSchema) -> Result<ColumnSchema> {
        let mut schema = input.clone();
        for instruction in &self.instructions {
            let source = input.require(&instruction.source)?;
            let mut column = SchemaColumn::new(
                instruction.output.as_str(),
                source.column_type.with_item(ItemKind::Boolean),
            );
            column.slot_names = source.slot_names.clone();
            schema.put(column);
        }
        Ok(schema)
    }

    fn transform(&self, frame: &DataFrame, _input: &ColumnSchema) -> Result<DataFrame> {
        let mut produced = Vec::with_capacity(self.instructions.len());
        for instruction in &self.instructions {
            let series = column_series(frame, &instruction.source)?;
            debug!(
                "Indicator: '{}' -> '{}' ({} missing)",
                instruction.source,
                instruction.output,
                series.null_count()
            );
            produced.push(Self::indicate(&series, &instruction.output)?);
        }

        let mut df = frame.clone();
        for series in produced {
            put_column(&mut df, series)?;
        }
        Ok(df)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DatasetView, SchemaView};
    use crate::types::ColumnType;
    use crate::utils::testing::rows;

    fn instruction(source: &str, output: &str) -> IndicatorInstruction {
        IndicatorInstruction {
            source: source.to_string(),
            output: output.to_string(),
        }
    }

    #[test]
    fn test_scalar_indicator() {
        let df = df![
            "age" => [Some(31.0), None, Some(45.0)],
        ]
        .unwrap();
        let stage = Indicator::new(vec![instruction("age", "age_missing")]);

        let out = stage.apply(&DatasetView::new(df)).unwrap();

        assert_eq!(out.schema().column_names(), vec!["age", "age_missing"]);
        let flags = out.frame().column("age_missing").unwrap();
        let flags = flags.as_materialized_series().bool().unwrap();
        assert_eq!(flags.get(0), Some(false));
        assert_eq!(flags.get(1), Some(true));
        assert_eq!(flags.get(2), Some(false));
    }

    #[test]
    fn test_vector_indicator_keeps_shape() {
        let list = Series::new(
            "v".into(),
            &[
                Series::new("".into(), &[Some(1.0), None]),
                Series::new("".into(), &[None, Some(4.0)]),
            ],
        );
        let array = list
            .cast(&DataType::Array(Box::new(DataType::Float64), 2))
            .unwrap();
        let df = DataFrame::new(vec![array.into_column()]).unwrap();
        let stage = Indicator::new(vec![instruction("v", "v_missing")]);

        let out = stage.apply(&DatasetView::new(df)).unwrap();

        assert_eq!(
            out.schema().get("v_missing").unwrap().column_type,
            ColumnType::vector(ItemKind::Boolean, Some(2))
        );
        let rows = rows(out.frame().column("v_missing").unwrap().as_materialized_series());
        let first = rows[0].as_ref().unwrap();
        assert_eq!(first.bool().unwrap().get(0), Some(false));
        assert_eq!(first.bool().unwrap().get(1), Some(true));
    }

    #[test]
    fn test_missing_source_fails_schema() {
        let schema = ColumnSchema::new(vec![]);
        let stage = Indicator::new(vec![instruction("age", "age_missing")]);
        assert!(stage.output_schema(&schema).is_err());
    }
}
