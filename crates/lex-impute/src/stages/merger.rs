//! Merge stage: concatenates tagged columns into one vector column.

use super::{MergeInstruction, MergePart, Stage, StageKind, stage_error};
use crate::error::Result;
use crate::schema::{ColumnSchema, SchemaColumn};
use crate::types::{ColumnShape, ColumnType};
use crate::utils::{column_series, item_dtype, put_column, with_item_dtype};
use polars::prelude::*;
use tracing::debug;

/// Concatenates the parts of each instruction into one vector per row.
///
/// The first part's item dtype is used for the result; the other parts are
/// cast to it. A null vector row in any part makes the merged row null.
/// Fixed-length results are `Array` columns, variable-length ones `List`.
#[derive(Debug, Clone)]
pub struct Merger {
    instructions: Vec<MergeInstruction>,
}

impl Merger {
    pub fn new(instructions: Vec<MergeInstruction>) -> Self {
        Self { instructions }
    }

    fn merged_column(&self, instruction: &MergeInstruction, input: &ColumnSchema) -> Result<SchemaColumn> {
        let columns = instruction
            .parts
            .iter()
            .map(|part| input.require(&part.column))
            .collect::<Result<Vec<_>>>()?;

        let Some(first) = columns.first() else {
            return Err(stage_error(
                self.kind(),
                format!("merge into '{}' has no parts", instruction.output),
            ));
        };
        let item = first.column_type.item;
        if let Some(other) = columns.iter().find(|c| c.column_type.item != item) {
            return Err(stage_error(
                self.kind(),
                format!(
                    "cannot merge '{}' ({}) with '{}' ({})",
                    first.name, first.column_type, other.name, other.column_type
                ),
            ));
        }

        let len = columns
            .iter()
            .map(|c| c.column_type.value_count())
            .sum::<Option<usize>>();
        let column = SchemaColumn::new(instruction.output.as_str(), ColumnType::vector(item, len));
        if len.is_none() {
            return Ok(column);
        }

        let mut slot_names = Vec::new();
        for (part, source) in instruction.parts.iter().zip(&columns) {
            slot_names.extend(part_slot_names(part, source));
        }
        Ok(column.with_slot_names(slot_names))
    }

    fn merge(instruction: &MergeInstruction, frame: &DataFrame, column: &SchemaColumn) -> Result<Series> {
        let mut parts = Vec::with_capacity(instruction.parts.len());
        for part in &instruction.parts {
            parts.push(column_series(frame, &part.column)?);
        }
        let item = parts
            .first()
            .map(|s| item_dtype(s.dtype()))
            .unwrap_or(DataType::Null);
        let fixed = matches!(column.column_type.shape, ColumnShape::Vector { len: Some(_) });

        // Parts are renamed positionally; tags may repeat source names
        let mut columns = Vec::with_capacity(parts.len());
        let mut exprs = Vec::with_capacity(parts.len());
        for (i, series) in parts.iter().enumerate() {
            let name = format!("part_{i}");
            let dtype = match series.dtype() {
                DataType::Array(_, _) if !fixed => DataType::List(Box::new(item.clone())),
                other => with_item_dtype(other, &item),
            };
            columns.push(series.cast(&dtype)?.with_name(name.as_str().into()).into_column());
            exprs.push(col(name.as_str()));
        }

        let merged = if fixed { concat_arr(exprs)? } else { concat_list(exprs)? };
        let out = DataFrame::new(columns)?
            .lazy()
            .select([merged.alias(instruction.output.as_str())])
            .collect()?;
        Ok(column_series(&out, &instruction.output)?)
    }
}

/// Slot names contributed by one part of a fixed-length merge.
fn part_slot_names(part: &MergePart, source: &SchemaColumn) -> Vec<String> {
    match (&source.slot_names, source.column_type.value_count()) {
        (Some(names), _) => names.iter().map(|n| format!("{}.{}", part.tag, n)).collect(),
        (None, Some(1)) if !source.column_type.is_vector() => vec![part.tag.clone()],
        (None, Some(n)) => (0..n).map(|i| format!("{}.{}", part.tag, i)).collect(),
        (None, None) => Vec::new(),
    }
}

impl Stage for Merger {
    fn kind(&self) -> StageKind {
        StageKind::Merger
    }

    fn output_schema(&self, input: &ColumnSchema) -> Result<ColumnSchema> {
        let mut schema = input.clone();
        for instruction in &self.instructions {
            schema.put(self.merged_column(instruction, input)?);
        }
        Ok(schema)
    }

    fn transform(&self, frame: &DataFrame, input: &ColumnSchema) -> Result<DataFrame> {
        let mut produced = Vec::with_capacity(self.instructions.len());
        for instruction in &self.instructions {
            let column = self.merged_column(instruction, input)?;
            debug!(
                "Merger: {} part(s) -> '{}' ({})",
                instruction.parts.len(),
                instruction.output,
                column.column_type
            );
            produced.push(Self::merge(instruction, frame, &column)?);
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
    use crate::error::ImputeError;
    use crate::schema::{DatasetView, SchemaView};
    use crate::types::ItemKind;
    use crate::utils::testing::f64_rows;

    fn part(tag: &str, column: &str) -> MergePart {
        MergePart {
            tag: tag.to_string(),
            column: column.to_string(),
        }
    }

    fn merge_of(output: &str, parts: Vec<MergePart>) -> MergeInstruction {
        MergeInstruction {
            output: output.to_string(),
            parts,
        }
    }

    fn rows_f64(view: &DatasetView, column: &str) -> Vec<Option<Vec<Option<f64>>>> {
        f64_rows(view.frame().column(column).unwrap().as_materialized_series())
    }

    #[test]
    fn test_scalar_parts_make_length_two_vector() {
        let df = df![
            "value" => [1.5, 2.5],
            "flag" => [0.0, 1.0],
        ]
        .unwrap();
        let stage = Merger::new(vec![merge_of(
            "age",
            vec![part("age", "value"), part("IsMissing.age", "flag")],
        )]);

        let out = stage.apply(&DatasetView::new(df)).unwrap();

        let column = out.schema().get("age").unwrap();
        assert_eq!(column.column_type, ColumnType::vector(ItemKind::Float64, Some(2)));
        assert_eq!(
            column.slot_names,
            Some(vec!["age".to_string(), "IsMissing.age".to_string()])
        );
        assert_eq!(
            rows_f64(&out, "age"),
            vec![Some(vec![Some(1.5), Some(0.0)]), Some(vec![Some(2.5), Some(1.0)])]
        );
    }

    #[test]
    fn test_fixed_vectors_concatenate_with_indexed_slots() {
        let values = Series::new(
            "v".into(),
            &[
                Series::new("".into(), &[1.0, 2.0]),
                Series::new("".into(), &[3.0, 4.0]),
            ],
        )
        .cast(&DataType::Array(Box::new(DataType::Float64), 2))
        .unwrap();
        let flags = Series::new(
            "f".into(),
            &[
                Series::new("".into(), &[0.0, 1.0]),
                Series::new("".into(), &[0.0, 0.0]),
            ],
        )
        .cast(&DataType::Array(Box::new(DataType::Float64), 2))
        .unwrap();
        let df = DataFrame::new(vec![values.into_column(), flags.into_column()]).unwrap();
        let stage = Merger::new(vec![merge_of(
            "out",
            vec![part("v", "v"), part("IsMissing.v", "f")],
        )]);

        let out = stage.apply(&DatasetView::new(df)).unwrap();

        let column = out.schema().get("out").unwrap();
        assert_eq!(column.column_type, ColumnType::vector(ItemKind::Float64, Some(4)));
        assert_eq!(
            column.slot_names.as_deref().unwrap(),
            ["v.0", "v.1", "IsMissing.v.0", "IsMissing.v.1"]
        );
        assert_eq!(
            rows_f64(&out, "out")[0],
            Some(vec![Some(1.0), Some(2.0), Some(0.0), Some(1.0)])
        );
    }

    #[test]
    fn test_variable_vectors_and_null_rows() {
        let values: ListChunked = vec![Some(Series::new("".into(), &[1i64, 2, 3])), None]
            .into_iter()
            .collect();
        let values = values.into_series().with_name("v".into());
        let flags = Series::new(
            "f".into(),
            &[
                Series::new("".into(), &[0i64, 0, 1]),
                Series::new("".into(), &[1i64]),
            ],
        );
        let df = DataFrame::new(vec![values.into_column(), flags.into_column()]).unwrap();
        let stage = Merger::new(vec![merge_of("v", vec![part("v", "v"), part("IsMissing.v", "f")])]);

        let out = stage.apply(&DatasetView::new(df)).unwrap();

        let column = out.schema().get("v").unwrap();
        assert_eq!(column.column_type, ColumnType::vector(ItemKind::Int64, None));
        assert_eq!(column.slot_names, None);
        assert_eq!(out.schema().column_names(), vec!["f", "v"]);
        let rows = rows_f64(&out, "v");
        assert_eq!(rows[0].as_ref().unwrap().len(), 6);
        assert_eq!(rows[1], None);
    }

    #[test]
    fn test_mismatched_item_kinds_fail() {
        let df = df![
            "value" => [1.5, 2.5],
            "flag" => [true, false],
        ]
        .unwrap();
        let stage = Merger::new(vec![merge_of(
            "out",
            vec![part("value", "value"), part("IsMissing.value", "flag")],
        )]);

        let result = stage.output_schema(&ColumnSchema::from_frame(&df));
        assert!(matches!(result, Err(ImputeError::StageFailed { .. })));
    }
}
