//! Cleanup stage.

use super::{DropInstruction, Stage, StageKind};
use crate::error::{ImputeError, Result};
use crate::schema::{ColumnSchema, SchemaView};
use polars::prelude::*;
use tracing::debug;

/// Removes temporary columns, then moves the requested outputs to the end
/// of the schema in request order.
#[derive(Debug, Clone)]
pub struct Dropper {
    instruction: DropInstruction,
}

impl Dropper {
    pub fn new(instruction: DropInstruction) -> Self {
        Self { instruction }
    }
}

impl Stage for Dropper {
    fn kind(&self) -> StageKind {
        StageKind::Dropper
    }

    fn output_schema(&self, input: &ColumnSchema) -> Result<ColumnSchema> {
        let mut schema = input.clone();
        for name in &self.instruction.columns {
            schema
                .remove(name)
                .ok_or_else(|| ImputeError::ColumnNotFound(name.clone()))?;
        }
        schema.move_to_end(&self.instruction.output_order)?;
        Ok(schema)
    }

    fn transform(&self, frame: &DataFrame, input: &ColumnSchema) -> Result<DataFrame> {
        debug!(
            "Dropper: removing {} temporary column(s)",
            self.instruction.columns.len()
        );
        let schema = self.output_schema(input)?;
        Ok(frame.select(schema.column_names())?)
    }
}
