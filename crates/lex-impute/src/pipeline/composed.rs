//! The executable result of a composition.

use crate::error::{ImputeError, Result};
use crate::pipeline::StageGroup;
use crate::schema::{ColumnSchema, DatasetView};
use crate::stages::{Stage, StageKind};
use crate::types::{ColumnPlan, PipelineSummary};
use polars::prelude::DataFrame;
use std::fmt::Write;
use tracing::{debug, info};

/// An ordered chain of stage collaborators plus the schema it was built for.
///
/// The output schema is known without touching data. Applying the pipeline
/// never mutates the input view.
#[derive(Debug)]
pub struct ComposedPipeline {
    input_schema: ColumnSchema,
    output_schema: ColumnSchema,
    plans: Vec<ColumnPlan>,
    groups: Vec<StageGroup>,
    stages: Vec<Box<dyn Stage>>,
}

// Pipelines are built once and may be applied from several threads
static_assertions::assert_impl_all!(ComposedPipeline: Send, Sync);

impl ComposedPipeline {
    pub(crate) fn new(
        input_schema: ColumnSchema,
        output_schema: ColumnSchema,
        plans: Vec<ColumnPlan>,
        groups: Vec<StageGroup>,
        stages: Vec<Box<dyn Stage>>,
    ) -> Self {
        Self {
            input_schema,
            output_schema,
            plans,
            groups,
            stages,
        }
    }

    /// Run every stage over `input` and keep only the requested outputs,
    /// in request order.
    ///
    /// # Errors
    ///
    /// Returns [`ImputeError::SchemaMismatch`] when `input` does not have the
    /// schema the pipeline was composed against.
    pub fn apply(&self, input: &DatasetView) -> Result<DatasetView> {
        self.check_input(input.schema())?;

        let mut view = input.clone();
        for stage in &self.stages {
            debug!("Applying {} stage", stage.kind());
            view = stage.apply(&view)?;
        }
        let frame = view.frame().select(self.output_columns())?;
        let view = DatasetView::from_parts(frame, self.output_schema.clone())?;

        info!(
            "Imputed {} column(s) over {} row(s)",
            self.plans.len(),
            view.height()
        );
        Ok(view)
    }

    /// Convenience wrapper over [`apply`](Self::apply) for a bare frame.
    pub fn apply_frame(&self, frame: DataFrame) -> Result<DataFrame> {
        Ok(self.apply(&DatasetView::new(frame))?.into_frame())
    }

    fn check_input(&self, schema: &ColumnSchema) -> Result<()> {
        let expected = &self.input_schema;
        if schema.columns().len() != expected.columns().len() {
            return Err(ImputeError::SchemaMismatch(format!(
                "expected {} columns, got {}",
                expected.columns().len(),
                schema.columns().len()
            )));
        }
        for (want, got) in expected.columns().iter().zip(schema.columns()) {
            if want.name != got.name || want.column_type != got.column_type {
                return Err(ImputeError::SchemaMismatch(format!(
                    "expected column '{}' ({}), got '{}' ({})",
                    want.name, want.column_type, got.name, got.column_type
                )));
            }
        }
        Ok(())
    }

    pub fn input_schema(&self) -> &ColumnSchema {
        &self.input_schema
    }

    pub fn output_schema(&self) -> &ColumnSchema {
        &self.output_schema
    }

    /// Requested output names in request order.
    pub fn output_columns(&self) -> Vec<&str> {
        self.plans.iter().map(|p| p.output.as_str()).collect()
    }

    pub fn plans(&self) -> &[ColumnPlan] {
        &self.plans
    }

    pub fn groups(&self) -> &[StageGroup] {
        &self.groups
    }

    pub fn stage_kinds(&self) -> Vec<StageKind> {
        self.stages.iter().map(|s| s.kind()).collect()
    }

    /// Human-readable multi-line description of the stages and output schema.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Pipeline: {} column(s), {} stage(s)",
            self.plans.len(),
            self.groups.len()
        );
        for (i, group) in self.groups.iter().enumerate() {
            let _ = writeln!(out, "  {}. {}", i + 1, group);
        }
        let _ = writeln!(out, "Output schema:");
        for (name, column_type) in self.output_schema.describe() {
            let _ = writeln!(out, "  {}: {}", name, column_type);
        }
        out
    }

    pub fn summary(&self) -> PipelineSummary {
        PipelineSummary {
            stages: self.stage_kinds().iter().map(|k| k.to_string()).collect(),
            outputs: self.output_columns().iter().map(|s| s.to_string()).collect(),
            columns: self.plans.clone(),
            output_schema: self.output_schema.describe(),
        }
    }
}
